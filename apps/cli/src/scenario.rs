//! YAML scenario files: companies, their starting products and a script of
//! decisions keyed by period.
//!
//! Products are given a scenario-local `key`; any `productId` inside a
//! scripted decision that equals a key is replaced by the minted product id.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use sim_core::{CompanyId, DecisionKind, NewProduct, Period, ProductId, ProductStatus, SimConfig, UserId};
use sim_runtime::{SimulationEngine, SimulationFactory};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

fn default_owner() -> String {
    "user_cli".to_string()
}

fn default_status() -> ProductStatus {
    ProductStatus::Active
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default)]
    pub config: SimConfig,
    pub companies: Vec<ScenarioCompany>,
    #[serde(default)]
    pub decisions: Vec<ScriptedDecision>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioCompany {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub products: Vec<ScenarioProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioProduct {
    pub key: String,
    #[serde(default = "default_status")]
    pub status: ProductStatus,
    #[serde(flatten)]
    pub spec: NewProduct,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedDecision {
    pub period: Period,
    /// Key of the deciding company.
    pub company: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

/// Decisions to submit at the start of each period.
#[derive(Debug, Default)]
pub struct Script {
    by_period: BTreeMap<Period, Vec<(CompanyId, DecisionKind)>>,
}

impl Script {
    pub fn take(&mut self, period: Period) -> Vec<(CompanyId, DecisionKind)> {
        self.by_period.remove(&period).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_period.values().map(Vec::len).sum()
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Create the simulation, its companies and products, and resolve the script.
    pub fn build(self, now: DateTime<Utc>) -> Result<(SimulationEngine, Script)> {
        let owner = UserId::from(self.owner.as_str());
        let state = SimulationFactory::create(
            &self.name,
            &self.description,
            owner.clone(),
            self.config,
            now,
        );
        let mut engine = SimulationEngine::new(state);
        let mut companies: HashMap<String, CompanyId> = HashMap::new();
        let mut products: HashMap<String, ProductId> = HashMap::new();

        for c in self.companies {
            let id = engine.create_company(&owner, &c.name, &c.description, now)?;
            for p in c.products {
                let pid = engine.create_product(&id, &p.spec, p.status, now)?;
                debug!(key = %p.key, product = %pid, "scenario product");
                if products.insert(p.key.clone(), pid).is_some() {
                    return Err(anyhow!("duplicate product key {}", p.key));
                }
            }
            if companies.insert(c.key.clone(), id).is_some() {
                return Err(anyhow!("duplicate company key {}", c.key));
            }
        }

        let mut script = Script::default();
        for d in self.decisions {
            let company = companies
                .get(&d.company)
                .cloned()
                .ok_or_else(|| anyhow!("decision names unknown company {}", d.company))?;
            let mut data = d.data;
            resolve_products(&mut data, &products);
            let kind = DecisionKind::from_parts(&d.kind, data).with_context(|| {
                format!("invalid {} decision for period {}", d.kind, d.period)
            })?;
            script
                .by_period
                .entry(d.period)
                .or_default()
                .push((company, kind));
        }
        Ok((engine, script))
    }
}

/// Replace scenario product keys under any `productId` field.
fn resolve_products(value: &mut Value, products: &HashMap<String, ProductId>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                if k == "productId" {
                    if let Some(id) = v.as_str().and_then(|key| products.get(key)) {
                        *v = Value::from(id.as_str());
                        continue;
                    }
                }
                resolve_products(v, products);
            }
        }
        Value::Array(items) => {
            for v in items {
                resolve_products(v, products);
            }
        }
        _ => {}
    }
}
