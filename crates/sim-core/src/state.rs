//! Simulation header, configuration and the full in-memory state.

use crate::company::Company;
use crate::decision::Decision;
use crate::ids::{CompanyId, ProductId, SimulationId, UserId};
use crate::market::{Event, MarketConditions, Segment};
use crate::performance::{PerformanceResults, ProductPerformance};
use crate::product::Product;
use crate::Period;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Run state of a simulation. The engine advances periods in any state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    Active,
    Paused,
    Finished,
}

impl SimulationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SimulationStatus::Active => "active",
            SimulationStatus::Paused => "paused",
            SimulationStatus::Finished => "finished",
        }
    }
}

fn default_initial_cash() -> Decimal {
    Decimal::new(1_000_000, 0)
}

fn default_segments() -> Vec<Segment> {
    Segment::ALL.to_vec()
}

fn default_difficulty() -> String {
    "medium".to_string()
}

fn default_events_frequency() -> f64 {
    0.3
}

fn default_rng_seed() -> u64 {
    42
}

/// Simulation configuration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimConfig {
    /// Starting cash of newly created companies.
    #[serde(default = "default_initial_cash")]
    pub initial_cash: Decimal,
    /// Planned number of periods, informational.
    #[serde(default)]
    pub periods: Option<u32>,
    #[serde(default = "default_segments")]
    pub market_segments: Vec<Segment>,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    /// Probability in [0,1] of a market event per period advance.
    #[serde(default = "default_events_frequency")]
    pub events_frequency: f64,
    /// Seed for the per-period deterministic RNG.
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_cash: default_initial_cash(),
            periods: None,
            market_segments: default_segments(),
            difficulty: default_difficulty(),
            events_frequency: default_events_frequency(),
            rng_seed: default_rng_seed(),
        }
    }
}

/// Simulation header record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub id: SimulationId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub config: SimConfig,
    /// Starts at 0 and grows by exactly one per advance.
    pub current_period: Period,
    pub status: SimulationStatus,
    /// Only this user may found companies.
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything the engine reads and writes for one simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub simulation: Simulation,
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub market_conditions: Vec<MarketConditions>,
    #[serde(default)]
    pub performance_results: Vec<PerformanceResults>,
    #[serde(default)]
    pub product_performance: Vec<ProductPerformance>,
    #[serde(default)]
    pub events: Vec<Event>,
    /// Sequence used to mint entity ids.
    #[serde(default)]
    pub id_seq: u64,
}

impl SimulationState {
    pub fn new(simulation: Simulation) -> Self {
        Self {
            simulation,
            companies: Vec::new(),
            products: Vec::new(),
            decisions: Vec::new(),
            market_conditions: Vec::new(),
            performance_results: Vec::new(),
            product_performance: Vec::new(),
            events: Vec::new(),
            id_seq: 0,
        }
    }

    pub fn current_period(&self) -> Period {
        self.simulation.current_period
    }

    /// Mint a new id of the form `<prefix>_<simulation id>_<seq>`.
    pub fn next_id(&mut self, prefix: &str) -> String {
        self.id_seq += 1;
        format!("{}_{}_{}", prefix, self.simulation.id, self.id_seq)
    }

    pub fn company(&self, id: &CompanyId) -> Option<&Company> {
        self.companies.iter().find(|c| &c.id == id)
    }

    pub fn company_mut(&mut self, id: &CompanyId) -> Option<&mut Company> {
        self.companies.iter_mut().find(|c| &c.id == id)
    }

    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.id == id)
    }

    pub fn market_conditions_for(&self, period: Period) -> Option<&MarketConditions> {
        self.market_conditions.iter().find(|mc| mc.period == period)
    }
}
