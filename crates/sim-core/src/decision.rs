//! Decisions submitted by companies and their typed payloads.
//!
//! On the wire a decision is `{"type": "<kind>", "data": {...}}`. Each kind
//! has its own payload type; sub-actions are either tagged with `action` or
//! told apart by shape (`productId` vs `products` vs `campaignType`), with
//! the single-product form taking precedence.

use crate::company::CampaignTarget;
use crate::ids::{CompanyId, DecisionId, LoanId, ProductId};
use crate::market::Segment;
use crate::Period;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A decision in the append-only decision log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: DecisionId,
    pub company_id: CompanyId,
    /// Period the decision targets.
    pub period: Period,
    pub kind: DecisionKind,
    pub submitted_at: DateTime<Utc>,
    /// Set once when the decision is applied; never applied again.
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Decision {
    pub fn is_pending_for(&self, period: Period) -> bool {
        self.period == period && !self.processed
    }
}

/// Decision payload, one variant per decision type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DecisionKind {
    ProductDevelopment(ProductDevelopment),
    Pricing(PricingDecision),
    Production(ProductionDecision),
    Marketing(MarketingDecision),
    Research(ResearchDecision),
    HumanResources(HumanResourcesDecision),
    Finance(FinanceDecision),
}

impl DecisionKind {
    /// The `type` discriminant as stored.
    pub fn type_name(&self) -> &'static str {
        match self {
            DecisionKind::ProductDevelopment(_) => "product_development",
            DecisionKind::Pricing(_) => "pricing",
            DecisionKind::Production(_) => "production",
            DecisionKind::Marketing(_) => "marketing",
            DecisionKind::Research(_) => "research",
            DecisionKind::HumanResources(_) => "human_resources",
            DecisionKind::Finance(_) => "finance",
        }
    }

    /// Rebuild a payload from its stored discriminant and JSON data.
    pub fn from_parts(type_name: &str, data: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(serde_json::json!({ "type": type_name, "data": data }))
    }

    /// The JSON `data` part of the payload.
    pub fn data_json(&self) -> serde_json::Result<serde_json::Value> {
        let mut v = serde_json::to_value(self)?;
        Ok(v.get_mut("data")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null))
    }
}

// ---------- product development ----------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProductDevelopment {
    NewProduct(NewProduct),
    UpdateProduct(ProductUpdate),
    DiscontinueProduct(ProductRef),
}

/// Specification of a product to develop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Segment,
    #[serde(default)]
    pub quality_rating: Option<f64>,
    #[serde(default)]
    pub innovation_rating: Option<f64>,
    #[serde(default)]
    pub sustainability_rating: Option<f64>,
    pub production_cost: Decimal,
    pub selling_price: Decimal,
    #[serde(default)]
    pub production_capacity: Option<u64>,
    #[serde(default)]
    pub development_cost: Option<Decimal>,
    /// Periods until launch; defaults to 1.
    #[serde(default)]
    pub development_time: Option<u32>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub target_audience: String,
}

impl NewProduct {
    pub const DEFAULT_RATING: f64 = 5.0;
    pub const DEFAULT_CAPACITY: u64 = 1000;
    pub const DEFAULT_DEVELOPMENT_TIME: u32 = 1;
}

/// Partial product update; absent fields are left untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub innovation_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sustainability_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_capacity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    /// Extra development spend charged with the update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub development_cost: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub product_id: ProductId,
}

// ---------- pricing ----------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PricingDecision {
    Single(PriceChange),
    Batch { products: Vec<PriceChange> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub product_id: ProductId,
    pub price: Decimal,
}

// ---------- production ----------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductionDecision {
    #[serde(rename_all = "camelCase")]
    Single {
        product_id: ProductId,
        production_volume: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capacity_expansion: Option<CapacityExpansion>,
    },
    #[serde(rename_all = "camelCase")]
    Batch {
        products: Vec<ProductionOrder>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capacity_expansion: Option<CapacityExpansion>,
    },
    #[serde(rename_all = "camelCase")]
    ExpansionOnly { capacity_expansion: CapacityExpansion },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionOrder {
    pub product_id: ProductId,
    pub production_volume: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityExpansion {
    pub product_id: ProductId,
    pub capacity_increase: u64,
    pub investment_amount: Decimal,
}

// ---------- marketing ----------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarketingDecision {
    Product(ProductBudget),
    Batch { products: Vec<ProductBudget> },
    Campaign(CompanyCampaign),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductBudget {
    pub product_id: ProductId,
    pub budget: Decimal,
}

/// Marker for company-wide campaigns (`campaignType: "company"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignScope {
    Company,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyCampaign {
    pub campaign_type: CampaignScope,
    pub name: String,
    pub budget: Decimal,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub target_segment: Option<CampaignTarget>,
    #[serde(default)]
    pub channel_allocation: BTreeMap<String, f64>,
    #[serde(default)]
    pub message: String,
}

// ---------- research ----------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchDecision {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub budget: Decimal,
    #[serde(default)]
    pub duration: Option<u32>,
}

// ---------- human resources ----------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanResourcesDecision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hiring: Option<Hiring>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<SalaryChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training: Option<Training>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hiring {
    pub new_employees: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryChange {
    pub new_average_salary: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Training {
    pub budget: Decimal,
}

// ---------- finance ----------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FinanceDecision {
    Loan(LoanRequest),
    RepayLoan(LoanRepayment),
    Dividend(DividendPayment),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub interest_rate: f64,
    #[serde(default)]
    pub term: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRepayment {
    pub loan_id: LoanId,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DividendPayment {
    pub amount: Decimal,
}
