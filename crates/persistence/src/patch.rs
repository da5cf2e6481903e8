//! Partial updates. Every field left `None` keeps the stored column.
//!
//! A present JSON blob (`data`, `config`) replaces the stored blob as a whole;
//! callers patch the decoded record and send it back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sim_core::{
    CompanyData, DecisionKind, Period, ProductData, ProductStatus, SimConfig, SimulationStatus,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub config: Option<SimConfig>,
    pub current_period: Option<Period>,
    pub status: Option<SimulationStatus>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompanyPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    /// A stored logo cannot be cleared through a patch.
    pub logo_url: Option<String>,
    pub cash_balance: Option<Decimal>,
    pub total_assets: Option<Decimal>,
    pub total_liabilities: Option<Decimal>,
    pub credit_rating: Option<String>,
    pub brand_value: Option<f64>,
    pub data: Option<CompanyData>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub quality_rating: Option<f64>,
    pub innovation_rating: Option<f64>,
    pub sustainability_rating: Option<f64>,
    pub production_cost: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub inventory_level: Option<u64>,
    pub production_capacity: Option<u64>,
    pub development_cost: Option<Decimal>,
    pub marketing_budget: Option<Decimal>,
    pub status: Option<ProductStatus>,
    pub launch_period: Option<Period>,
    pub discontinue_period: Option<Period>,
    pub data: Option<ProductData>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecisionPatch {
    /// Replaces both the stored type and payload.
    pub kind: Option<DecisionKind>,
    pub processed: Option<bool>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}
