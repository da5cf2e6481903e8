//! Per-period outcome records. Both are append-only.

use crate::ids::{CompanyId, ProductId};
use crate::Period;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregated outcome of one company for one period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceResults {
    pub id: String,
    pub company_id: CompanyId,
    pub period: Period,
    pub revenue: Decimal,
    pub costs: Decimal,
    pub profit: Decimal,
    /// Sum of the overall market shares of the company's active products.
    pub market_share: f64,
    /// Equal to profit.
    pub cash_flow: Decimal,
    /// Profit over costs; 0 when there were no costs.
    pub roi: f64,
    /// Mean over the company's active products.
    pub customer_satisfaction: f64,
    pub employee_satisfaction: f64,
    pub sustainability_score: f64,
    pub innovation_score: f64,
    /// Applied to brand value before clamping.
    pub brand_value_change: f64,
    #[serde(default)]
    pub product_breakdown: Vec<ProductBreakdown>,
    pub created_at: DateTime<Utc>,
}

/// One product's contribution to a company's results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductBreakdown {
    pub product_id: ProductId,
    pub name: String,
    pub revenue: Decimal,
    pub market_share: f64,
}

/// Components of a product's attractiveness score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttractivenessFactors {
    pub quality_score: f64,
    pub price_score: f64,
    pub innovation_score: f64,
    pub sustainability_score: f64,
    pub marketing_effectiveness: f64,
    pub total_attractiveness: f64,
}

/// Outcome of one product for one period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPerformance {
    pub id: String,
    pub product_id: ProductId,
    pub period: Period,
    /// Units actually sold (demand capped by inventory).
    pub sales_volume: u64,
    /// Demand before the inventory cap.
    pub potential_sales: u64,
    pub revenue: Decimal,
    pub production_costs: Decimal,
    pub marketing_costs: Decimal,
    pub costs: Decimal,
    pub profit: Decimal,
    /// Share within the product's own segment.
    pub segment_market_share: f64,
    /// Share of the whole market.
    pub market_share: f64,
    pub customer_satisfaction: f64,
    pub attractiveness: AttractivenessFactors,
    pub created_at: DateTime<Utc>,
}
