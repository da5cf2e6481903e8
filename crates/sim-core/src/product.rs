//! Products and their lifecycle.

use crate::ids::{CompanyId, ProductId};
use crate::market::Segment;
use crate::Period;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Product lifecycle. Moves only forward: development, active, discontinued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Development,
    Active,
    Discontinued,
}

impl ProductStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductStatus::Development => "development",
            ProductStatus::Active => "active",
            ProductStatus::Discontinued => "discontinued",
        }
    }

    /// Whether moving from `self` to `next` follows the one-way lifecycle.
    pub fn can_become(self, next: ProductStatus) -> bool {
        matches!(
            (self, next),
            (ProductStatus::Development, ProductStatus::Active)
                | (ProductStatus::Development, ProductStatus::Discontinued)
                | (ProductStatus::Active, ProductStatus::Discontinued)
        )
    }
}

/// Free-form product details.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductData {
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub target_audience: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A product sold by a company into one market segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub company_id: CompanyId,
    pub name: String,
    pub description: String,
    /// Segment the product competes in.
    pub category: Segment,
    /// Ratings are nominally 0 to 10 but not clamped.
    pub quality_rating: f64,
    pub innovation_rating: f64,
    pub sustainability_rating: f64,
    /// Cost per unit produced and per unit sold.
    pub production_cost: Decimal,
    pub selling_price: Decimal,
    /// Units in stock; production adds, sales deplete, never below zero.
    pub inventory_level: u64,
    /// Most units one production order can add.
    pub production_capacity: u64,
    pub development_cost: Decimal,
    /// Spend for the current period; replaced by each marketing decision.
    pub marketing_budget: Decimal,
    pub status: ProductStatus,
    /// Planned launch while in development, actual launch once active.
    pub launch_period: Option<Period>,
    pub discontinue_period: Option<Period>,
    #[serde(default)]
    pub data: ProductData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_is_one_way() {
        use ProductStatus::*;
        assert!(Development.can_become(Active));
        assert!(Active.can_become(Discontinued));
        assert!(!Active.can_become(Development));
        assert!(!Discontinued.can_become(Active));
        assert!(!Discontinued.can_become(Discontinued));
    }
}
