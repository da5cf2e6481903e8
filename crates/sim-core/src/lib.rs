#![deny(warnings)]

//! Core domain models and invariants for the strategy simulation.
//!
//! This crate defines the serializable entity records (simulations,
//! companies, products, decisions, market snapshots, performance results,
//! events) and validation helpers that check the invariants the engine is
//! expected to preserve.

pub mod company;
pub mod decision;
pub mod ids;
pub mod market;
pub mod performance;
pub mod product;
pub mod state;

pub use company::*;
pub use decision::*;
pub use ids::*;
pub use market::*;
pub use performance::*;
pub use product::*;
pub use state::*;

use std::collections::BTreeSet;
use thiserror::Error;

/// Discrete simulation period index.
pub type Period = u32;

/// Tolerance used when checking that segment shares sum to one.
pub const SHARE_TOLERANCE: f64 = 1e-9;

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Segment shares must sum to one.
    #[error("segment shares of period {period} sum to {sum}, expected 1")]
    SegmentSharesNotNormalized { period: Period, sum: f64 },
    /// Sustainability importance must be within [0, 1].
    #[error("sustainability importance {0} outside [0,1]")]
    SustainabilityOutOfRange(f64),
    /// Preference weights must be within [0, 1].
    #[error("preference weight {0} outside [0,1]")]
    PreferenceOutOfRange(f64),
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// Brand value must stay within [1, 100].
    #[error("brand value {value} of company {company} outside [1,100]")]
    BrandValueOutOfRange { company: CompanyId, value: f64 },
    /// At most one market snapshot per period.
    #[error("duplicate market conditions for period {0}")]
    DuplicateMarketConditions(Period),
    /// Processed decisions must carry a processing timestamp.
    #[error("decision {0} is processed but has no processedAt")]
    MissingProcessedAt(DecisionId),
    /// A product references a company that does not exist.
    #[error("product {product} references unknown company {company}")]
    UnknownCompany { product: ProductId, company: CompanyId },
}

/// Validate a single market snapshot.
pub fn validate_market_conditions(mc: &MarketConditions) -> Result<(), ValidationError> {
    if !mc.total_market_size.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    let sum: f64 = mc.segment_distribution.values().sum();
    if !mc.segment_distribution.is_empty() && (sum - 1.0).abs() > SHARE_TOLERANCE {
        return Err(ValidationError::SegmentSharesNotNormalized {
            period: mc.period,
            sum,
        });
    }
    if !(0.0..=1.0).contains(&mc.sustainability_importance) {
        return Err(ValidationError::SustainabilityOutOfRange(
            mc.sustainability_importance,
        ));
    }
    for weights in mc.consumer_preferences.values() {
        for &w in weights.0.values() {
            if !(0.0..=1.0).contains(&w) {
                return Err(ValidationError::PreferenceOutOfRange(w));
            }
        }
    }
    Ok(())
}

/// Validate a company record.
pub fn validate_company(c: &Company) -> Result<(), ValidationError> {
    if !(BRAND_VALUE_MIN..=BRAND_VALUE_MAX).contains(&c.brand_value) {
        return Err(ValidationError::BrandValueOutOfRange {
            company: c.id.clone(),
            value: c.brand_value,
        });
    }
    Ok(())
}

/// Validate the whole state, including cross-references.
pub fn validate_state(state: &SimulationState) -> Result<(), ValidationError> {
    let mut periods = BTreeSet::new();
    for mc in &state.market_conditions {
        if !periods.insert(mc.period) {
            return Err(ValidationError::DuplicateMarketConditions(mc.period));
        }
        validate_market_conditions(mc)?;
    }
    for c in &state.companies {
        validate_company(c)?;
    }
    for p in &state.products {
        if state.company(&p.company_id).is_none() {
            return Err(ValidationError::UnknownCompany {
                product: p.id.clone(),
                company: p.company_id.clone(),
            });
        }
        if !(p.quality_rating.is_finite()
            && p.innovation_rating.is_finite()
            && p.sustainability_rating.is_finite())
        {
            return Err(ValidationError::NonFinite);
        }
    }
    for d in &state.decisions {
        if d.processed && d.processed_at.is_none() {
            return Err(ValidationError::MissingProcessedAt(d.id.clone()));
        }
    }
    Ok(())
}
