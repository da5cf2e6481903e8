#![deny(warnings)]

//! Economic models for the strategy simulation.
//!
//! - [`evolution`]: random drift of market size, segment shares, indicators
//!   and consumer preferences from one period to the next
//! - [`events`]: probabilistic market events drawn from fixed templates
//! - [`performance`]: attractiveness-weighted market share, sales and the
//!   resulting company financials
//!
//! All randomness comes from a caller-supplied [`rand::Rng`], so a seeded
//! generator reproduces a run exactly.

pub mod events;
pub mod evolution;
pub mod performance;

pub use events::{generate_event, templates, EventTemplate, ImpactStrength};
pub use evolution::{advance_market, market_conditions_id, normalize_shares};
pub use performance::{
    attractiveness, calculate_performance, evaluate_product, segment_market_share,
    PerformanceRun, BASE_SEGMENT_SHARE, IDLE_FIXED_COST,
};
