#![deny(warnings)]

//! Simulation runtime: decision processing, the period engine, simulation
//! setup and the per-simulation engine registry.

pub mod engine;
pub mod factory;
pub mod processor;
pub mod registry;

#[cfg(test)]
mod testutil;

pub use engine::{
    advance_period, period_rng, Diagnostic, EngineError, PeriodReport, SimulationEngine,
    StagedPeriod,
};
pub use factory::SimulationFactory;
pub use processor::{process_decision, DecisionOutcome, MissingRef};
pub use registry::EngineRegistry;
