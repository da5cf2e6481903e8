//! One engine per simulation, each behind its own lock.
//!
//! Mutating calls on a simulation are serialized by its mutex; readers take
//! cloned snapshots and never hold the lock across their own work.

use crate::engine::{EngineError, PeriodReport, SimulationEngine};
use chrono::{DateTime, Utc};
use sim_core::{SimulationId, SimulationState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Slot = Arc<Mutex<SimulationEngine>>;

#[derive(Default)]
pub struct EngineRegistry {
    engines: Mutex<HashMap<SimulationId, Slot>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicked writer leaves the previous published state in place.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a simulation, replacing any engine already under its id.
    pub fn insert(&self, state: SimulationState) -> SimulationId {
        let id = state.simulation.id.clone();
        lock(&self.engines).insert(id.clone(), Arc::new(Mutex::new(SimulationEngine::new(state))));
        id
    }

    pub fn remove(&self, id: &SimulationId) -> Option<SimulationState> {
        let slot = lock(&self.engines).remove(id)?;
        let engine = lock(&slot).clone();
        Some(engine.into_state())
    }

    pub fn ids(&self) -> Vec<SimulationId> {
        let mut ids: Vec<_> = lock(&self.engines).keys().cloned().collect();
        ids.sort();
        ids
    }

    fn slot(&self, id: &SimulationId) -> Result<Slot, EngineError> {
        lock(&self.engines)
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::SimulationNotFound(id.clone()))
    }

    /// Run `f` with exclusive access to one simulation's engine.
    pub fn with_engine<T>(
        &self,
        id: &SimulationId,
        f: impl FnOnce(&mut SimulationEngine) -> T,
    ) -> Result<T, EngineError> {
        let slot = self.slot(id)?;
        let mut engine = lock(&slot);
        Ok(f(&mut engine))
    }

    /// Cloned view of the current published state.
    pub fn snapshot(&self, id: &SimulationId) -> Result<SimulationState, EngineError> {
        self.with_engine(id, |e| e.state().clone())
    }

    pub fn advance(
        &self,
        id: &SimulationId,
        now: DateTime<Utc>,
    ) -> Result<PeriodReport, EngineError> {
        self.with_engine(id, |e| e.advance_period(now))
    }
}
