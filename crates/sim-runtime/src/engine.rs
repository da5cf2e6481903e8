//! Simulation engine: the period transition and the operations around it.
//!
//! [`advance_period`] is the pure transition. [`SimulationEngine`] owns one
//! simulation's state and stages each transition on a copy, so the caller can
//! persist the staged state before it becomes visible.

use crate::processor::{self, MissingRef};
use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use sim_core::{
    Company, CompanyData, CompanyId, Decision, DecisionId, DecisionKind, Event, EventId,
    MarketConditions, NewProduct, PerformanceResults, Period, Product, ProductId,
    ProductPerformance, ProductStatus, SimulationState, SimulationStatus, UserId,
};
use sim_econ::{advance_market, calculate_performance, generate_event};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Brand value of a newly founded company.
pub const INITIAL_BRAND_VALUE: f64 = 50.0;
/// Credit rating of a newly founded company.
pub const INITIAL_CREDIT_RATING: &str = "A";

/// Errors returned by engine operations. None of them leave state half-applied.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// No company with this id in the simulation.
    #[error("company {0} not found")]
    CompanyNotFound(CompanyId),
    /// No product with this id in the simulation.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),
    /// A decision was submitted for a company the user does not own.
    #[error("user {user} does not own company {company}")]
    NotOwner { user: UserId, company: CompanyId },
    /// Only the simulation's creator may found companies in it.
    #[error("user {0} did not create this simulation")]
    NotSimulationOwner(UserId),
    /// Product lifecycle moves only from development to active.
    #[error("product {product} cannot go from {from} to {to}")]
    InvalidStatusTransition {
        product: ProductId,
        from: &'static str,
        to: &'static str,
    },
    /// The staged transition started from a different period.
    #[error("staged period {staged} does not follow current period {current}")]
    StaleStage { staged: Period, current: Period },
    /// The state was modified after the transition was staged.
    #[error("state changed since staging (revision {staged}, now {current})")]
    ChangedSinceStage { staged: u64, current: u64 },
    /// Registry lookup for an unknown simulation.
    #[error("simulation {0} is not registered")]
    SimulationNotFound(sim_core::SimulationId),
}

/// Something a period skipped without failing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// A decision named a product or loan its company does not have.
    MissingReference {
        decision: DecisionId,
        reference: MissingRef,
    },
    /// Pending decisions whose company does not exist stay unprocessed.
    UnknownCompany {
        decision: DecisionId,
        company: CompanyId,
    },
    /// No market snapshot for the closed period.
    MissingMarketConditions(Period),
}

/// Summary of one period transition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeriodReport {
    /// The period that was closed.
    pub period: Period,
    pub applied: Vec<DecisionId>,
    pub diagnostics: Vec<Diagnostic>,
    /// Whether the next period's market snapshot was produced.
    pub market_advanced: bool,
    pub event: Option<EventId>,
    pub evaluated: Vec<CompanyId>,
    pub idle: Vec<CompanyId>,
}

/// RNG for one period, derived from the simulation seed.
pub fn period_rng(seed: u64, period: Period) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed ^ u64::from(period).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Close the current period.
///
/// Applies pending decisions company by company in submission order, appends
/// the next market snapshot (and possibly an event), scores the closed period
/// against its own snapshot, then moves to the next period.
pub fn advance_period<R: Rng + ?Sized>(
    mut state: SimulationState,
    rng: &mut R,
    now: DateTime<Utc>,
) -> (SimulationState, PeriodReport) {
    let period = state.current_period();
    let mut report = PeriodReport {
        period,
        ..PeriodReport::default()
    };

    process_pending(&mut state, period, now, &mut report);

    match state.market_conditions_for(period).cloned() {
        Some(current) => {
            let next = advance_market(&current, rng, now);
            state.market_conditions.push(next);
            report.market_advanced = true;
            let freq = state.simulation.config.events_frequency;
            if let Some(ev) = generate_event(rng, freq, &state.simulation.id, period + 1, now) {
                report.event = Some(ev.id.clone());
                state.events.push(ev);
            }
        }
        None => {
            warn!(period, "no market conditions; market left unchanged");
            report
                .diagnostics
                .push(Diagnostic::MissingMarketConditions(period));
        }
    }

    if let Some(run) = calculate_performance(&mut state, now) {
        report.evaluated = run.evaluated;
        report.idle = run.idle;
    }

    state.simulation.current_period = period + 1;
    state.simulation.updated_at = now;
    info!(
        simulation = %state.simulation.id,
        period = state.simulation.current_period,
        applied = report.applied.len(),
        "period advanced"
    );
    (state, report)
}

fn process_pending(
    state: &mut SimulationState,
    period: Period,
    now: DateTime<Utc>,
    report: &mut PeriodReport,
) {
    // Group by company, keeping first-seen company order and per-company order.
    let mut groups: Vec<(CompanyId, Vec<usize>)> = Vec::new();
    for (i, d) in state.decisions.iter().enumerate() {
        if !d.is_pending_for(period) {
            continue;
        }
        match groups.iter_mut().find(|(c, _)| c == &d.company_id) {
            Some((_, v)) => v.push(i),
            None => groups.push((d.company_id.clone(), vec![i])),
        }
    }

    for (company_id, indices) in groups {
        let Some(ci) = state.companies.iter().position(|c| c.id == company_id) else {
            warn!(company = %company_id, "decisions for unknown company left pending");
            report
                .diagnostics
                .extend(indices.iter().map(|&i| Diagnostic::UnknownCompany {
                    decision: state.decisions[i].id.clone(),
                    company: company_id.clone(),
                }));
            continue;
        };
        for i in indices {
            let kind = state.decisions[i].kind.clone();
            let outcome = processor::process_decision(state, ci, &kind, now);
            let d = &mut state.decisions[i];
            d.processed = true;
            d.processed_at = Some(now);
            report
                .diagnostics
                .extend(outcome.missing.into_iter().map(|r| Diagnostic::MissingReference {
                    decision: d.id.clone(),
                    reference: r,
                }));
            report.applied.push(d.id.clone());
        }
    }
}

/// A transition computed but not yet visible.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedPeriod {
    /// Period the transition started from.
    pub from: Period,
    /// Engine revision the transition was computed from.
    pub revision: u64,
    pub state: SimulationState,
    pub report: PeriodReport,
}

/// Owner of one simulation's state.
#[derive(Clone, Debug)]
pub struct SimulationEngine {
    state: SimulationState,
    /// Bumped by every mutation so a stale stage cannot overwrite newer state.
    revision: u64,
}

impl SimulationEngine {
    pub fn new(state: SimulationState) -> Self {
        Self { state, revision: 0 }
    }

    /// Counter of mutations applied to this engine.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    fn replace_state(&mut self, state: SimulationState) {
        self.state = state;
        self.touch();
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn into_state(self) -> SimulationState {
        self.state
    }

    pub fn current_period(&self) -> Period {
        self.state.current_period()
    }

    /// Compute the next period without touching the published state.
    pub fn stage_advance(&self, now: DateTime<Utc>) -> StagedPeriod {
        let from = self.state.current_period();
        let mut rng = period_rng(self.state.simulation.config.rng_seed, from);
        let (state, report) = advance_period(self.state.clone(), &mut rng, now);
        StagedPeriod {
            from,
            revision: self.revision,
            state,
            report,
        }
    }

    /// Make a staged transition visible.
    ///
    /// Rejects stages computed from another period, and stages taken before
    /// any later mutation such as a decision submitted in between.
    pub fn publish(&mut self, staged: StagedPeriod) -> Result<PeriodReport, EngineError> {
        let current = self.state.current_period();
        if staged.from != current {
            return Err(EngineError::StaleStage {
                staged: staged.from,
                current,
            });
        }
        if staged.revision != self.revision {
            return Err(EngineError::ChangedSinceStage {
                staged: staged.revision,
                current: self.revision,
            });
        }
        self.replace_state(staged.state);
        Ok(staged.report)
    }

    /// Stage and publish in one step.
    pub fn advance_period(&mut self, now: DateTime<Utc>) -> PeriodReport {
        let staged = self.stage_advance(now);
        self.replace_state(staged.state);
        staged.report
    }

    /// Stage, hand the staged state to `commit`, and publish only if it succeeds.
    pub fn advance_period_with<E, F>(
        &mut self,
        now: DateTime<Utc>,
        commit: F,
    ) -> Result<PeriodReport, E>
    where
        F: FnOnce(&SimulationState) -> Result<(), E>,
    {
        let staged = self.stage_advance(now);
        commit(&staged.state)?;
        self.replace_state(staged.state);
        Ok(staged.report)
    }

    /// Queue a decision for the current period. The company is not checked.
    pub fn submit_decision(
        &mut self,
        company_id: CompanyId,
        kind: DecisionKind,
        now: DateTime<Utc>,
    ) -> DecisionId {
        let id = DecisionId(self.state.next_id("decision"));
        self.touch();
        debug!(decision = %id, company = %company_id, kind = kind.type_name(), "decision submitted");
        self.state.decisions.push(Decision {
            id: id.clone(),
            company_id,
            period: self.state.current_period(),
            kind,
            submitted_at: now,
            processed: false,
            processed_at: None,
        });
        id
    }

    /// Queue a decision on behalf of `user`, who must own the company.
    pub fn submit_decision_as(
        &mut self,
        user: &UserId,
        company_id: CompanyId,
        kind: DecisionKind,
        now: DateTime<Utc>,
    ) -> Result<DecisionId, EngineError> {
        let company = self
            .state
            .company(&company_id)
            .ok_or_else(|| EngineError::CompanyNotFound(company_id.clone()))?;
        if &company.user_id != user {
            return Err(EngineError::NotOwner {
                user: user.clone(),
                company: company_id,
            });
        }
        Ok(self.submit_decision(company_id, kind, now))
    }

    /// Found a company. Only the simulation's creator may do so.
    pub fn create_company(
        &mut self,
        user: &UserId,
        name: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<CompanyId, EngineError> {
        if &self.state.simulation.created_by != user {
            return Err(EngineError::NotSimulationOwner(user.clone()));
        }
        let id = CompanyId(self.state.next_id("company"));
        self.touch();
        let cash: Decimal = self.state.simulation.config.initial_cash;
        self.state.companies.push(Company {
            id: id.clone(),
            simulation_id: self.state.simulation.id.clone(),
            user_id: user.clone(),
            name: name.to_string(),
            description: description.to_string(),
            logo_url: None,
            cash_balance: cash,
            total_assets: cash,
            total_liabilities: Decimal::ZERO,
            credit_rating: INITIAL_CREDIT_RATING.to_string(),
            brand_value: INITIAL_BRAND_VALUE,
            data: CompanyData::default(),
            created_at: now,
            updated_at: now,
        });
        info!(company = %id, name, "company created");
        Ok(id)
    }

    /// Add a product directly, without charging development cost.
    pub fn create_product(
        &mut self,
        company_id: &CompanyId,
        spec: &NewProduct,
        status: ProductStatus,
        now: DateTime<Utc>,
    ) -> Result<ProductId, EngineError> {
        let ci = self
            .state
            .companies
            .iter()
            .position(|c| &c.id == company_id)
            .ok_or_else(|| EngineError::CompanyNotFound(company_id.clone()))?;
        self.touch();
        Ok(processor::new_product(&mut self.state, ci, spec, status, now))
    }

    /// Move a product from development to active in the current period.
    pub fn launch_product(
        &mut self,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let period = self.state.current_period();
        let p = self
            .state
            .products
            .iter_mut()
            .find(|p| &p.id == product_id)
            .ok_or_else(|| EngineError::ProductNotFound(product_id.clone()))?;
        if p.status != ProductStatus::Development {
            return Err(EngineError::InvalidStatusTransition {
                product: product_id.clone(),
                from: p.status.as_str(),
                to: ProductStatus::Active.as_str(),
            });
        }
        p.status = ProductStatus::Active;
        p.launch_period = Some(period);
        p.updated_at = now;
        self.touch();
        info!(product = %product_id, period, "product launched");
        Ok(())
    }

    pub fn set_status(&mut self, status: SimulationStatus, now: DateTime<Utc>) {
        self.state.simulation.status = status;
        self.state.simulation.updated_at = now;
        self.touch();
    }

    // ---------- queries ----------

    pub fn company(&self, id: &CompanyId) -> Option<&Company> {
        self.state.company(id)
    }

    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.state.product(id)
    }

    pub fn company_products(&self, id: &CompanyId) -> Vec<&Product> {
        self.state
            .products
            .iter()
            .filter(|p| &p.company_id == id)
            .collect()
    }

    /// Results of `period`, or the latest when `period` is `None`.
    pub fn company_performance(
        &self,
        id: &CompanyId,
        period: Option<Period>,
    ) -> Option<&PerformanceResults> {
        let rows = self
            .state
            .performance_results
            .iter()
            .filter(|r| &r.company_id == id);
        pick_period(rows, period, |r| r.period)
    }

    /// All results of a company, oldest first.
    pub fn company_performance_history(&self, id: &CompanyId) -> Vec<&PerformanceResults> {
        let mut rows: Vec<_> = self
            .state
            .performance_results
            .iter()
            .filter(|r| &r.company_id == id)
            .collect();
        rows.sort_by_key(|r| r.period);
        rows
    }

    pub fn product_performance(
        &self,
        id: &ProductId,
        period: Option<Period>,
    ) -> Option<&ProductPerformance> {
        let rows = self
            .state
            .product_performance
            .iter()
            .filter(|r| &r.product_id == id);
        pick_period(rows, period, |r| r.period)
    }

    pub fn product_performance_history(&self, id: &ProductId) -> Vec<&ProductPerformance> {
        let mut rows: Vec<_> = self
            .state
            .product_performance
            .iter()
            .filter(|r| &r.product_id == id)
            .collect();
        rows.sort_by_key(|r| r.period);
        rows
    }

    pub fn market_conditions(&self, period: Option<Period>) -> Option<&MarketConditions> {
        pick_period(self.state.market_conditions.iter(), period, |m| m.period)
    }

    /// Events of `period`, or every event oldest first.
    pub fn events(&self, period: Option<Period>) -> Vec<&Event> {
        let mut rows: Vec<_> = self
            .state
            .events
            .iter()
            .filter(|e| period.map_or(true, |p| e.period == p))
            .collect();
        rows.sort_by_key(|e| e.period);
        rows
    }

    pub fn decisions(&self, company: &CompanyId, period: Option<Period>) -> Vec<&Decision> {
        self.state
            .decisions
            .iter()
            .filter(|d| &d.company_id == company && period.map_or(true, |p| d.period == p))
            .collect()
    }
}

fn pick_period<'a, T: 'a>(
    rows: impl Iterator<Item = &'a T>,
    period: Option<Period>,
    key: impl Fn(&T) -> Period,
) -> Option<&'a T> {
    match period {
        Some(p) => rows.into_iter().find(|r| key(*r) == p),
        None => rows.max_by_key(|r| key(*r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{company, product, state_at, ts};
    use proptest::prelude::*;
    use serde_json::json;
    use sim_core::{validate_state, Preference, PreferenceWeights, Segment};

    fn kind(v: serde_json::Value) -> DecisionKind {
        serde_json::from_value(v).unwrap()
    }

    /// One company, one active mid-range product, all weights 0.5.
    fn single_company() -> SimulationEngine {
        let mut s = state_at(0);
        s.market_conditions[0]
            .consumer_preferences
            .insert(Segment::MidRange, PreferenceWeights::default());
        s.companies.push(company("c1"));
        s.products.push(product("p1", "c1", Segment::MidRange));
        SimulationEngine::new(s)
    }

    #[test]
    fn single_company_period() {
        let mut e = single_company();
        let report = e.advance_period(ts());
        let s = e.state();
        assert_eq!(s.current_period(), 1);
        assert_eq!(report.period, 0);
        assert!(report.market_advanced);
        assert_eq!(s.market_conditions.len(), 2);
        assert_eq!(s.performance_results.len(), 1);
        assert_eq!(s.performance_results[0].period, 0);
        assert_eq!(s.product_performance.len(), 1);
        assert!(s.products[0].inventory_level < 1000);
        assert!(s.companies[0].cash_balance > Decimal::new(1_000_000, 0));
        assert_ne!(s.companies[0].brand_value, 50.0);
        validate_state(s).unwrap();
    }

    #[test]
    fn pricing_applies_before_market_and_marks_processed() {
        let mut e = single_company();
        let id = e.submit_decision(
            CompanyId::from("c1"),
            kind(json!({"type": "pricing", "data": {"productId": "p1", "price": 50}})),
            ts(),
        );
        let mut s = e.state().clone();
        let mut report = PeriodReport::default();
        process_pending(&mut s, 0, ts(), &mut report);
        assert_eq!(s.products[0].selling_price, Decimal::new(50, 0));
        assert_eq!(report.applied, vec![id.clone()]);

        e.advance_period(ts());
        let ds = e.decisions(&CompanyId::from("c1"), Some(0));
        let d = ds[0];
        assert!(d.processed);
        assert_eq!(d.processed_at, Some(ts()));
        assert_eq!(d.id, id);
        assert_eq!(e.product(&ProductId::from("p1")).unwrap().selling_price, Decimal::new(50, 0));
    }

    #[test]
    fn processed_decisions_are_never_reapplied() {
        let mut e = single_company();
        e.submit_decision(
            CompanyId::from("c1"),
            kind(json!({"type": "finance", "data": {"action": "dividend", "amount": 1000}})),
            ts(),
        );
        e.advance_period(ts());
        let dividends = e.state().companies[0].data.dividends.len();

        // Put the decision back in the current period; it must stay untouched.
        let mut s = e.state().clone();
        s.decisions[0].period = s.current_period();
        let mut e = SimulationEngine::new(s);
        let report = e.advance_period(ts());
        assert!(report.applied.is_empty());
        assert_eq!(e.state().companies[0].data.dividends.len(), dividends);
    }

    #[test]
    fn late_submission_targets_the_new_period() {
        let mut e = single_company();
        e.advance_period(ts());
        let id = e.submit_decision(
            CompanyId::from("c1"),
            kind(json!({"type": "research", "data": {"name": "x", "type": "y", "budget": 1}})),
            ts(),
        );
        let d = e.state().decisions.iter().find(|d| d.id == id).unwrap();
        assert_eq!(d.period, 1);
    }

    #[test]
    fn unknown_company_decisions_stay_pending() {
        let mut e = single_company();
        let id = e.submit_decision(
            CompanyId::from("ghost"),
            kind(json!({"type": "finance", "data": {"action": "dividend", "amount": 1}})),
            ts(),
        );
        let report = e.advance_period(ts());
        assert!(report.diagnostics.contains(&Diagnostic::UnknownCompany {
            decision: id,
            company: CompanyId::from("ghost"),
        }));
        assert!(!e.state().decisions[0].processed);
    }

    #[test]
    fn idle_company_loses_fixed_cost() {
        let mut s = state_at(0);
        s.companies.push(company("c1"));
        let mut e = SimulationEngine::new(s);
        let report = e.advance_period(ts());
        assert_eq!(report.idle, vec![CompanyId::from("c1")]);
        let c = e.company(&CompanyId::from("c1")).unwrap();
        assert_eq!(c.cash_balance, Decimal::new(950_000, 0));
        assert_eq!(c.brand_value, 45.0);
        let pr = e.company_performance(&CompanyId::from("c1"), None).unwrap();
        assert_eq!(pr.revenue, Decimal::ZERO);
        assert_eq!(pr.profit, Decimal::new(-50_000, 0));
    }

    #[test]
    fn repay_loan_is_clamped_to_remaining() {
        let mut e = single_company();
        e.submit_decision(
            CompanyId::from("c1"),
            kind(json!({"type": "finance", "data": {"action": "loan", "amount": 300}})),
            ts(),
        );
        let staged = e.stage_advance(ts());
        let mut s = staged.state;
        let loan_id = s.companies[0].data.loans[0].id.clone();
        let cash = s.companies[0].cash_balance;
        let liabilities = s.companies[0].total_liabilities;
        let mut report = PeriodReport::default();
        let period = s.current_period();
        s.decisions.push(Decision {
            id: "d_repay".into(),
            company_id: CompanyId::from("c1"),
            period,
            kind: kind(json!({"type": "finance", "data": {
                "action": "repay_loan", "loanId": loan_id.as_str(), "amount": 500
            }})),
            submitted_at: ts(),
            processed: false,
            processed_at: None,
        });
        process_pending(&mut s, period, ts(), &mut report);
        let c = &s.companies[0];
        assert_eq!(cash - c.cash_balance, Decimal::new(300, 0));
        assert_eq!(liabilities - c.total_liabilities, Decimal::new(300, 0));
        assert_eq!(c.data.loans[0].remaining_amount, Decimal::ZERO);
    }

    #[test]
    fn negative_cash_is_permitted() {
        let mut e = single_company();
        e.submit_decision(
            CompanyId::from("c1"),
            kind(json!({"type": "marketing", "data": {"productId": "p1", "budget": 5000000}})),
            ts(),
        );
        e.advance_period(ts());
        assert!(e.state().companies[0].cash_balance < Decimal::ZERO);
    }

    #[test]
    fn production_clamp_through_engine() {
        let mut e = single_company();
        e.submit_decision(
            CompanyId::from("c1"),
            kind(json!({"type": "production", "data": {"productId": "p1", "productionVolume": 4000}})),
            ts(),
        );
        let mut s = e.state().clone();
        process_pending(&mut s, 0, ts(), &mut PeriodReport::default());
        assert_eq!(s.products[0].inventory_level, 2000);
        assert_eq!(s.companies[0].cash_balance, Decimal::new(900_000, 0));
    }

    #[test]
    fn stale_stage_is_rejected_and_commit_failure_keeps_state() {
        let mut e = single_company();
        let stale = e.stage_advance(ts());
        e.advance_period(ts());
        assert_eq!(
            e.publish(stale),
            Err(EngineError::StaleStage {
                staged: 0,
                current: 1
            })
        );

        let before = e.state().clone();
        let res: Result<PeriodReport, &str> = e.advance_period_with(ts(), |_| Err("disk full"));
        assert_eq!(res, Err("disk full"));
        assert_eq!(e.state(), &before);

        let res: Result<PeriodReport, &str> = e.advance_period_with(ts(), |staged| {
            assert_eq!(staged.current_period(), 2);
            Ok(())
        });
        assert!(res.is_ok());
        assert_eq!(e.current_period(), 2);
    }

    #[test]
    fn decision_submitted_after_staging_blocks_publish() {
        let mut e = single_company();
        let staged = e.stage_advance(ts());
        let id = e.submit_decision(
            CompanyId::from("c1"),
            kind(json!({"type": "pricing", "data": {"productId": "p1", "price": 150}})),
            ts(),
        );
        assert_eq!(
            e.publish(staged),
            Err(EngineError::ChangedSinceStage {
                staged: 0,
                current: 1
            })
        );
        assert_eq!(e.current_period(), 0);
        assert!(e.state().decisions.iter().any(|d| d.id == id && !d.processed));

        // A fresh stage picks the late decision up, and ids keep increasing.
        let staged = e.stage_advance(ts());
        assert_eq!(staged.report.applied, vec![id.clone()]);
        e.publish(staged).unwrap();
        let next = e.submit_decision(
            CompanyId::from("c1"),
            kind(json!({"type": "pricing", "data": {"productId": "p1", "price": 140}})),
            ts(),
        );
        assert_ne!(next, id);
    }

    #[test]
    fn longest_development_time_does_not_break_the_period() {
        let mut e = single_company();
        e.advance_period(ts());
        e.submit_decision(
            CompanyId::from("c1"),
            kind(json!({"type": "product_development", "data": {
                "action": "new_product", "name": "Someday", "category": "premium",
                "productionCost": 10, "sellingPrice": 20, "developmentTime": u32::MAX
            }})),
            ts(),
        );
        let report = e.advance_period(ts());
        assert_eq!(report.applied.len(), 1);
        let p = e.state().products.last().unwrap();
        assert_eq!(p.launch_period, Some(u32::MAX));
        assert_eq!(e.current_period(), 2);
    }

    #[test]
    fn oversized_production_does_not_break_the_period() {
        let mut s = single_company().into_state();
        s.products[0].production_capacity = u64::MAX;
        s.products[0].production_cost = Decimal::new(10_000_000_000, 0);
        let mut e = SimulationEngine::new(s);
        e.submit_decision(
            CompanyId::from("c1"),
            kind(json!({"type": "production", "data": {"productId": "p1", "productionVolume": u64::MAX}})),
            ts(),
        );
        let report = e.advance_period(ts());
        assert_eq!(report.evaluated, vec![CompanyId::from("c1")]);
        assert!(e.state().companies[0].cash_balance < Decimal::ZERO);
    }

    #[test]
    fn runs_are_reproducible_per_seed() {
        let run = || {
            let mut e = single_company();
            for _ in 0..5 {
                e.advance_period(ts());
            }
            e.into_state()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn ownership_is_checked_on_behalf_of_user() {
        let mut e = single_company();
        let k = kind(json!({"type": "pricing", "data": {"productId": "p1", "price": 1}}));
        assert_eq!(
            e.submit_decision_as(&UserId::from("mallory"), CompanyId::from("c1"), k.clone(), ts()),
            Err(EngineError::NotOwner {
                user: UserId::from("mallory"),
                company: CompanyId::from("c1")
            })
        );
        assert_eq!(
            e.submit_decision_as(&UserId::from("u1"), CompanyId::from("nope"), k.clone(), ts()),
            Err(EngineError::CompanyNotFound(CompanyId::from("nope")))
        );
        assert!(e
            .submit_decision_as(&UserId::from("u1"), CompanyId::from("c1"), k, ts())
            .is_ok());
    }

    #[test]
    fn company_and_product_setup() {
        let mut e = SimulationEngine::new(state_at(0));
        assert_eq!(
            e.create_company(&UserId::from("eve"), "X", "", ts()),
            Err(EngineError::NotSimulationOwner(UserId::from("eve")))
        );
        let cid = e.create_company(&UserId::from("u1"), "Acme", "", ts()).unwrap();
        let c = e.company(&cid).unwrap();
        assert_eq!(c.cash_balance, Decimal::new(1_000_000, 0));
        assert_eq!(c.total_assets, c.cash_balance);
        assert_eq!(c.credit_rating, "A");
        assert_eq!(c.brand_value, 50.0);

        let spec: NewProduct = serde_json::from_value(json!({
            "name": "Gadget", "category": "premium", "productionCost": 100, "sellingPrice": 400
        }))
        .unwrap();
        let pid = e
            .create_product(&cid, &spec, ProductStatus::Development, ts())
            .unwrap();
        assert_eq!(e.company_products(&cid).len(), 1);
        e.launch_product(&pid, ts()).unwrap();
        assert_eq!(e.product(&pid).unwrap().status, ProductStatus::Active);
        assert!(matches!(
            e.launch_product(&pid, ts()),
            Err(EngineError::InvalidStatusTransition { .. })
        ));
        assert_eq!(
            e.create_product(&CompanyId::from("nope"), &spec, ProductStatus::Active, ts()),
            Err(EngineError::CompanyNotFound(CompanyId::from("nope")))
        );
    }

    #[test]
    fn queries_default_to_latest_period() {
        let mut e = single_company();
        for _ in 0..3 {
            e.advance_period(ts());
        }
        let c1 = CompanyId::from("c1");
        assert_eq!(e.company_performance(&c1, None).unwrap().period, 2);
        assert_eq!(e.company_performance(&c1, Some(1)).unwrap().period, 1);
        assert_eq!(e.company_performance_history(&c1).len(), 3);
        let p1 = ProductId::from("p1");
        assert_eq!(e.product_performance(&p1, None).unwrap().period, 2);
        assert_eq!(e.product_performance_history(&p1).len(), 3);
        assert_eq!(e.market_conditions(None).unwrap().period, 3);
        assert!(e.market_conditions(Some(7)).is_none());
        assert!(e.events(None).len() <= 3);
    }

    #[test]
    fn missing_market_still_advances_period() {
        let mut s = state_at(0);
        s.market_conditions.clear();
        s.companies.push(company("c1"));
        let mut e = SimulationEngine::new(s);
        let report = e.advance_period(ts());
        assert_eq!(e.current_period(), 1);
        assert!(!report.market_advanced);
        assert!(report.evaluated.is_empty() && report.idle.is_empty());
        assert!(report
            .diagnostics
            .contains(&Diagnostic::MissingMarketConditions(0)));
    }

    proptest! {
        #[test]
        fn inventory_drops_by_realized_sales(
            inventory in 0u64..5_000_000,
            price in 1i64..100_000,
            capacity in 0u64..5_000_000,
            volume in 0u64..5_000_000,
        ) {
            let mut s = single_company().into_state();
            let p = &mut s.products[0];
            p.inventory_level = inventory;
            p.selling_price = Decimal::new(price, 0);
            p.production_capacity = capacity;
            let mut e = SimulationEngine::new(s);
            e.submit_decision(
                CompanyId::from("c1"),
                kind(json!({"type": "production", "data": {"productId": "p1", "productionVolume": volume}})),
                ts(),
            );
            e.advance_period(ts());

            let stocked = inventory + volume.min(capacity);
            let p1 = ProductId::from("p1");
            let realized = e.product_performance(&p1, Some(0)).unwrap().sales_volume;
            let after = e.product(&p1).unwrap().inventory_level;
            prop_assert!(realized <= stocked);
            prop_assert_eq!(after, stocked.saturating_sub(realized));
        }

        #[test]
        fn periods_advance_monotonically(seed in any::<u64>(), n in 1u32..12) {
            let mut s = single_company().into_state();
            s.simulation.config.rng_seed = seed;
            s.market_conditions[0].consumer_preferences.insert(
                Segment::Premium,
                PreferenceWeights::default().with(Preference::BrandLoyalty, 0.9),
            );
            let mut e = SimulationEngine::new(s);
            for k in 1..=n {
                e.advance_period(ts());
                prop_assert_eq!(e.current_period(), k);
            }
            let s = e.state();
            prop_assert_eq!(s.market_conditions.len() as u32, n + 1);
            prop_assert!(s.events.len() as u32 <= n);
            for c in &s.companies {
                prop_assert!((1.0..=100.0).contains(&c.brand_value));
            }
            for mc in &s.market_conditions {
                let sum: f64 = mc.segment_distribution.values().sum();
                prop_assert!((sum - 1.0).abs() < 1e-9);
            }
        }
    }
}
