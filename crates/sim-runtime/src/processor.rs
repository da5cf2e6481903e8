//! Decision processor: applies one decision to its company and the product list.
//!
//! Monetary mutations saturate at the decimal range; nothing checks for
//! overdraft. A decision that names a product or loan the company does not
//! have leaves state untouched for that reference and reports it in the
//! returned [`DecisionOutcome`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sim_core::{
    Campaign, CampaignTarget, Company, CompanyCampaign, Dividend, FinanceDecision, HumanResourcesDecision,
    Loan, LoanId, MarketingDecision, NewProduct, PricingDecision, Product, ProductData,
    ProductDevelopment, ProductId, ProductStatus, ProductUpdate, ProductionDecision,
    ResearchDecision, ResearchProject, ResearchStatus, SimulationState, CapacityExpansion,
    DecisionKind,
};
use tracing::{debug, warn};

/// Hiring cost per new employee as a fraction of the current average salary.
pub const HIRING_COST_RATIO: Decimal = Decimal::from_parts(2, 0, 0, false, 1);

/// A reference in a decision payload that did not resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MissingRef {
    /// Product unknown or owned by another company.
    Product(ProductId),
    Loan(LoanId),
}

/// What happened when a decision was applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecisionOutcome {
    /// References skipped while applying; empty when everything resolved.
    pub missing: Vec<MissingRef>,
}

impl DecisionOutcome {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
    }

    fn miss(&mut self, r: MissingRef) {
        warn!(reference = ?r, "decision references unknown entity; skipped");
        self.missing.push(r);
    }
}

/// Debit `amount` from the company's cash.
fn charge(company: &mut Company, amount: Decimal) {
    company.cash_balance = company.cash_balance.saturating_sub(amount);
}

/// Index of `product_id` in the product list if `ci`'s company owns it.
fn owned_product(state: &SimulationState, ci: usize, product_id: &ProductId) -> Option<usize> {
    let company_id = &state.companies[ci].id;
    state
        .products
        .iter()
        .position(|p| &p.id == product_id && &p.company_id == company_id)
}

/// Apply `kind` on behalf of the company at index `ci`.
///
/// Panics if `ci` is out of bounds; callers resolve the company first.
pub fn process_decision(
    state: &mut SimulationState,
    ci: usize,
    kind: &DecisionKind,
    now: DateTime<Utc>,
) -> DecisionOutcome {
    let mut out = DecisionOutcome::default();
    debug!(company = %state.companies[ci].id, kind = kind.type_name(), "applying decision");
    match kind {
        DecisionKind::ProductDevelopment(d) => product_development(state, ci, d, now, &mut out),
        DecisionKind::Pricing(d) => pricing(state, ci, d, now, &mut out),
        DecisionKind::Production(d) => production(state, ci, d, now, &mut out),
        DecisionKind::Marketing(d) => marketing(state, ci, d, now, &mut out),
        DecisionKind::Research(d) => research(state, ci, d),
        DecisionKind::HumanResources(d) => human_resources(state, ci, d),
        DecisionKind::Finance(d) => finance(state, ci, d, &mut out),
    }
    state.companies[ci].updated_at = now;
    out
}

/// Build a product in development from a new-product payload.
pub fn new_product(
    state: &mut SimulationState,
    ci: usize,
    spec: &NewProduct,
    status: ProductStatus,
    now: DateTime<Utc>,
) -> ProductId {
    let id = ProductId(state.next_id("product"));
    let period = state.current_period();
    let development_time = spec
        .development_time
        .unwrap_or(NewProduct::DEFAULT_DEVELOPMENT_TIME);
    let product = Product {
        id: id.clone(),
        company_id: state.companies[ci].id.clone(),
        name: spec.name.clone(),
        description: spec.description.clone(),
        category: spec.category,
        quality_rating: spec.quality_rating.unwrap_or(NewProduct::DEFAULT_RATING),
        innovation_rating: spec.innovation_rating.unwrap_or(NewProduct::DEFAULT_RATING),
        sustainability_rating: spec
            .sustainability_rating
            .unwrap_or(NewProduct::DEFAULT_RATING),
        production_cost: spec.production_cost,
        selling_price: spec.selling_price,
        inventory_level: 0,
        production_capacity: spec
            .production_capacity
            .unwrap_or(NewProduct::DEFAULT_CAPACITY),
        development_cost: spec.development_cost.unwrap_or(Decimal::ZERO),
        marketing_budget: Decimal::ZERO,
        status,
        launch_period: Some(period.saturating_add(development_time)),
        discontinue_period: None,
        data: ProductData {
            features: spec.features.clone(),
            target_audience: spec.target_audience.clone(),
            ..ProductData::default()
        },
        created_at: now,
        updated_at: now,
    };
    state.products.push(product);
    id
}

fn product_development(
    state: &mut SimulationState,
    ci: usize,
    d: &ProductDevelopment,
    now: DateTime<Utc>,
    out: &mut DecisionOutcome,
) {
    match d {
        ProductDevelopment::NewProduct(spec) => {
            let id = new_product(state, ci, spec, ProductStatus::Development, now);
            charge(&mut state.companies[ci], spec.development_cost.unwrap_or(Decimal::ZERO));
            debug!(product = %id, "product development started");
        }
        ProductDevelopment::UpdateProduct(u) => {
            let Some(pi) = owned_product(state, ci, &u.product_id) else {
                return out.miss(MissingRef::Product(u.product_id.clone()));
            };
            apply_update(&mut state.products[pi], u, now);
            if let Some(cost) = u.development_cost {
                charge(&mut state.companies[ci], cost);
            }
        }
        ProductDevelopment::DiscontinueProduct(r) => {
            let Some(pi) = owned_product(state, ci, &r.product_id) else {
                return out.miss(MissingRef::Product(r.product_id.clone()));
            };
            let period = state.current_period();
            let p = &mut state.products[pi];
            p.status = ProductStatus::Discontinued;
            p.discontinue_period = Some(period);
            p.updated_at = now;
        }
    }
}

/// Patch present fields only; the data blob is merged, not replaced.
fn apply_update(p: &mut Product, u: &ProductUpdate, now: DateTime<Utc>) {
    if let Some(v) = &u.name {
        p.name = v.clone();
    }
    if let Some(v) = &u.description {
        p.description = v.clone();
    }
    if let Some(v) = u.quality_rating {
        p.quality_rating = v;
    }
    if let Some(v) = u.innovation_rating {
        p.innovation_rating = v;
    }
    if let Some(v) = u.sustainability_rating {
        p.sustainability_rating = v;
    }
    if let Some(v) = u.production_cost {
        p.production_cost = v;
    }
    if let Some(v) = u.production_capacity {
        p.production_capacity = v;
    }
    if let Some(v) = &u.features {
        p.data.features = v.clone();
    }
    if let Some(v) = &u.target_audience {
        p.data.target_audience = v.clone();
    }
    p.updated_at = now;
}

fn pricing(
    state: &mut SimulationState,
    ci: usize,
    d: &PricingDecision,
    now: DateTime<Utc>,
    out: &mut DecisionOutcome,
) {
    let changes = match d {
        PricingDecision::Single(c) => std::slice::from_ref(c),
        PricingDecision::Batch { products } => products.as_slice(),
    };
    for c in changes {
        match owned_product(state, ci, &c.product_id) {
            Some(pi) => {
                let p = &mut state.products[pi];
                p.selling_price = c.price;
                p.updated_at = now;
            }
            None => out.miss(MissingRef::Product(c.product_id.clone())),
        }
    }
}

/// Produce up to capacity; returns the cost of what was produced.
fn produce(
    state: &mut SimulationState,
    ci: usize,
    product_id: &ProductId,
    requested: u64,
    now: DateTime<Utc>,
    out: &mut DecisionOutcome,
) -> Option<Decimal> {
    let Some(pi) = owned_product(state, ci, product_id) else {
        out.miss(MissingRef::Product(product_id.clone()));
        return None;
    };
    let p = &mut state.products[pi];
    let volume = requested.min(p.production_capacity);
    if volume < requested {
        debug!(product = %p.id, requested, volume, "production clamped to capacity");
    }
    p.inventory_level = p.inventory_level.saturating_add(volume);
    p.updated_at = now;
    Some(Decimal::from(volume).saturating_mul(p.production_cost))
}

fn production(
    state: &mut SimulationState,
    ci: usize,
    d: &ProductionDecision,
    now: DateTime<Utc>,
    out: &mut DecisionOutcome,
) {
    let expansion = match d {
        ProductionDecision::Single {
            product_id,
            production_volume,
            capacity_expansion,
        } => {
            match produce(state, ci, product_id, *production_volume, now, out) {
                Some(cost) => charge(&mut state.companies[ci], cost),
                // A missing product ends the decision before any expansion.
                None => return,
            }
            capacity_expansion.as_ref()
        }
        ProductionDecision::Batch {
            products,
            capacity_expansion,
        } => {
            let mut total = Decimal::ZERO;
            for order in products {
                if let Some(cost) =
                    produce(state, ci, &order.product_id, order.production_volume, now, out)
                {
                    total = total.saturating_add(cost);
                }
            }
            charge(&mut state.companies[ci], total);
            capacity_expansion.as_ref()
        }
        ProductionDecision::ExpansionOnly { capacity_expansion } => Some(capacity_expansion),
    };
    if let Some(x) = expansion {
        expand_capacity(state, ci, x, now, out);
    }
}

fn expand_capacity(
    state: &mut SimulationState,
    ci: usize,
    x: &CapacityExpansion,
    now: DateTime<Utc>,
    out: &mut DecisionOutcome,
) {
    let Some(pi) = owned_product(state, ci, &x.product_id) else {
        return out.miss(MissingRef::Product(x.product_id.clone()));
    };
    let p = &mut state.products[pi];
    p.production_capacity = p.production_capacity.saturating_add(x.capacity_increase);
    p.updated_at = now;
    charge(&mut state.companies[ci], x.investment_amount);
}

fn marketing(
    state: &mut SimulationState,
    ci: usize,
    d: &MarketingDecision,
    now: DateTime<Utc>,
    out: &mut DecisionOutcome,
) {
    let budgets = match d {
        MarketingDecision::Product(b) => std::slice::from_ref(b),
        MarketingDecision::Batch { products } => products.as_slice(),
        MarketingDecision::Campaign(c) => return campaign(state, ci, c),
    };
    let mut total = Decimal::ZERO;
    for b in budgets {
        match owned_product(state, ci, &b.product_id) {
            Some(pi) => {
                let p = &mut state.products[pi];
                p.marketing_budget = b.budget;
                p.updated_at = now;
                total = total.saturating_add(b.budget);
            }
            None => out.miss(MissingRef::Product(b.product_id.clone())),
        }
    }
    charge(&mut state.companies[ci], total);
}

fn campaign(state: &mut SimulationState, ci: usize, c: &CompanyCampaign) {
    let id = state.next_id("campaign");
    let period = state.current_period();
    let company = &mut state.companies[ci];
    charge(company, c.budget);
    company.data.marketing_campaigns.push(Campaign {
        id,
        company_id: company.id.clone(),
        name: c.name.clone(),
        budget: c.budget,
        start_period: period,
        duration: c.duration.unwrap_or(1),
        target_segment: c.target_segment.unwrap_or(CampaignTarget::All),
        channel_allocation: c.channel_allocation.clone(),
        message: c.message.clone(),
    });
}

fn research(state: &mut SimulationState, ci: usize, d: &ResearchDecision) {
    let id = state.next_id("research");
    let period = state.current_period();
    let company = &mut state.companies[ci];
    charge(company, d.budget);
    company.data.research_projects.push(ResearchProject {
        id,
        company_id: company.id.clone(),
        name: d.name.clone(),
        description: d.description.clone(),
        kind: d.kind.clone(),
        budget: d.budget,
        start_period: period,
        duration: d.duration.unwrap_or(1),
        progress: 0.0,
        status: ResearchStatus::Active,
    });
}

fn human_resources(state: &mut SimulationState, ci: usize, d: &HumanResourcesDecision) {
    let company = &mut state.companies[ci];
    let mut spend = Decimal::ZERO;
    let hr = company.data.human_resources_mut();
    if let Some(h) = &d.hiring {
        hr.total_employees = hr.total_employees.saturating_add(h.new_employees);
        let per_hire = hr.average_salary.saturating_mul(HIRING_COST_RATIO);
        spend = spend.saturating_add(Decimal::from(h.new_employees).saturating_mul(per_hire));
    }
    if let Some(s) = &d.salary {
        let old = hr.average_salary;
        hr.average_salary = s.new_average_salary;
        // Negative when salaries drop.
        let delta = hr.average_salary.saturating_sub(old);
        spend = spend.saturating_add(delta.saturating_mul(Decimal::from(hr.total_employees)));
    }
    if let Some(t) = &d.training {
        hr.training_budget = t.budget;
        spend = spend.saturating_add(t.budget);
    }
    charge(company, spend);
}

fn finance(state: &mut SimulationState, ci: usize, d: &FinanceDecision, out: &mut DecisionOutcome) {
    match d {
        FinanceDecision::Loan(req) => {
            let id = LoanId(state.next_id("loan"));
            let period = state.current_period();
            let company = &mut state.companies[ci];
            company.cash_balance = company.cash_balance.saturating_add(req.amount);
            company.total_liabilities = company.total_liabilities.saturating_add(req.amount);
            company.data.loans.push(Loan {
                id,
                amount: req.amount,
                interest_rate: req.interest_rate,
                term: req.term,
                start_period: period,
                remaining_amount: req.amount,
            });
        }
        FinanceDecision::RepayLoan(r) => {
            let company = &mut state.companies[ci];
            let Some(loan) = company.data.loan_mut(&r.loan_id) else {
                return out.miss(MissingRef::Loan(r.loan_id.clone()));
            };
            let paid = r.amount.min(loan.remaining_amount);
            loan.remaining_amount -= paid;
            charge(company, paid);
            company.total_liabilities = company.total_liabilities.saturating_sub(paid);
        }
        FinanceDecision::Dividend(div) => {
            let period = state.current_period();
            let company = &mut state.companies[ci];
            charge(company, div.amount);
            company.data.dividends.push(Dividend {
                period,
                amount: div.amount,
            });
        }
    }
}
