//! Attractiveness-weighted market share model and period performance.
//!
//! Every active product scores an attractiveness from quality, price,
//! innovation, sustainability and marketing spend, weighted by its segment's
//! consumer preferences. Its share of the segment is its attractiveness over
//! the segment total; a product alone in its segment gets [`BASE_SEGMENT_SHARE`].
//! Demand follows from the share and is capped by stock on hand.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sim_core::{
    clamp_brand_value, AttractivenessFactors, CompanyId, MarketConditions, PerformanceResults,
    Preference, PreferenceWeights, Product, ProductBreakdown, ProductId, ProductPerformance,
    SimulationState,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Segment share of a product with no active competitor in its segment.
pub const BASE_SEGMENT_SHARE: f64 = 0.1;
/// Fixed cost charged to a company with no active product.
pub const IDLE_FIXED_COST: i64 = 50_000;
/// Brand value lost by a company with no active product.
pub const IDLE_BRAND_PENALTY: f64 = 5.0;
/// Price step that costs one point of price score.
const PRICE_POINT: f64 = 50.0;
/// Marketing spend unit for the square-root effectiveness curve.
const MARKETING_UNIT: f64 = 10_000.0;
/// Upper bound of customer satisfaction.
pub const SATISFACTION_CAP: f64 = 10.0;

/// Score a product against its segment's preferences.
pub fn attractiveness(product: &Product, prefs: &PreferenceWeights) -> AttractivenessFactors {
    let price = product.selling_price.to_f64().unwrap_or(0.0);
    let quality_score = product.quality_rating * prefs.weight(Preference::QualitySensitivity);
    let price_score = (10.0 - price / PRICE_POINT) * prefs.weight(Preference::PriceSensitivity);
    let innovation_score =
        product.innovation_rating * prefs.weight(Preference::InnovationPreference);
    let sustainability_score =
        product.sustainability_rating * prefs.weight(Preference::SustainabilityPreference);
    let budget = product.marketing_budget.to_f64().unwrap_or(0.0).max(0.0);
    let marketing_effectiveness = (budget / MARKETING_UNIT).sqrt() * 0.5;
    AttractivenessFactors {
        quality_score,
        price_score,
        innovation_score,
        sustainability_score,
        marketing_effectiveness,
        total_attractiveness: quality_score
            + price_score
            + innovation_score
            + sustainability_score
            + marketing_effectiveness,
    }
}

/// Share of the segment captured by a product with attractiveness `own`,
/// given the sum over the whole segment (itself included).
pub fn segment_market_share(own: f64, segment_total: f64, competitors: usize) -> f64 {
    if competitors == 0 {
        return BASE_SEGMENT_SHARE;
    }
    let share = own / segment_total;
    if share.is_finite() {
        share
    } else {
        0.0
    }
}

/// Period outcome of one product. Does not touch the product.
pub fn evaluate_product(
    product: &Product,
    factors: AttractivenessFactors,
    segment_share_of_product: f64,
    market: &MarketConditions,
    now: DateTime<Utc>,
) -> ProductPerformance {
    let segment_size = market.segment_size(product.category);
    let overall_share = segment_share_of_product * market.segment_share(product.category);
    let price = product.selling_price.to_f64().unwrap_or(0.0);

    let potential_sales = if price > 0.0 {
        let units = (segment_size * segment_share_of_product / price).round();
        if units.is_finite() && units > 0.0 {
            units as u64
        } else {
            0
        }
    } else {
        0
    };
    let sales_volume = potential_sales.min(product.inventory_level);

    let revenue = Decimal::from(sales_volume).saturating_mul(product.selling_price);
    let production_costs = Decimal::from(sales_volume).saturating_mul(product.production_cost);
    let marketing_costs = product.marketing_budget;
    let costs = production_costs.saturating_add(marketing_costs);

    let fulfilment = if potential_sales > 0 {
        sales_volume as f64 / potential_sales as f64
    } else {
        1.0
    };
    let value_for_money = if price > 0.0 {
        product.quality_rating / (price / PRICE_POINT)
    } else {
        SATISFACTION_CAP
    };
    let satisfaction =
        factors.quality_score * 0.4 + value_for_money * 0.4 + fulfilment * 0.2;

    ProductPerformance {
        id: format!("prod_perf_{}_{}", product.id, market.period),
        product_id: product.id.clone(),
        period: market.period,
        sales_volume,
        potential_sales,
        revenue,
        production_costs,
        marketing_costs,
        costs,
        profit: revenue.saturating_sub(costs),
        segment_market_share: segment_share_of_product,
        market_share: overall_share,
        customer_satisfaction: satisfaction.min(SATISFACTION_CAP),
        attractiveness: factors,
        created_at: now,
    }
}

/// One scored product of a company, kept until the company totals are booked.
struct Outcome {
    name: String,
    innovation: f64,
    sustainability: f64,
    perf: ProductPerformance,
}

/// Companies touched by one performance pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PerformanceRun {
    /// Companies scored on their active products.
    pub evaluated: Vec<CompanyId>,
    /// Companies charged the idle fixed cost.
    pub idle: Vec<CompanyId>,
}

/// Compute and record performance for the state's current period.
///
/// Appends one [`ProductPerformance`] per active product and one
/// [`PerformanceResults`] per company, depletes inventory by realized sales,
/// books profit into cash, recomputes total assets and moves brand value.
/// Returns `None` when the current period has no market snapshot.
pub fn calculate_performance(
    state: &mut SimulationState,
    now: DateTime<Utc>,
) -> Option<PerformanceRun> {
    let period = state.current_period();
    let Some(market) = state.market_conditions_for(period).cloned() else {
        warn!(period, "no market conditions for period; skipping performance");
        return None;
    };

    // Score every active product once; competition spans all companies.
    let mut scores: HashMap<ProductId, AttractivenessFactors> = HashMap::new();
    let mut segment_totals: HashMap<sim_core::Segment, (f64, usize)> = HashMap::new();
    for p in state.products.iter().filter(|p| p.is_active()) {
        let f = attractiveness(p, &market.preferences(p.category));
        let entry = segment_totals.entry(p.category).or_insert((0.0, 0));
        entry.0 += f.total_attractiveness;
        entry.1 += 1;
        scores.insert(p.id.clone(), f);
    }

    let mut run = PerformanceRun::default();
    for ci in 0..state.companies.len() {
        let company_id = state.companies[ci].id.clone();
        let owned: Vec<usize> = state
            .products
            .iter()
            .enumerate()
            .filter(|(_, p)| p.company_id == company_id && p.is_active())
            .map(|(i, _)| i)
            .collect();

        if owned.is_empty() {
            record_idle_company(state, ci, period, now);
            run.idle.push(company_id);
            continue;
        }

        let mut outcomes = Vec::with_capacity(owned.len());
        for &pi in &owned {
            let product = &state.products[pi];
            let factors = scores.get(&product.id).copied().unwrap_or_default();
            let (total, count) = segment_totals
                .get(&product.category)
                .copied()
                .unwrap_or((factors.total_attractiveness, 1));
            let share =
                segment_market_share(factors.total_attractiveness, total, count.saturating_sub(1));
            let perf = evaluate_product(product, factors, share, &market, now);
            debug!(
                product = %product.id,
                sales = perf.sales_volume,
                potential = perf.potential_sales,
                share = perf.market_share,
                "product evaluated"
            );
            let product = &mut state.products[pi];
            product.inventory_level = product.inventory_level.saturating_sub(perf.sales_volume);
            outcomes.push(Outcome {
                name: product.name.clone(),
                innovation: product.innovation_rating,
                sustainability: product.sustainability_rating,
                perf,
            });
        }

        let n = outcomes.len() as f64;
        let revenue = outcomes
            .iter()
            .fold(Decimal::ZERO, |acc, o| acc.saturating_add(o.perf.revenue));
        let costs = outcomes
            .iter()
            .fold(Decimal::ZERO, |acc, o| acc.saturating_add(o.perf.costs));
        let market_share: f64 = outcomes.iter().map(|o| o.perf.market_share).sum();
        let customer_satisfaction =
            outcomes.iter().map(|o| o.perf.customer_satisfaction).sum::<f64>() / n;
        let innovation_score = outcomes.iter().map(|o| o.innovation).sum::<f64>() / n;
        let sustainability_score = outcomes.iter().map(|o| o.sustainability).sum::<f64>() / n;
        let profit = revenue.saturating_sub(costs);
        let roi = if costs > Decimal::ZERO {
            profit
                .checked_div(costs)
                .and_then(|r| r.to_f64())
                .unwrap_or(0.0)
        } else {
            0.0
        };
        let brand_value_change = market_share * 0.3
            + customer_satisfaction * 0.3
            + innovation_score * 0.2
            + sustainability_score * 0.2
            - 5.0;

        let company = &mut state.companies[ci];
        company.cash_balance = company.cash_balance.saturating_add(profit);
        company.total_assets = company
            .cash_balance
            .saturating_add(revenue.saturating_mul(Decimal::new(5, 1)));
        company.brand_value = clamp_brand_value(company.brand_value + brand_value_change);
        company.updated_at = now;
        let employee_satisfaction = company.data.employee_satisfaction();

        info!(
            company = %company_id,
            period,
            %revenue,
            %profit,
            market_share,
            brand = company.brand_value,
            "company performance"
        );

        let product_breakdown = outcomes
            .iter()
            .map(|o| ProductBreakdown {
                product_id: o.perf.product_id.clone(),
                name: o.name.clone(),
                revenue: o.perf.revenue,
                market_share: o.perf.market_share,
            })
            .collect();
        state.performance_results.push(PerformanceResults {
            id: format!("perf_{}_{}", company_id, period),
            company_id: company_id.clone(),
            period,
            revenue,
            costs,
            profit,
            market_share,
            cash_flow: profit,
            roi,
            customer_satisfaction,
            employee_satisfaction,
            sustainability_score,
            innovation_score,
            brand_value_change,
            product_breakdown,
            created_at: now,
        });
        state
            .product_performance
            .extend(outcomes.into_iter().map(|o| o.perf));
        run.evaluated.push(company_id);
    }
    Some(run)
}

/// Charge the fixed cost and brand penalty of a company with nothing on sale.
fn record_idle_company(
    state: &mut SimulationState,
    ci: usize,
    period: sim_core::Period,
    now: DateTime<Utc>,
) {
    let fixed = Decimal::from(IDLE_FIXED_COST);
    let company = &mut state.companies[ci];
    company.cash_balance = company.cash_balance.saturating_sub(fixed);
    company.brand_value = clamp_brand_value(company.brand_value - IDLE_BRAND_PENALTY);
    company.updated_at = now;
    debug!(company = %company.id, period, "no active products; fixed cost charged");
    let results = PerformanceResults {
        id: format!("perf_{}_{}", company.id, period),
        company_id: company.id.clone(),
        period,
        revenue: Decimal::ZERO,
        costs: fixed,
        profit: -fixed,
        market_share: 0.0,
        cash_flow: -fixed,
        roi: 0.0,
        customer_satisfaction: 0.0,
        employee_satisfaction: company.data.employee_satisfaction(),
        sustainability_score: 0.0,
        innovation_score: 0.0,
        brand_value_change: -IDLE_BRAND_PENALTY,
        product_breakdown: Vec::new(),
        created_at: now,
    };
    state.performance_results.push(results);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sim_core::{
        Company, CompanyData, EconomicIndicators, MarketConditionsId, ProductData, ProductStatus,
        Segment, SimConfig, Simulation, SimulationId, SimulationStatus, UserId,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn market(prefs: PreferenceWeights) -> MarketConditions {
        MarketConditions {
            id: MarketConditionsId::from("market_sim_0"),
            simulation_id: SimulationId::from("sim"),
            period: 0,
            total_market_size: 50_000_000.0,
            segment_distribution: [
                (Segment::Premium, 0.3),
                (Segment::MidRange, 0.5),
                (Segment::Budget, 0.2),
            ]
            .into_iter()
            .collect(),
            economic_indicators: EconomicIndicators::default(),
            consumer_preferences: [(Segment::MidRange, prefs)].into_iter().collect(),
            technology_trends: vec![],
            sustainability_importance: 0.3,
            created_at: now(),
        }
    }

    fn company(id: &str) -> Company {
        Company {
            id: CompanyId::from(id),
            simulation_id: SimulationId::from("sim"),
            user_id: UserId::from("u1"),
            name: id.to_string(),
            description: String::new(),
            logo_url: None,
            cash_balance: Decimal::new(1_000_000, 0),
            total_assets: Decimal::new(1_000_000, 0),
            total_liabilities: Decimal::ZERO,
            credit_rating: "A".into(),
            brand_value: 50.0,
            data: CompanyData::default(),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn product(id: &str, company: &str, price: i64, inventory: u64) -> Product {
        Product {
            id: ProductId::from(id),
            company_id: CompanyId::from(company),
            name: id.to_string(),
            description: String::new(),
            category: Segment::MidRange,
            quality_rating: 6.0,
            innovation_rating: 5.0,
            sustainability_rating: 5.0,
            production_cost: Decimal::new(100, 0),
            selling_price: Decimal::new(price, 0),
            inventory_level: inventory,
            production_capacity: 1000,
            development_cost: Decimal::ZERO,
            marketing_budget: Decimal::ZERO,
            status: ProductStatus::Active,
            launch_period: Some(0),
            discontinue_period: None,
            data: ProductData::default(),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn state(prefs: PreferenceWeights) -> SimulationState {
        let mut s = SimulationState::new(Simulation {
            id: SimulationId::from("sim"),
            name: "t".into(),
            description: String::new(),
            config: SimConfig::default(),
            current_period: 0,
            status: SimulationStatus::Active,
            created_by: UserId::from("u1"),
            created_at: now(),
            updated_at: now(),
        });
        s.market_conditions.push(market(prefs));
        s
    }

    #[test]
    fn missing_weights_default_to_half() {
        let p = product("p1", "c1", 200, 1000);
        let f = attractiveness(&p, &PreferenceWeights::default());
        assert_eq!(f.quality_score, 3.0);
        assert_eq!(f.price_score, 3.0);
        assert_eq!(f.innovation_score, 2.5);
        assert_eq!(f.sustainability_score, 2.5);
        assert_eq!(f.marketing_effectiveness, 0.0);
        assert_eq!(f.total_attractiveness, 11.0);
    }

    #[test]
    fn marketing_has_diminishing_returns() {
        let mut p = product("p1", "c1", 200, 0);
        p.marketing_budget = Decimal::new(10_000, 0);
        let one = attractiveness(&p, &PreferenceWeights::default()).marketing_effectiveness;
        p.marketing_budget = Decimal::new(40_000, 0);
        let four = attractiveness(&p, &PreferenceWeights::default()).marketing_effectiveness;
        assert_eq!(one, 0.5);
        assert_eq!(four, 1.0);
    }

    #[test]
    fn lone_product_gets_base_share_and_sells_out() {
        let mut s = state(PreferenceWeights::default());
        s.companies.push(company("c1"));
        s.products.push(product("p1", "c1", 200, 1000));
        let run = calculate_performance(&mut s, now()).unwrap();
        assert_eq!(run.evaluated, vec![CompanyId::from("c1")]);

        let pp = &s.product_performance[0];
        assert_eq!(pp.segment_market_share, BASE_SEGMENT_SHARE);
        // 25M segment * 0.1 / 200 = 12,500 potential units, capped by 1,000 in stock.
        assert_eq!(pp.potential_sales, 12_500);
        assert_eq!(pp.sales_volume, 1_000);
        assert_eq!(pp.revenue, Decimal::new(200_000, 0));
        assert_eq!(pp.costs, Decimal::new(100_000, 0));
        assert_eq!(s.products[0].inventory_level, 0);

        let c = &s.companies[0];
        assert_eq!(c.cash_balance, Decimal::new(1_100_000, 0));
        assert_eq!(c.total_assets, Decimal::new(1_200_000, 0));
        let pr = &s.performance_results[0];
        assert_eq!(pr.profit, Decimal::new(100_000, 0));
        assert_eq!(pr.roi, 1.0);
        assert_eq!(pr.employee_satisfaction, 50.0);
        assert_eq!(pr.product_breakdown.len(), 1);
        assert!((1.0..=100.0).contains(&c.brand_value));
    }

    #[test]
    fn extreme_unit_cost_saturates_instead_of_overflowing() {
        let mut s = state(PreferenceWeights::default());
        s.companies.push(company("c1"));
        let mut p = product("p1", "c1", 200, u64::MAX);
        p.production_cost = Decimal::MAX;
        s.products.push(p);
        calculate_performance(&mut s, now()).unwrap();

        let pp = &s.product_performance[0];
        assert_eq!(pp.sales_volume, 12_500);
        assert_eq!(pp.production_costs, Decimal::MAX);
        assert_eq!(pp.costs, Decimal::MAX);
        assert_eq!(pp.profit, Decimal::new(2_500_000, 0) - Decimal::MAX);
        assert_eq!(s.products[0].inventory_level, u64::MAX - 12_500);
        let c = &s.companies[0];
        assert_eq!(c.cash_balance, Decimal::new(3_500_000, 0) - Decimal::MAX);
        assert!(s.performance_results[0].roi < 0.0);
    }

    #[test]
    fn rivals_split_segment_by_attractiveness() {
        let mut s = state(PreferenceWeights::default());
        s.companies.push(company("c1"));
        s.companies.push(company("c2"));
        s.products.push(product("cheap", "c1", 100, 1_000_000));
        s.products.push(product("dear", "c2", 300, 1_000_000));
        calculate_performance(&mut s, now()).unwrap();
        let share = |id: &str| {
            s.product_performance
                .iter()
                .find(|pp| pp.product_id.as_str() == id)
                .unwrap()
                .segment_market_share
        };
        // cheap: 3 + 4 + 2.5 + 2.5 = 12, dear: 3 + 2 + 2.5 + 2.5 = 10
        assert!((share("cheap") - 12.0 / 22.0).abs() < 1e-12);
        assert!((share("dear") - 10.0 / 22.0).abs() < 1e-12);
    }

    #[test]
    fn idle_company_pays_fixed_cost() {
        let mut s = state(PreferenceWeights::default());
        let mut c = company("c1");
        c.brand_value = 3.0;
        s.companies.push(c);
        let mut dev = product("p1", "c1", 200, 10);
        dev.status = ProductStatus::Development;
        s.products.push(dev);
        let run = calculate_performance(&mut s, now()).unwrap();
        assert_eq!(run.idle, vec![CompanyId::from("c1")]);
        let c = &s.companies[0];
        assert_eq!(c.cash_balance, Decimal::new(950_000, 0));
        assert_eq!(c.total_assets, Decimal::new(1_000_000, 0));
        assert_eq!(c.brand_value, 1.0);
        let pr = &s.performance_results[0];
        assert_eq!(pr.revenue, Decimal::ZERO);
        assert_eq!(pr.profit, Decimal::new(-50_000, 0));
        assert_eq!(pr.brand_value_change, -5.0);
        assert!(s.product_performance.is_empty());
        assert_eq!(s.products[0].inventory_level, 10);
    }

    #[test]
    fn satisfaction_is_capped_and_handles_zero_demand() {
        let mut p = product("p1", "c1", 0, 10);
        p.quality_rating = 10.0;
        let f = attractiveness(&p, &PreferenceWeights::default());
        let perf = evaluate_product(&p, f, 0.1, &market(PreferenceWeights::default()), now());
        assert_eq!(perf.potential_sales, 0);
        assert_eq!(perf.sales_volume, 0);
        assert!(perf.customer_satisfaction <= SATISFACTION_CAP);
    }

    #[test]
    fn overpriced_product_never_gains_stock() {
        let prefs = PreferenceWeights::default().with(Preference::PriceSensitivity, 1.0);
        let mut s = state(prefs);
        s.companies.push(company("c1"));
        s.companies.push(company("c2"));
        s.products.push(product("gold", "c1", 5_000, 100));
        s.products.push(product("tin", "c2", 50, 100));
        calculate_performance(&mut s, now()).unwrap();
        for p in &s.products {
            assert!(p.inventory_level <= 100);
        }
    }

    #[test]
    fn no_snapshot_means_no_results() {
        let mut s = state(PreferenceWeights::default());
        s.market_conditions.clear();
        s.companies.push(company("c1"));
        assert!(calculate_performance(&mut s, now()).is_none());
        assert!(s.performance_results.is_empty());
    }
}
