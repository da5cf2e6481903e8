//! Construction of new simulations and of the built-in demo.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use sim_core::{
    Company, CompanyData, CompanyId, EconomicIndicators, HumanResources, MarketConditions,
    Preference, PreferenceWeights, Product, ProductData, ProductId, ProductStatus, Segment,
    SimConfig, Simulation, SimulationId, SimulationState, SimulationStatus, TechnologyTrend,
    UserId,
};
use std::collections::BTreeMap;
use tracing::info;

/// Total market size of a freshly created simulation.
pub const INITIAL_MARKET_SIZE: f64 = 50_000_000.0;
/// Sustainability importance of a freshly created simulation.
pub const INITIAL_SUSTAINABILITY: f64 = 0.3;

pub struct SimulationFactory;

impl SimulationFactory {
    /// New simulation at period 0 with an id derived from `now`.
    pub fn create(
        name: &str,
        description: &str,
        created_by: UserId,
        config: SimConfig,
        now: DateTime<Utc>,
    ) -> SimulationState {
        let id = SimulationId(format!("sim_{}", now.timestamp_millis()));
        Self::create_with_id(id, name, description, created_by, config, now)
    }

    /// New simulation with a caller-chosen id and the standard period-0 market.
    pub fn create_with_id(
        id: SimulationId,
        name: &str,
        description: &str,
        created_by: UserId,
        config: SimConfig,
        now: DateTime<Utc>,
    ) -> SimulationState {
        let pref = |quality: f64, price: f64| {
            PreferenceWeights::default()
                .with(Preference::QualitySensitivity, quality)
                .with(Preference::PriceSensitivity, price)
        };
        let market = MarketConditions {
            id: sim_econ::market_conditions_id(&id, 0),
            simulation_id: id.clone(),
            period: 0,
            total_market_size: INITIAL_MARKET_SIZE,
            segment_distribution: [
                (Segment::Premium, 0.3),
                (Segment::MidRange, 0.5),
                (Segment::Budget, 0.2),
            ]
            .into_iter()
            .collect(),
            economic_indicators: EconomicIndicators::default(),
            consumer_preferences: [
                (Segment::Premium, pref(0.8, 0.3)),
                (Segment::MidRange, pref(0.5, 0.5)),
                (Segment::Budget, pref(0.2, 0.8)),
            ]
            .into_iter()
            .collect(),
            technology_trends: Vec::new(),
            sustainability_importance: INITIAL_SUSTAINABILITY,
            created_at: now,
        };
        info!(simulation = %id, name, "simulation created");
        let mut state = SimulationState::new(Simulation {
            id,
            name: name.to_string(),
            description: description.to_string(),
            config,
            current_period: 0,
            status: SimulationStatus::Active,
            created_by,
            created_at: now,
            updated_at: now,
        });
        state.market_conditions.push(market);
        state
    }

    /// One company with three widgets in a small market; the budget widget is
    /// still in development.
    pub fn demo(now: DateTime<Utc>) -> SimulationState {
        let sim_id = SimulationId::from("sim_demo");
        let company_id = CompanyId::from("company_demo");
        let user = UserId::from("user_demo");
        let config = SimConfig {
            periods: Some(12),
            ..SimConfig::default()
        };
        let mut state = SimulationState::new(Simulation {
            id: sim_id.clone(),
            name: "Business Strategy Simulation".into(),
            description: "A simulation focused on strategic decision-making".into(),
            config,
            current_period: 0,
            status: SimulationStatus::Active,
            created_by: user.clone(),
            created_at: now,
            updated_at: now,
        });

        let mut extra = Map::new();
        extra.insert(
            "missionStatement".into(),
            Value::from("To innovate and transform technology"),
        );
        extra.insert("competitiveStrategy".into(), Value::from("differentiator"));
        state.companies.push(Company {
            id: company_id.clone(),
            simulation_id: sim_id.clone(),
            user_id: user,
            name: "TechInnovate Inc.".into(),
            description: "A technology innovation company".into(),
            logo_url: None,
            cash_balance: Decimal::new(1_000_000, 0),
            total_assets: Decimal::new(1_000_000, 0),
            total_liabilities: Decimal::ZERO,
            credit_rating: "B".into(),
            brand_value: 50.0,
            data: CompanyData {
                human_resources: Some(HumanResources::default()),
                extra,
                ..CompanyData::default()
            },
            created_at: now,
            updated_at: now,
        });

        let widget = |n: u32, name: &str, segment: Segment, ratings: (f64, f64, f64)| Product {
            id: ProductId(format!("product_demo_{n}")),
            company_id: company_id.clone(),
            name: name.to_string(),
            description: String::new(),
            category: segment,
            quality_rating: ratings.0,
            innovation_rating: ratings.1,
            sustainability_rating: ratings.2,
            production_cost: Decimal::ZERO,
            selling_price: Decimal::ZERO,
            inventory_level: 0,
            production_capacity: 0,
            development_cost: Decimal::ZERO,
            marketing_budget: Decimal::ZERO,
            status: ProductStatus::Active,
            launch_period: Some(0),
            discontinue_period: None,
            data: ProductData::default(),
            created_at: now,
            updated_at: now,
        };
        let features = |list: &[&str], audience: &str| ProductData {
            features: list.iter().map(|s| s.to_string()).collect(),
            target_audience: audience.to_string(),
            extra: Map::new(),
        };
        state.products.push(Product {
            description: "Our flagship premium widget".into(),
            production_cost: Decimal::new(150, 0),
            selling_price: Decimal::new(300, 0),
            inventory_level: 1000,
            production_capacity: 2000,
            development_cost: Decimal::new(200_000, 0),
            marketing_budget: Decimal::new(50_000, 0),
            data: features(
                &["Advanced AI", "Premium Materials", "Extended Warranty"],
                "High-income professionals",
            ),
            ..widget(1, "Premium Widget", Segment::Premium, (8.5, 7.2, 6.8))
        });
        state.products.push(Product {
            description: "Our mid-range widget offering".into(),
            production_cost: Decimal::new(75, 0),
            selling_price: Decimal::new(150, 0),
            inventory_level: 1500,
            production_capacity: 3000,
            development_cost: Decimal::new(100_000, 0),
            marketing_budget: Decimal::new(30_000, 0),
            data: features(
                &["Reliable Performance", "Good Value"],
                "Middle-income consumers",
            ),
            ..widget(2, "Standard Widget", Segment::MidRange, (6.5, 5.8, 6.0))
        });
        state.products.push(Product {
            description: "Our entry-level widget".into(),
            production_cost: Decimal::new(40, 0),
            selling_price: Decimal::new(80, 0),
            production_capacity: 4000,
            development_cost: Decimal::new(50_000, 0),
            status: ProductStatus::Development,
            launch_period: Some(1),
            data: features(
                &["Essential Functionality", "Affordable"],
                "Budget-conscious consumers",
            ),
            ..widget(3, "Basic Widget", Segment::Budget, (4.5, 3.2, 5.0))
        });

        let full = |price: f64, quality: f64, loyalty: f64, innovation: f64, sustainability: f64| {
            let w: BTreeMap<Preference, f64> = [
                (Preference::PriceSensitivity, price),
                (Preference::QualitySensitivity, quality),
                (Preference::BrandLoyalty, loyalty),
                (Preference::InnovationPreference, innovation),
                (Preference::SustainabilityPreference, sustainability),
            ]
            .into_iter()
            .collect();
            PreferenceWeights(w)
        };
        let trends: Vec<TechnologyTrend> = serde_json::from_value(json!([
            {"name": "AI and Machine Learning", "impact_area": "product_development",
             "impact_strength": 0.25, "adoption_rate": 0.4},
            {"name": "Internet of Things", "impact_area": "customer_experience",
             "impact_strength": 0.2, "adoption_rate": 0.35}
        ]))
        .unwrap_or_default();
        state.market_conditions.push(MarketConditions {
            id: "market_demo_0".into(),
            simulation_id: sim_id,
            period: 0,
            total_market_size: 5_000_000.0,
            segment_distribution: [
                (Segment::Budget, 0.3),
                (Segment::MidRange, 0.4),
                (Segment::Premium, 0.3),
            ]
            .into_iter()
            .collect(),
            economic_indicators: EconomicIndicators {
                gdp_growth: 0.028,
                inflation_rate: 0.021,
                interest_rate: 0.035,
                unemployment_rate: 0.042,
                consumer_confidence: 102.8,
                business_sentiment: 56.4,
            },
            consumer_preferences: [
                (Segment::Budget, full(0.8, 0.3, 0.2, 0.2, 0.2)),
                (Segment::MidRange, full(0.5, 0.5, 0.4, 0.4, 0.4)),
                (Segment::Premium, full(0.3, 0.8, 0.7, 0.6, 0.6)),
            ]
            .into_iter()
            .collect(),
            technology_trends: trends,
            sustainability_importance: 0.67,
            created_at: now,
        });
        state
    }
}
