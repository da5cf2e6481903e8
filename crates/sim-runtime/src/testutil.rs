//! Fixtures shared by the runtime tests.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sim_core::{
    Company, CompanyData, CompanyId, Product, ProductData, ProductId, ProductStatus, Segment,
    SimConfig, SimulationState, UserId,
};

use crate::factory::SimulationFactory;

pub fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Fresh simulation "sim" owned by "u1", moved to `period`.
pub fn state_at(period: u32) -> SimulationState {
    let mut s = SimulationFactory::create_with_id(
        "sim".into(),
        "Test",
        "",
        UserId::from("u1"),
        SimConfig::default(),
        ts(),
    );
    s.simulation.current_period = period;
    for mc in &mut s.market_conditions {
        mc.period = period;
    }
    s
}

pub fn company(id: &str) -> Company {
    Company {
        id: CompanyId::from(id),
        simulation_id: "sim".into(),
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
        created_at: ts(),
        updated_at: ts(),
    }
}

/// Active product priced 200 at cost 100, 1000 in stock, capacity 1000.
pub fn product(id: &str, company: &str, category: Segment) -> Product {
    Product {
        id: ProductId::from(id),
        company_id: CompanyId::from(company),
        name: id.to_string(),
        description: String::new(),
        category,
        quality_rating: 6.0,
        innovation_rating: 5.0,
        sustainability_rating: 5.0,
        production_cost: Decimal::new(100, 0),
        selling_price: Decimal::new(200, 0),
        inventory_level: 1000,
        production_capacity: 1000,
        development_cost: Decimal::ZERO,
        marketing_budget: Decimal::ZERO,
        status: ProductStatus::Active,
        launch_period: Some(0),
        discontinue_period: None,
        data: ProductData::default(),
        created_at: ts(),
        updated_at: ts(),
    }
}
