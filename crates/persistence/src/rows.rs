//! Table rows and their conversion to domain records.

use crate::{StoreError, User};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sim_core::{
    Company, Decision, DecisionKind, Event, MarketConditions, PerformanceResults, Period, Product,
    ProductPerformance, Simulation,
};
use std::str::FromStr;

pub(crate) fn parse_time(column: &'static str, s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::invalid(column, s))
}

pub(crate) fn parse_money(column: &'static str, s: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(s).map_err(|_| StoreError::invalid(column, s))
}

/// Parse a string column through the enum's serde name.
pub(crate) fn parse_enum<T: DeserializeOwned>(column: &'static str, s: &str) -> Result<T, StoreError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| StoreError::invalid(column, s))
}

pub(crate) fn period(column: &'static str, v: i64) -> Result<Period, StoreError> {
    Period::try_from(v).map_err(|_| StoreError::invalid(column, v))
}

pub(crate) fn count(column: &'static str, v: i64) -> Result<u64, StoreError> {
    u64::try_from(v).map_err(|_| StoreError::invalid(column, v))
}

pub(crate) fn to_i64(column: &'static str, v: u64) -> Result<i64, StoreError> {
    i64::try_from(v).map_err(|_| StoreError::invalid(column, v))
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SimulationRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub config: String,
    pub current_period: i64,
    pub status: String,
    pub created_by: String,
    pub id_seq: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl SimulationRow {
    pub fn into_simulation(self) -> Result<(Simulation, u64), StoreError> {
        let sim = Simulation {
            id: self.id.into(),
            name: self.name,
            description: self.description,
            config: serde_json::from_str(&self.config)?,
            current_period: period("current_period", self.current_period)?,
            status: parse_enum("status", &self.status)?,
            created_by: self.created_by.into(),
            created_at: parse_time("created_at", &self.created_at)?,
            updated_at: parse_time("updated_at", &self.updated_at)?,
        };
        Ok((sim, count("id_seq", self.id_seq)?))
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CompanyRow {
    pub id: String,
    pub simulation_id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub logo_url: Option<String>,
    pub cash_balance: String,
    pub total_assets: String,
    pub total_liabilities: String,
    pub credit_rating: String,
    pub brand_value: f64,
    pub data: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<CompanyRow> for Company {
    type Error = StoreError;

    fn try_from(r: CompanyRow) -> Result<Self, StoreError> {
        Ok(Company {
            id: r.id.into(),
            simulation_id: r.simulation_id.into(),
            user_id: r.user_id.into(),
            name: r.name,
            description: r.description,
            logo_url: r.logo_url,
            cash_balance: parse_money("cash_balance", &r.cash_balance)?,
            total_assets: parse_money("total_assets", &r.total_assets)?,
            total_liabilities: parse_money("total_liabilities", &r.total_liabilities)?,
            credit_rating: r.credit_rating,
            brand_value: r.brand_value,
            data: serde_json::from_str(&r.data)?,
            created_at: parse_time("created_at", &r.created_at)?,
            updated_at: parse_time("updated_at", &r.updated_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub quality_rating: f64,
    pub innovation_rating: f64,
    pub sustainability_rating: f64,
    pub production_cost: String,
    pub selling_price: String,
    pub inventory_level: i64,
    pub production_capacity: i64,
    pub development_cost: String,
    pub marketing_budget: String,
    pub status: String,
    pub launch_period: Option<i64>,
    pub discontinue_period: Option<i64>,
    pub data: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(r: ProductRow) -> Result<Self, StoreError> {
        Ok(Product {
            id: r.id.into(),
            company_id: r.company_id.into(),
            name: r.name,
            description: r.description,
            category: parse_enum("category", &r.category)?,
            quality_rating: r.quality_rating,
            innovation_rating: r.innovation_rating,
            sustainability_rating: r.sustainability_rating,
            production_cost: parse_money("production_cost", &r.production_cost)?,
            selling_price: parse_money("selling_price", &r.selling_price)?,
            inventory_level: count("inventory_level", r.inventory_level)?,
            production_capacity: count("production_capacity", r.production_capacity)?,
            development_cost: parse_money("development_cost", &r.development_cost)?,
            marketing_budget: parse_money("marketing_budget", &r.marketing_budget)?,
            status: parse_enum("status", &r.status)?,
            launch_period: r
                .launch_period
                .map(|v| period("launch_period", v))
                .transpose()?,
            discontinue_period: r
                .discontinue_period
                .map(|v| period("discontinue_period", v))
                .transpose()?,
            data: serde_json::from_str(&r.data)?,
            created_at: parse_time("created_at", &r.created_at)?,
            updated_at: parse_time("updated_at", &r.updated_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DecisionRow {
    pub id: String,
    pub company_id: String,
    pub period: i64,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub data: String,
    pub submitted_at: String,
    pub processed: bool,
    pub processed_at: Option<String>,
}

impl TryFrom<DecisionRow> for Decision {
    type Error = StoreError;

    fn try_from(r: DecisionRow) -> Result<Self, StoreError> {
        let data = serde_json::from_str(&r.data)?;
        Ok(Decision {
            id: r.id.into(),
            company_id: r.company_id.into(),
            period: period("period", r.period)?,
            kind: DecisionKind::from_parts(&r.kind, data)?,
            submitted_at: parse_time("submitted_at", &r.submitted_at)?,
            processed: r.processed,
            processed_at: r
                .processed_at
                .as_deref()
                .map(|s| parse_time("processed_at", s))
                .transpose()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MarketConditionsRow {
    pub id: String,
    pub simulation_id: String,
    pub period: i64,
    pub total_market_size: f64,
    pub segment_distribution: String,
    pub economic_indicators: String,
    pub consumer_preferences: String,
    pub technology_trends: String,
    pub sustainability_importance: f64,
    pub created_at: String,
}

impl TryFrom<MarketConditionsRow> for MarketConditions {
    type Error = StoreError;

    fn try_from(r: MarketConditionsRow) -> Result<Self, StoreError> {
        Ok(MarketConditions {
            id: r.id.into(),
            simulation_id: r.simulation_id.into(),
            period: period("period", r.period)?,
            total_market_size: r.total_market_size,
            segment_distribution: serde_json::from_str(&r.segment_distribution)?,
            economic_indicators: serde_json::from_str(&r.economic_indicators)?,
            consumer_preferences: serde_json::from_str(&r.consumer_preferences)?,
            technology_trends: serde_json::from_str(&r.technology_trends)?,
            sustainability_importance: r.sustainability_importance,
            created_at: parse_time("created_at", &r.created_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PerformanceRow {
    pub id: String,
    pub company_id: String,
    pub period: i64,
    pub revenue: String,
    pub costs: String,
    pub profit: String,
    pub market_share: f64,
    pub cash_flow: String,
    pub roi: f64,
    pub customer_satisfaction: f64,
    pub employee_satisfaction: f64,
    pub sustainability_score: f64,
    pub innovation_score: f64,
    pub brand_value_change: f64,
    pub data: String,
    pub created_at: String,
}

impl TryFrom<PerformanceRow> for PerformanceResults {
    type Error = StoreError;

    fn try_from(r: PerformanceRow) -> Result<Self, StoreError> {
        Ok(PerformanceResults {
            id: r.id,
            company_id: r.company_id.into(),
            period: period("period", r.period)?,
            revenue: parse_money("revenue", &r.revenue)?,
            costs: parse_money("costs", &r.costs)?,
            profit: parse_money("profit", &r.profit)?,
            market_share: r.market_share,
            cash_flow: parse_money("cash_flow", &r.cash_flow)?,
            roi: r.roi,
            customer_satisfaction: r.customer_satisfaction,
            employee_satisfaction: r.employee_satisfaction,
            sustainability_score: r.sustainability_score,
            innovation_score: r.innovation_score,
            brand_value_change: r.brand_value_change,
            product_breakdown: serde_json::from_str(&r.data)?,
            created_at: parse_time("created_at", &r.created_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductPerformanceRow {
    pub id: String,
    pub product_id: String,
    pub period: i64,
    pub sales_volume: i64,
    pub potential_sales: i64,
    pub revenue: String,
    pub production_costs: String,
    pub marketing_costs: String,
    pub costs: String,
    pub profit: String,
    pub segment_market_share: f64,
    pub market_share: f64,
    pub customer_satisfaction: f64,
    pub data: String,
    pub created_at: String,
}

impl TryFrom<ProductPerformanceRow> for ProductPerformance {
    type Error = StoreError;

    fn try_from(r: ProductPerformanceRow) -> Result<Self, StoreError> {
        Ok(ProductPerformance {
            id: r.id,
            product_id: r.product_id.into(),
            period: period("period", r.period)?,
            sales_volume: count("sales_volume", r.sales_volume)?,
            potential_sales: count("potential_sales", r.potential_sales)?,
            revenue: parse_money("revenue", &r.revenue)?,
            production_costs: parse_money("production_costs", &r.production_costs)?,
            marketing_costs: parse_money("marketing_costs", &r.marketing_costs)?,
            costs: parse_money("costs", &r.costs)?,
            profit: parse_money("profit", &r.profit)?,
            segment_market_share: r.segment_market_share,
            market_share: r.market_share,
            customer_satisfaction: r.customer_satisfaction,
            attractiveness: serde_json::from_str(&r.data)?,
            created_at: parse_time("created_at", &r.created_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EventRow {
    pub id: String,
    pub simulation_id: String,
    pub period: i64,
    #[sqlx(rename = "type")]
    pub category: String,
    pub name: String,
    pub description: String,
    pub impact_area: String,
    pub impact_strength: f64,
    pub affected_companies: Option<String>,
    pub created_at: String,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(r: EventRow) -> Result<Self, StoreError> {
        Ok(Event {
            id: r.id.into(),
            simulation_id: r.simulation_id.into(),
            period: period("period", r.period)?,
            category: parse_enum("type", &r.category)?,
            name: r.name,
            description: r.description,
            impact_area: r.impact_area,
            impact_strength: r.impact_strength,
            affected_companies: r
                .affected_companies
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            created_at: parse_time("created_at", &r.created_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, StoreError> {
        Ok(User {
            id: r.id.into(),
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            role: r.role,
            created_at: parse_time("created_at", &r.created_at)?,
            updated_at: parse_time("updated_at", &r.updated_at)?,
        })
    }
}

/// Convert a batch of rows, failing on the first bad one.
pub(crate) fn convert<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}
