//! Entity store over a SQLite pool.

use crate::rows::{
    convert, to_i64, CompanyRow, DecisionRow, EventRow, MarketConditionsRow, PerformanceRow,
    ProductPerformanceRow, ProductRow, SimulationRow, UserRow,
};
use crate::patch::{CompanyPatch, DecisionPatch, ProductPatch, SimulationPatch, UserPatch};
use crate::{init_db, StoreError, User};
use rust_decimal::Decimal;
use sim_core::{
    Company, CompanyId, Decision, DecisionId, Event, EventId, MarketConditions,
    MarketConditionsId, PerformanceResults, Period, Product, ProductId, ProductPerformance,
    Simulation, SimulationId, SimulationState, UserId,
};
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool};
use sqlx::Executor;
use tracing::{debug, info};

/// How a record is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Write {
    /// Plain insert; fails on an existing id.
    Insert,
    /// Insert or overwrite every column of an existing row.
    Upsert,
    /// Insert unless the row (or a unique key) already exists.
    Keep,
    /// Overwrite the columns bound to a non-null value; affects nothing when absent.
    Update,
}

/// Build the statement for `table`; the first column is always `id`.
fn statement(table: &str, columns: &[&str], mode: Write) -> String {
    let placeholders = vec!["?"; columns.len()].join(", ");
    let insert = format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        columns.join(", ")
    );
    match mode {
        Write::Insert => insert,
        Write::Keep => format!("{insert} ON CONFLICT DO NOTHING"),
        Write::Upsert => {
            let set: Vec<String> = columns[1..]
                .iter()
                .map(|c| format!("{c} = excluded.{c}"))
                .collect();
            format!("{insert} ON CONFLICT(id) DO UPDATE SET {}", set.join(", "))
        }
        Write::Update => {
            // Numbered parameters keep the insert binding order.
            let set: Vec<String> = columns[1..]
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{c} = COALESCE(?{}, {c})", i + 2))
                .collect();
            format!("UPDATE {table} SET {} WHERE id = ?1", set.join(", "))
        }
    }
}

const SIMULATION_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "config",
    "current_period",
    "status",
    "created_by",
    "created_at",
    "updated_at",
];

const COMPANY_COLUMNS: &[&str] = &[
    "id",
    "simulation_id",
    "user_id",
    "name",
    "description",
    "logo_url",
    "cash_balance",
    "total_assets",
    "total_liabilities",
    "credit_rating",
    "brand_value",
    "data",
    "created_at",
    "updated_at",
];

const PRODUCT_COLUMNS: &[&str] = &[
    "id",
    "company_id",
    "name",
    "description",
    "category",
    "quality_rating",
    "innovation_rating",
    "sustainability_rating",
    "production_cost",
    "selling_price",
    "inventory_level",
    "production_capacity",
    "development_cost",
    "marketing_budget",
    "status",
    "launch_period",
    "discontinue_period",
    "data",
    "created_at",
    "updated_at",
];

const DECISION_COLUMNS: &[&str] = &[
    "id",
    "simulation_id",
    "company_id",
    "period",
    "type",
    "data",
    "submitted_at",
    "processed",
    "processed_at",
];

const MARKET_COLUMNS: &[&str] = &[
    "id",
    "simulation_id",
    "period",
    "total_market_size",
    "segment_distribution",
    "economic_indicators",
    "consumer_preferences",
    "technology_trends",
    "sustainability_importance",
    "created_at",
];

const PERFORMANCE_COLUMNS: &[&str] = &[
    "id",
    "company_id",
    "period",
    "revenue",
    "costs",
    "profit",
    "market_share",
    "cash_flow",
    "roi",
    "customer_satisfaction",
    "employee_satisfaction",
    "sustainability_score",
    "innovation_score",
    "brand_value_change",
    "data",
    "created_at",
];

const PRODUCT_PERFORMANCE_COLUMNS: &[&str] = &[
    "id",
    "product_id",
    "period",
    "sales_volume",
    "potential_sales",
    "revenue",
    "production_costs",
    "marketing_costs",
    "costs",
    "profit",
    "segment_market_share",
    "market_share",
    "customer_satisfaction",
    "data",
    "created_at",
];

const EVENT_COLUMNS: &[&str] = &[
    "id",
    "simulation_id",
    "period",
    "type",
    "name",
    "description",
    "impact_area",
    "impact_strength",
    "affected_companies",
    "created_at",
];

const SIMULATION_PATCH_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "config",
    "current_period",
    "status",
    "updated_at",
];

const COMPANY_PATCH_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "logo_url",
    "cash_balance",
    "total_assets",
    "total_liabilities",
    "credit_rating",
    "brand_value",
    "data",
    "updated_at",
];

const PRODUCT_PATCH_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "quality_rating",
    "innovation_rating",
    "sustainability_rating",
    "production_cost",
    "selling_price",
    "inventory_level",
    "production_capacity",
    "development_cost",
    "marketing_budget",
    "status",
    "launch_period",
    "discontinue_period",
    "data",
    "updated_at",
];

const DECISION_PATCH_COLUMNS: &[&str] = &["id", "type", "data", "processed", "processed_at"];

const USER_PATCH_COLUMNS: &[&str] = &["id", "name", "email", "password_hash", "role", "updated_at"];

const USER_COLUMNS: &[&str] = &[
    "id",
    "name",
    "email",
    "password_hash",
    "role",
    "created_at",
    "updated_at",
];

async fn write_simulation<'e, E>(exec: E, s: &Simulation, mode: Write) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = statement("simulations", SIMULATION_COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(s.id.as_str())
        .bind(&s.name)
        .bind(&s.description)
        .bind(serde_json::to_string(&s.config)?)
        .bind(i64::from(s.current_period))
        .bind(s.status.as_str())
        .bind(s.created_by.as_str())
        .bind(s.created_at.to_rfc3339())
        .bind(s.updated_at.to_rfc3339())
        .execute(exec)
        .await?;
    Ok(done.rows_affected())
}

async fn write_company<'e, E>(exec: E, c: &Company, mode: Write) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = statement("companies", COMPANY_COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(c.id.as_str())
        .bind(c.simulation_id.as_str())
        .bind(c.user_id.as_str())
        .bind(&c.name)
        .bind(&c.description)
        .bind(c.logo_url.as_deref())
        .bind(c.cash_balance.to_string())
        .bind(c.total_assets.to_string())
        .bind(c.total_liabilities.to_string())
        .bind(&c.credit_rating)
        .bind(c.brand_value)
        .bind(serde_json::to_string(&c.data)?)
        .bind(c.created_at.to_rfc3339())
        .bind(c.updated_at.to_rfc3339())
        .execute(exec)
        .await?;
    Ok(done.rows_affected())
}

async fn write_product<'e, E>(exec: E, p: &Product, mode: Write) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = statement("products", PRODUCT_COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(p.id.as_str())
        .bind(p.company_id.as_str())
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.category.as_str())
        .bind(p.quality_rating)
        .bind(p.innovation_rating)
        .bind(p.sustainability_rating)
        .bind(p.production_cost.to_string())
        .bind(p.selling_price.to_string())
        .bind(to_i64("inventory_level", p.inventory_level)?)
        .bind(to_i64("production_capacity", p.production_capacity)?)
        .bind(p.development_cost.to_string())
        .bind(p.marketing_budget.to_string())
        .bind(p.status.as_str())
        .bind(p.launch_period.map(i64::from))
        .bind(p.discontinue_period.map(i64::from))
        .bind(serde_json::to_string(&p.data)?)
        .bind(p.created_at.to_rfc3339())
        .bind(p.updated_at.to_rfc3339())
        .execute(exec)
        .await?;
    Ok(done.rows_affected())
}

async fn write_decision<'e, E>(
    exec: E,
    simulation: &SimulationId,
    d: &Decision,
    mode: Write,
) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = statement("decisions", DECISION_COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(d.id.as_str())
        .bind(simulation.as_str())
        .bind(d.company_id.as_str())
        .bind(i64::from(d.period))
        .bind(d.kind.type_name())
        .bind(d.kind.data_json()?.to_string())
        .bind(d.submitted_at.to_rfc3339())
        .bind(d.processed)
        .bind(d.processed_at.map(|t| t.to_rfc3339()))
        .execute(exec)
        .await?;
    Ok(done.rows_affected())
}

async fn write_market<'e, E>(exec: E, mc: &MarketConditions, mode: Write) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = statement("market_conditions", MARKET_COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(mc.id.as_str())
        .bind(mc.simulation_id.as_str())
        .bind(i64::from(mc.period))
        .bind(mc.total_market_size)
        .bind(serde_json::to_string(&mc.segment_distribution)?)
        .bind(serde_json::to_string(&mc.economic_indicators)?)
        .bind(serde_json::to_string(&mc.consumer_preferences)?)
        .bind(serde_json::to_string(&mc.technology_trends)?)
        .bind(mc.sustainability_importance)
        .bind(mc.created_at.to_rfc3339())
        .execute(exec)
        .await?;
    Ok(done.rows_affected())
}

async fn write_performance<'e, E>(
    exec: E,
    r: &PerformanceResults,
    mode: Write,
) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = statement("performance_results", PERFORMANCE_COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(&r.id)
        .bind(r.company_id.as_str())
        .bind(i64::from(r.period))
        .bind(r.revenue.to_string())
        .bind(r.costs.to_string())
        .bind(r.profit.to_string())
        .bind(r.market_share)
        .bind(r.cash_flow.to_string())
        .bind(r.roi)
        .bind(r.customer_satisfaction)
        .bind(r.employee_satisfaction)
        .bind(r.sustainability_score)
        .bind(r.innovation_score)
        .bind(r.brand_value_change)
        .bind(serde_json::to_string(&r.product_breakdown)?)
        .bind(r.created_at.to_rfc3339())
        .execute(exec)
        .await?;
    Ok(done.rows_affected())
}

async fn write_product_performance<'e, E>(
    exec: E,
    pp: &ProductPerformance,
    mode: Write,
) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = statement("product_performance", PRODUCT_PERFORMANCE_COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(&pp.id)
        .bind(pp.product_id.as_str())
        .bind(i64::from(pp.period))
        .bind(to_i64("sales_volume", pp.sales_volume)?)
        .bind(to_i64("potential_sales", pp.potential_sales)?)
        .bind(pp.revenue.to_string())
        .bind(pp.production_costs.to_string())
        .bind(pp.marketing_costs.to_string())
        .bind(pp.costs.to_string())
        .bind(pp.profit.to_string())
        .bind(pp.segment_market_share)
        .bind(pp.market_share)
        .bind(pp.customer_satisfaction)
        .bind(serde_json::to_string(&pp.attractiveness)?)
        .bind(pp.created_at.to_rfc3339())
        .execute(exec)
        .await?;
    Ok(done.rows_affected())
}

async fn write_event<'e, E>(exec: E, ev: &Event, mode: Write) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let affected = ev
        .affected_companies
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let sql = statement("events", EVENT_COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(ev.id.as_str())
        .bind(ev.simulation_id.as_str())
        .bind(i64::from(ev.period))
        .bind(ev.category.as_str())
        .bind(&ev.name)
        .bind(&ev.description)
        .bind(&ev.impact_area)
        .bind(ev.impact_strength)
        .bind(affected)
        .bind(ev.created_at.to_rfc3339())
        .execute(exec)
        .await?;
    Ok(done.rows_affected())
}

async fn write_user<'e, E>(exec: E, u: &User, mode: Write) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = statement("users", USER_COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(u.id.as_str())
        .bind(&u.name)
        .bind(&u.email)
        .bind(&u.password_hash)
        .bind(&u.role)
        .bind(u.created_at.to_rfc3339())
        .bind(u.updated_at.to_rfc3339())
        .execute(exec)
        .await?;
    Ok(done.rows_affected())
}

/// Advance the simulation's stored id sequence and mint `<prefix>_<sim>_<seq>`.
async fn next_seq_id(
    conn: &mut SqliteConnection,
    prefix: &str,
    simulation: &str,
) -> Result<String, StoreError> {
    let row: Option<(i64,)> =
        sqlx::query_as("UPDATE simulations SET id_seq = id_seq + 1 WHERE id = ? RETURNING id_seq")
            .bind(simulation)
            .fetch_optional(&mut *conn)
            .await?;
    let (seq,) = row.ok_or_else(|| StoreError::not_found("simulation", simulation))?;
    Ok(format!("{prefix}_{simulation}_{seq}"))
}

fn found(kind: &'static str, id: &str, affected: u64) -> Result<(), StoreError> {
    if affected == 0 {
        Err(StoreError::not_found(kind, id))
    } else {
        Ok(())
    }
}

/// Store for every simulation entity, backed by one SQLite pool.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database at `url`, applying migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Ok(Self::new(init_db(url).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ---------- simulations ----------

    pub async fn get_simulation(&self, id: &SimulationId) -> Result<Option<Simulation>, StoreError> {
        let row: Option<SimulationRow> = sqlx::query_as("SELECT * FROM simulations WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.into_simulation().map(|(s, _)| s)).transpose()
    }

    /// Insert a simulation. An empty id becomes `sim_<creation millis>`.
    pub async fn create_simulation(&self, s: &Simulation) -> Result<SimulationId, StoreError> {
        let mut s = s.clone();
        if s.id.as_str().is_empty() {
            s.id = SimulationId(format!("sim_{}", s.created_at.timestamp_millis()));
        }
        write_simulation(&self.pool, &s, Write::Insert).await?;
        Ok(s.id)
    }

    pub async fn update_simulation(
        &self,
        id: &SimulationId,
        patch: &SimulationPatch,
    ) -> Result<(), StoreError> {
        let sql = statement("simulations", SIMULATION_PATCH_COLUMNS, Write::Update);
        let done = sqlx::query(&sql)
            .bind(id.as_str())
            .bind(patch.name.as_deref())
            .bind(patch.description.as_deref())
            .bind(patch.config.as_ref().map(serde_json::to_string).transpose()?)
            .bind(patch.current_period.map(i64::from))
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.updated_at.map(|t| t.to_rfc3339()))
            .execute(&self.pool)
            .await?;
        found("simulation", id.as_str(), done.rows_affected())
    }

    pub async fn simulations_by_user(&self, user: &UserId) -> Result<Vec<Simulation>, StoreError> {
        let rows: Vec<SimulationRow> =
            sqlx::query_as("SELECT * FROM simulations WHERE created_by = ? ORDER BY rowid")
                .bind(user.as_str())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|r| r.into_simulation().map(|(s, _)| s))
            .collect()
    }

    // ---------- companies ----------

    pub async fn get_company(&self, id: &CompanyId) -> Result<Option<Company>, StoreError> {
        let row: Option<CompanyRow> = sqlx::query_as("SELECT * FROM companies WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Company::try_from).transpose()
    }

    /// Insert a company. An empty id is minted from its simulation's sequence.
    pub async fn create_company(&self, c: &Company) -> Result<CompanyId, StoreError> {
        let mut c = c.clone();
        let mut tx = self.pool.begin().await?;
        if c.id.as_str().is_empty() {
            let id = next_seq_id(&mut *tx, "company", c.simulation_id.as_str()).await?;
            c.id = CompanyId(id);
        }
        write_company(&mut *tx, &c, Write::Insert).await?;
        tx.commit().await?;
        Ok(c.id)
    }

    pub async fn update_company(
        &self,
        id: &CompanyId,
        patch: &CompanyPatch,
    ) -> Result<(), StoreError> {
        let money = |v: Option<Decimal>| v.map(|d| d.to_string());
        let sql = statement("companies", COMPANY_PATCH_COLUMNS, Write::Update);
        let done = sqlx::query(&sql)
            .bind(id.as_str())
            .bind(patch.name.as_deref())
            .bind(patch.description.as_deref())
            .bind(patch.logo_url.as_deref())
            .bind(money(patch.cash_balance))
            .bind(money(patch.total_assets))
            .bind(money(patch.total_liabilities))
            .bind(patch.credit_rating.as_deref())
            .bind(patch.brand_value)
            .bind(patch.data.as_ref().map(serde_json::to_string).transpose()?)
            .bind(patch.updated_at.map(|t| t.to_rfc3339()))
            .execute(&self.pool)
            .await?;
        found("company", id.as_str(), done.rows_affected())
    }

    pub async fn companies_by_simulation(
        &self,
        simulation: &SimulationId,
    ) -> Result<Vec<Company>, StoreError> {
        let rows: Vec<CompanyRow> =
            sqlx::query_as("SELECT * FROM companies WHERE simulation_id = ? ORDER BY rowid")
                .bind(simulation.as_str())
                .fetch_all(&self.pool)
                .await?;
        convert(rows)
    }

    // ---------- products ----------

    pub async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> = sqlx::query_as("SELECT * FROM products WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Product::try_from).transpose()
    }

    /// Insert a product. An empty id is minted from the sequence of the
    /// owning company's simulation.
    pub async fn create_product(&self, p: &Product) -> Result<ProductId, StoreError> {
        let mut p = p.clone();
        let mut tx = self.pool.begin().await?;
        if p.id.as_str().is_empty() {
            let owner: Option<(String,)> =
                sqlx::query_as("SELECT simulation_id FROM companies WHERE id = ?")
                    .bind(p.company_id.as_str())
                    .fetch_optional(&mut *tx)
                    .await?;
            let (simulation,) =
                owner.ok_or_else(|| StoreError::not_found("company", &p.company_id))?;
            p.id = ProductId(next_seq_id(&mut *tx, "product", &simulation).await?);
        }
        write_product(&mut *tx, &p, Write::Insert).await?;
        tx.commit().await?;
        Ok(p.id)
    }

    pub async fn update_product(
        &self,
        id: &ProductId,
        patch: &ProductPatch,
    ) -> Result<(), StoreError> {
        let money = |v: Option<Decimal>| v.map(|d| d.to_string());
        let sql = statement("products", PRODUCT_PATCH_COLUMNS, Write::Update);
        let done = sqlx::query(&sql)
            .bind(id.as_str())
            .bind(patch.name.as_deref())
            .bind(patch.description.as_deref())
            .bind(patch.quality_rating)
            .bind(patch.innovation_rating)
            .bind(patch.sustainability_rating)
            .bind(money(patch.production_cost))
            .bind(money(patch.selling_price))
            .bind(patch.inventory_level.map(|v| to_i64("inventory_level", v)).transpose()?)
            .bind(
                patch
                    .production_capacity
                    .map(|v| to_i64("production_capacity", v))
                    .transpose()?,
            )
            .bind(money(patch.development_cost))
            .bind(money(patch.marketing_budget))
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.launch_period.map(i64::from))
            .bind(patch.discontinue_period.map(i64::from))
            .bind(patch.data.as_ref().map(serde_json::to_string).transpose()?)
            .bind(patch.updated_at.map(|t| t.to_rfc3339()))
            .execute(&self.pool)
            .await?;
        found("product", id.as_str(), done.rows_affected())
    }

    pub async fn products_by_company(&self, company: &CompanyId) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<ProductRow> =
            sqlx::query_as("SELECT * FROM products WHERE company_id = ? ORDER BY rowid")
                .bind(company.as_str())
                .fetch_all(&self.pool)
                .await?;
        convert(rows)
    }

    // ---------- decisions ----------

    pub async fn get_decision(&self, id: &DecisionId) -> Result<Option<Decision>, StoreError> {
        let row: Option<DecisionRow> = sqlx::query_as("SELECT * FROM decisions WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Decision::try_from).transpose()
    }

    /// Insert a decision. An empty id is minted from the simulation's sequence.
    pub async fn create_decision(
        &self,
        simulation: &SimulationId,
        d: &Decision,
    ) -> Result<DecisionId, StoreError> {
        let mut d = d.clone();
        let mut tx = self.pool.begin().await?;
        if d.id.as_str().is_empty() {
            d.id = DecisionId(next_seq_id(&mut *tx, "decision", simulation.as_str()).await?);
        }
        write_decision(&mut *tx, simulation, &d, Write::Insert).await?;
        tx.commit().await?;
        Ok(d.id)
    }

    pub async fn update_decision(
        &self,
        id: &DecisionId,
        patch: &DecisionPatch,
    ) -> Result<(), StoreError> {
        let data = patch
            .kind
            .as_ref()
            .map(|k| k.data_json().map(|v| v.to_string()))
            .transpose()?;
        let sql = statement("decisions", DECISION_PATCH_COLUMNS, Write::Update);
        let done = sqlx::query(&sql)
            .bind(id.as_str())
            .bind(patch.kind.as_ref().map(|k| k.type_name()))
            .bind(data)
            .bind(patch.processed)
            .bind(patch.processed_at.map(|t| t.to_rfc3339()))
            .execute(&self.pool)
            .await?;
        found("decision", id.as_str(), done.rows_affected())
    }

    /// Decisions of a company in submission order, optionally for one period.
    pub async fn decisions_by_company(
        &self,
        company: &CompanyId,
        period: Option<Period>,
    ) -> Result<Vec<Decision>, StoreError> {
        let rows: Vec<DecisionRow> = match period {
            Some(p) => {
                sqlx::query_as(
                    "SELECT * FROM decisions WHERE company_id = ? AND period = ? ORDER BY rowid",
                )
                .bind(company.as_str())
                .bind(i64::from(p))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM decisions WHERE company_id = ? ORDER BY rowid")
                    .bind(company.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        convert(rows)
    }

    // ---------- market conditions ----------

    pub async fn market_conditions(
        &self,
        simulation: &SimulationId,
        period: Period,
    ) -> Result<Option<MarketConditions>, StoreError> {
        let row: Option<MarketConditionsRow> = sqlx::query_as(
            "SELECT * FROM market_conditions WHERE simulation_id = ? AND period = ?",
        )
        .bind(simulation.as_str())
        .bind(i64::from(period))
        .fetch_optional(&self.pool)
        .await?;
        row.map(MarketConditions::try_from).transpose()
    }

    /// Insert a market snapshot. An empty id becomes `market_<sim>_<period>`.
    pub async fn create_market_conditions(
        &self,
        mc: &MarketConditions,
    ) -> Result<MarketConditionsId, StoreError> {
        let mut mc = mc.clone();
        if mc.id.as_str().is_empty() {
            mc.id = MarketConditionsId(format!("market_{}_{}", mc.simulation_id, mc.period));
        }
        write_market(&self.pool, &mc, Write::Insert).await?;
        Ok(mc.id)
    }

    // ---------- performance ----------

    pub async fn performance_result(
        &self,
        company: &CompanyId,
        period: Period,
    ) -> Result<Option<PerformanceResults>, StoreError> {
        let row: Option<PerformanceRow> = sqlx::query_as(
            "SELECT * FROM performance_results WHERE company_id = ? AND period = ? \
             ORDER BY rowid LIMIT 1",
        )
        .bind(company.as_str())
        .bind(i64::from(period))
        .fetch_optional(&self.pool)
        .await?;
        row.map(PerformanceResults::try_from).transpose()
    }

    /// All results of a company, oldest period first.
    pub async fn performance_history(
        &self,
        company: &CompanyId,
    ) -> Result<Vec<PerformanceResults>, StoreError> {
        let rows: Vec<PerformanceRow> = sqlx::query_as(
            "SELECT * FROM performance_results WHERE company_id = ? ORDER BY period, rowid",
        )
        .bind(company.as_str())
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    /// Insert a company result. An empty id becomes `perf_<company>_<period>`.
    pub async fn create_performance_result(
        &self,
        r: &PerformanceResults,
    ) -> Result<String, StoreError> {
        let mut r = r.clone();
        if r.id.is_empty() {
            r.id = format!("perf_{}_{}", r.company_id, r.period);
        }
        write_performance(&self.pool, &r, Write::Insert).await?;
        Ok(r.id)
    }

    pub async fn product_performance(
        &self,
        product: &ProductId,
        period: Period,
    ) -> Result<Option<ProductPerformance>, StoreError> {
        let row: Option<ProductPerformanceRow> = sqlx::query_as(
            "SELECT * FROM product_performance WHERE product_id = ? AND period = ? \
             ORDER BY rowid LIMIT 1",
        )
        .bind(product.as_str())
        .bind(i64::from(period))
        .fetch_optional(&self.pool)
        .await?;
        row.map(ProductPerformance::try_from).transpose()
    }

    pub async fn product_performance_history(
        &self,
        product: &ProductId,
    ) -> Result<Vec<ProductPerformance>, StoreError> {
        let rows: Vec<ProductPerformanceRow> = sqlx::query_as(
            "SELECT * FROM product_performance WHERE product_id = ? ORDER BY period, rowid",
        )
        .bind(product.as_str())
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    pub async fn create_product_performance(
        &self,
        pp: &ProductPerformance,
    ) -> Result<String, StoreError> {
        let mut pp = pp.clone();
        if pp.id.is_empty() {
            pp.id = format!("prod_perf_{}_{}", pp.product_id, pp.period);
        }
        write_product_performance(&self.pool, &pp, Write::Insert).await?;
        Ok(pp.id)
    }

    // ---------- events ----------

    pub async fn events(
        &self,
        simulation: &SimulationId,
        period: Option<Period>,
    ) -> Result<Vec<Event>, StoreError> {
        let rows: Vec<EventRow> = match period {
            Some(p) => {
                sqlx::query_as(
                    "SELECT * FROM events WHERE simulation_id = ? AND period = ? ORDER BY rowid",
                )
                .bind(simulation.as_str())
                .bind(i64::from(p))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT * FROM events WHERE simulation_id = ? ORDER BY period, rowid",
                )
                .bind(simulation.as_str())
                .fetch_all(&self.pool)
                .await?
            }
        };
        convert(rows)
    }

    /// Insert an event. An empty id becomes `event_<sim>_<period>`.
    pub async fn create_event(&self, ev: &Event) -> Result<EventId, StoreError> {
        let mut ev = ev.clone();
        if ev.id.as_str().is_empty() {
            ev.id = EventId(format!("event_{}_{}", ev.simulation_id, ev.period));
        }
        write_event(&self.pool, &ev, Write::Insert).await?;
        Ok(ev.id)
    }

    // ---------- users ----------

    pub async fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    /// Insert a user. An empty id becomes `user_<n>` past the highest row.
    pub async fn create_user(&self, u: &User) -> Result<UserId, StoreError> {
        let mut u = u.clone();
        let mut tx = self.pool.begin().await?;
        if u.id.as_str().is_empty() {
            let (n,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(rowid), 0) + 1 FROM users")
                .fetch_one(&mut *tx)
                .await?;
            u.id = UserId(format!("user_{n}"));
        }
        write_user(&mut *tx, &u, Write::Insert).await?;
        tx.commit().await?;
        Ok(u.id)
    }

    pub async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<(), StoreError> {
        let sql = statement("users", USER_PATCH_COLUMNS, Write::Update);
        let done = sqlx::query(&sql)
            .bind(id.as_str())
            .bind(patch.name.as_deref())
            .bind(patch.email.as_deref())
            .bind(patch.password_hash.as_deref())
            .bind(patch.role.as_deref())
            .bind(patch.updated_at.map(|t| t.to_rfc3339()))
            .execute(&self.pool)
            .await?;
        found("user", id.as_str(), done.rows_affected())
    }

    // ---------- whole state ----------

    /// Commit the whole state in one transaction.
    ///
    /// Mutable entities are upserted; snapshots, results and events are
    /// append-only and only inserted when absent. Any failure rolls back.
    pub async fn save_state(&self, state: &SimulationState) -> Result<(), StoreError> {
        let sim = &state.simulation;
        let mut tx = self.pool.begin().await?;

        write_simulation(&mut *tx, sim, Write::Upsert).await?;
        sqlx::query("UPDATE simulations SET id_seq = ? WHERE id = ?")
            .bind(to_i64("id_seq", state.id_seq)?)
            .bind(sim.id.as_str())
            .execute(&mut *tx)
            .await?;
        for c in &state.companies {
            write_company(&mut *tx, c, Write::Upsert).await?;
        }
        for p in &state.products {
            write_product(&mut *tx, p, Write::Upsert).await?;
        }
        for d in &state.decisions {
            write_decision(&mut *tx, &sim.id, d, Write::Upsert).await?;
        }
        for mc in &state.market_conditions {
            write_market(&mut *tx, mc, Write::Keep).await?;
        }
        for r in &state.performance_results {
            write_performance(&mut *tx, r, Write::Keep).await?;
        }
        for pp in &state.product_performance {
            write_product_performance(&mut *tx, pp, Write::Keep).await?;
        }
        for ev in &state.events {
            write_event(&mut *tx, ev, Write::Keep).await?;
        }

        tx.commit().await?;
        info!(
            simulation = %sim.id,
            period = sim.current_period,
            companies = state.companies.len(),
            products = state.products.len(),
            "state committed"
        );
        Ok(())
    }

    /// Reassemble the full state of a stored simulation.
    pub async fn load_state(&self, id: &SimulationId) -> Result<SimulationState, StoreError> {
        let row: Option<SimulationRow> = sqlx::query_as("SELECT * FROM simulations WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        let (simulation, id_seq) = row
            .ok_or_else(|| StoreError::not_found("simulation", id))?
            .into_simulation()?;

        let companies = self.companies_by_simulation(id).await?;
        let products: Vec<ProductRow> = sqlx::query_as(
            "SELECT p.* FROM products p JOIN companies c ON p.company_id = c.id \
             WHERE c.simulation_id = ? ORDER BY p.rowid",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;
        let decisions: Vec<DecisionRow> =
            sqlx::query_as("SELECT * FROM decisions WHERE simulation_id = ? ORDER BY rowid")
                .bind(id.as_str())
                .fetch_all(&self.pool)
                .await?;
        let markets: Vec<MarketConditionsRow> = sqlx::query_as(
            "SELECT * FROM market_conditions WHERE simulation_id = ? ORDER BY period",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;
        let results: Vec<PerformanceRow> = sqlx::query_as(
            "SELECT r.* FROM performance_results r JOIN companies c ON r.company_id = c.id \
             WHERE c.simulation_id = ? ORDER BY r.rowid",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;
        let product_results: Vec<ProductPerformanceRow> = sqlx::query_as(
            "SELECT pp.* FROM product_performance pp \
             JOIN products p ON pp.product_id = p.id \
             JOIN companies c ON p.company_id = c.id \
             WHERE c.simulation_id = ? ORDER BY pp.rowid",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;
        let events = self.events(id, None).await?;

        let state = SimulationState {
            simulation,
            companies,
            products: convert(products)?,
            decisions: convert(decisions)?,
            market_conditions: convert(markets)?,
            performance_results: convert(results)?,
            product_performance: convert(product_results)?,
            events,
            id_seq,
        };
        debug!(simulation = %id, period = state.current_period(), "state loaded");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use sim_core::{DecisionKind, DividendPayment, FinanceDecision};
    use sim_runtime::{SimulationEngine, SimulationFactory};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn dividend(amount: i64) -> DecisionKind {
        DecisionKind::Finance(FinanceDecision::Dividend(DividendPayment {
            amount: Decimal::new(amount, 0),
        }))
    }

    /// Demo simulation after `periods` advances with one dividend per period.
    fn played(periods: u32) -> SimulationState {
        let mut engine = SimulationEngine::new(SimulationFactory::demo(ts()));
        let company = engine.state().companies[0].id.clone();
        for _ in 0..periods {
            engine.submit_decision(company.clone(), dividend(1_000), ts());
            engine.advance_period(ts());
        }
        engine.into_state()
    }

    #[test]
    fn statements_bind_in_column_order() {
        let cols = &["id", "a", "b"];
        assert_eq!(
            statement("t", cols, Write::Insert),
            "INSERT INTO t (id, a, b) VALUES (?, ?, ?)"
        );
        assert_eq!(
            statement("t", cols, Write::Update),
            "UPDATE t SET a = COALESCE(?2, a), b = COALESCE(?3, b) WHERE id = ?1"
        );
        assert!(statement("t", cols, Write::Upsert)
            .ends_with("ON CONFLICT(id) DO UPDATE SET a = excluded.a, b = excluded.b"));
        assert!(statement("t", cols, Write::Keep).ends_with("ON CONFLICT DO NOTHING"));
    }

    #[tokio::test]
    async fn state_survives_a_round_trip() {
        let store = store().await;
        let state = played(3);
        assert!(!state.performance_results.is_empty());
        store.save_state(&state).await.unwrap();
        let loaded = store.load_state(&state.simulation.id).await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn saving_again_updates_without_duplicating_history() {
        let store = store().await;
        let early = played(1);
        store.save_state(&early).await.unwrap();
        let later = played(2);
        store.save_state(&later).await.unwrap();
        // Saving the same state twice must not add history rows.
        store.save_state(&later).await.unwrap();

        let loaded = store.load_state(&later.simulation.id).await.unwrap();
        assert_eq!(loaded, later);
        let company = &later.companies[0].id;
        let history = store.performance_history(company).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].period, 0);
        assert_eq!(history[1].period, 1);
    }

    #[tokio::test]
    async fn failed_save_rolls_back_everything() {
        let store = store().await;
        let before = played(0);
        store.save_state(&before).await.unwrap();

        let after = played(1);
        sqlx::query("DROP TABLE product_performance")
            .execute(store.pool())
            .await
            .unwrap();
        assert!(store.save_state(&after).await.is_err());

        let company = store
            .get_company(&before.companies[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(company.cash_balance, before.companies[0].cash_balance);
        let sim = store
            .get_simulation(&before.simulation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sim.current_period, 0);
        assert!(store
            .market_conditions(&before.simulation.id, 1)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn entity_queries_filter_and_update() {
        let store = store().await;
        let state = played(2);
        store.save_state(&state).await.unwrap();
        let sim = &state.simulation;
        let company = &state.companies[0];

        assert_eq!(
            store.simulations_by_user(&sim.created_by).await.unwrap().len(),
            1
        );
        assert_eq!(store.companies_by_simulation(&sim.id).await.unwrap().len(), 1);
        assert_eq!(store.products_by_company(&company.id).await.unwrap().len(), 3);
        assert_eq!(
            store.decisions_by_company(&company.id, None).await.unwrap().len(),
            2
        );
        let first = store
            .decisions_by_company(&company.id, Some(0))
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert!(first[0].processed);
        assert!(store
            .market_conditions(&sim.id, 2)
            .await
            .unwrap()
            .is_some());
        let product = &state.products[0].id;
        assert_eq!(
            store.product_performance_history(product).await.unwrap().len(),
            2
        );
        assert!(store.product_performance(product, 1).await.unwrap().is_some());
        assert!(store.performance_result(&company.id, 5).await.unwrap().is_none());
        assert_eq!(
            store.events(&sim.id, None).await.unwrap(),
            state.events
        );

        let patch = CompanyPatch {
            name: Some("Renamed".into()),
            cash_balance: Some(Decimal::new(12_345, 2)),
            ..CompanyPatch::default()
        };
        store.update_company(&company.id, &patch).await.unwrap();
        let renamed = store.get_company(&company.id).await.unwrap().unwrap();
        assert_eq!(renamed.name, "Renamed");
        assert_eq!(renamed.cash_balance, Decimal::new(12_345, 2));
        // Columns left out of the patch keep their stored values.
        assert_eq!(renamed.total_assets, company.total_assets);
        assert_eq!(renamed.data, company.data);
        assert_eq!(renamed.updated_at, company.updated_at);

        assert!(matches!(
            store.update_company(&"company_missing".into(), &patch).await,
            Err(StoreError::NotFound { kind: "company", .. })
        ));
    }

    #[tokio::test]
    async fn single_records_can_be_created_directly() {
        let store = store().await;
        let state = played(1);
        store.create_simulation(&state.simulation).await.unwrap();
        store.create_company(&state.companies[0]).await.unwrap();
        for p in &state.products {
            store.create_product(p).await.unwrap();
        }
        store
            .create_decision(&state.simulation.id, &state.decisions[0])
            .await
            .unwrap();
        store
            .create_market_conditions(&state.market_conditions[0])
            .await
            .unwrap();
        store
            .create_performance_result(&state.performance_results[0])
            .await
            .unwrap();
        store
            .create_product_performance(&state.product_performance[0])
            .await
            .unwrap();

        assert!(store.create_company(&state.companies[0]).await.is_err());
        let d = store
            .get_decision(&state.decisions[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(d, state.decisions[0]);

        let reopen = DecisionPatch {
            processed: Some(false),
            ..DecisionPatch::default()
        };
        store.update_decision(&d.id, &reopen).await.unwrap();
        let reopened = store.get_decision(&d.id).await.unwrap().unwrap();
        assert!(!reopened.processed);
        assert_eq!(reopened.kind, d.kind);
        assert_eq!(reopened.processed_at, d.processed_at);

        let patch = SimulationPatch {
            current_period: Some(7),
            ..SimulationPatch::default()
        };
        store
            .update_simulation(&state.simulation.id, &patch)
            .await
            .unwrap();
        let sim = store
            .get_simulation(&state.simulation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sim.current_period, 7);
        assert_eq!(sim.name, state.simulation.name);
        assert_eq!(sim.config, state.simulation.config);
    }

    #[tokio::test]
    async fn users_are_found_by_email() {
        let store = store().await;
        let mut user = User {
            id: "user_1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "hash".into(),
            role: "player".into(),
            created_at: ts(),
            updated_at: ts(),
        };
        store.create_user(&user).await.unwrap();
        assert_eq!(
            store.user_by_email("ada@example.com").await.unwrap(),
            Some(user.clone())
        );
        assert!(store.user_by_email("nobody@example.com").await.unwrap().is_none());

        let promote = UserPatch {
            role: Some("admin".into()),
            ..UserPatch::default()
        };
        store.update_user(&user.id, &promote).await.unwrap();
        user.role = "admin".into();
        assert_eq!(store.get_user(&user.id).await.unwrap(), Some(user.clone()));

        let mut twin = user.clone();
        twin.id = "user_2".into();
        assert!(matches!(
            store.create_user(&twin).await,
            Err(StoreError::Db(_))
        ));
    }

    #[tokio::test]
    async fn product_patch_touches_only_given_columns() {
        let store = store().await;
        let state = played(1);
        store.save_state(&state).await.unwrap();
        let before = &state.products[0];

        let patch = ProductPatch {
            selling_price: Some(Decimal::new(999, 0)),
            inventory_level: Some(42),
            status: Some(sim_core::ProductStatus::Discontinued),
            discontinue_period: Some(1),
            ..ProductPatch::default()
        };
        store.update_product(&before.id, &patch).await.unwrap();
        let after = store.get_product(&before.id).await.unwrap().unwrap();
        assert_eq!(after.selling_price, Decimal::new(999, 0));
        assert_eq!(after.inventory_level, 42);
        assert_eq!(after.status, sim_core::ProductStatus::Discontinued);
        assert_eq!(after.discontinue_period, Some(1));
        assert_eq!(after.name, before.name);
        assert_eq!(after.production_cost, before.production_cost);
        assert_eq!(after.launch_period, before.launch_period);
        assert_eq!(after.data, before.data);

        // An empty patch still finds the row and changes nothing.
        store
            .update_product(&before.id, &ProductPatch::default())
            .await
            .unwrap();
        assert_eq!(store.get_product(&before.id).await.unwrap().unwrap(), after);
    }

    #[tokio::test]
    async fn missing_ids_are_assigned_on_create() {
        let store = store().await;
        let state = played(1);
        let mut sim = state.simulation.clone();
        sim.id = "".into();
        let sim_id = store.create_simulation(&sim).await.unwrap();
        assert_eq!(
            sim_id.as_str(),
            format!("sim_{}", sim.created_at.timestamp_millis())
        );

        let mut company = state.companies[0].clone();
        company.id = "".into();
        company.simulation_id = sim_id.clone();
        let company_id = store.create_company(&company).await.unwrap();
        assert_eq!(company_id.as_str(), format!("company_{sim_id}_1"));

        let mut product = state.products[0].clone();
        product.id = "".into();
        product.company_id = company_id.clone();
        let product_id = store.create_product(&product).await.unwrap();
        assert_eq!(product_id.as_str(), format!("product_{sim_id}_2"));
        assert_eq!(store.products_by_company(&company_id).await.unwrap().len(), 1);

        let mut decision = state.decisions[0].clone();
        decision.id = "".into();
        decision.company_id = company_id.clone();
        let decision_id = store.create_decision(&sim_id, &decision).await.unwrap();
        assert_eq!(decision_id.as_str(), format!("decision_{sim_id}_3"));
        assert!(store.get_decision(&decision_id).await.unwrap().is_some());

        // A given id is kept and does not advance the sequence.
        let mut named = state.companies[0].clone();
        named.simulation_id = sim_id.clone();
        assert_eq!(store.create_company(&named).await.unwrap(), named.id);
        let (seq,): (i64,) = sqlx::query_as("SELECT id_seq FROM simulations WHERE id = ?")
            .bind(sim_id.as_str())
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(seq, 3);

        let mut market = state.market_conditions[0].clone();
        market.id = "".into();
        market.simulation_id = sim_id.clone();
        let market_id = store.create_market_conditions(&market).await.unwrap();
        assert_eq!(market_id.as_str(), format!("market_{sim_id}_0"));

        let mut result = state.performance_results[0].clone();
        result.id = String::new();
        result.company_id = company_id.clone();
        let result_id = store.create_performance_result(&result).await.unwrap();
        assert_eq!(result_id, format!("perf_{company_id}_0"));

        let mut orphan = state.companies[0].clone();
        orphan.id = "".into();
        orphan.simulation_id = "sim_missing".into();
        assert!(matches!(
            store.create_company(&orphan).await,
            Err(StoreError::NotFound { kind: "simulation", .. })
        ));

        let user = User {
            id: "".into(),
            name: "Grace".into(),
            email: "grace@example.com".into(),
            password_hash: "hash".into(),
            role: "player".into(),
            created_at: ts(),
            updated_at: ts(),
        };
        assert_eq!(store.create_user(&user).await.unwrap().as_str(), "user_1");
    }

    #[tokio::test]
    async fn loading_an_unknown_simulation_fails() {
        let store = store().await;
        assert!(matches!(
            store.load_state(&"sim_nope".into()).await,
            Err(StoreError::NotFound { kind: "simulation", .. })
        ));
    }
}
