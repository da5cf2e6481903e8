#![deny(warnings)]

//! SQLite storage for simulations.
//!
//! One table per entity type. Monetary amounts are stored as decimal text,
//! the structured sub-records of companies, products, decisions and market
//! snapshots as JSON text, timestamps as RFC 3339 strings. A whole
//! [`SimulationState`](sim_core::SimulationState) is committed in a single
//! transaction by [`SqliteStore::save_state`].

mod patch;
mod rows;
mod store;

pub use patch::{CompanyPatch, DecisionPatch, ProductPatch, SimulationPatch, UserPatch};
pub use store::SqliteStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sim_core::UserId;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Query or connection failure, including constraint violations.
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    /// Schema migration could not be applied.
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    /// A JSON blob column failed to encode or decode.
    #[error("malformed JSON column: {0}")]
    Json(#[from] serde_json::Error),
    /// Creating the database directory failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A stored value does not fit its domain type.
    #[error("column {column} holds an invalid value: {value}")]
    InvalidValue { column: &'static str, value: String },
    /// Update or load of a record that is not stored.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
}

impl StoreError {
    pub(crate) fn invalid(column: &'static str, value: impl Display) -> Self {
        StoreError::InvalidValue {
            column,
            value: value.to_string(),
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: impl Display) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Account that owns simulations and companies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Unique across users.
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returns the default SQLite URL used for local saves.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/main.db"
}

fn is_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Open (creating if needed) the database at `url` and apply migrations.
pub async fn init_db(url: &str) -> Result<SqlitePool, StoreError> {
    let memory = is_memory(url);
    if !memory {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .map(|p| p.split('?').next().unwrap_or(p));
        if let Some(parent) = path.and_then(|p| Path::new(p).parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    // An in-memory database lives as long as its single connection.
    let pool = if memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?
    };
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!(url, "database ready");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_sqlite() {
        assert!(default_sqlite_url().starts_with("sqlite://"));
        assert!(!is_memory(default_sqlite_url()));
        assert!(is_memory("sqlite::memory:"));
    }

    #[tokio::test]
    async fn migrations_apply_to_memory_db() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM simulations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n, 0);
    }
}
