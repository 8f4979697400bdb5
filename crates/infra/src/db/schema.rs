//! Relational schema for users, auctions and bids.
//!
//! Every statement is idempotent so `migrate` can run on each startup.

use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::{RepositoryError, map_sqlx_error};

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS auctions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        initial_value REAL NOT NULL,
        opened_at TEXT NOT NULL,
        closed INTEGER NOT NULL DEFAULT 0,
        used INTEGER NOT NULL DEFAULT 0,
        owner_id INTEGER NOT NULL REFERENCES users (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bids (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        auction_id INTEGER NOT NULL REFERENCES auctions (id) ON DELETE CASCADE,
        bidder_id INTEGER NOT NULL REFERENCES users (id),
        value REAL NOT NULL,
        placed_at TEXT NOT NULL,
        position INTEGER NOT NULL
    )
    "#,
];

/// Create any missing tables.
#[instrument(skip(pool), err)]
pub async fn migrate(pool: &SqlitePool) -> Result<(), RepositoryError> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
    }
    tracing::debug!(tables = STATEMENTS.len(), "schema ready");
    Ok(())
}
