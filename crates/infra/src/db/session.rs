use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tracing::instrument;

use crate::config::DatabaseConfig;
use crate::error::{RepositoryError, map_sqlx_error};
use crate::repositories::{AuctionRepository, UserRepository};

use super::schema;

/// Owns the connection pool and hands out sessions.
///
/// ## In-memory databases
///
/// Each SQLite connection to `:memory:` sees its own database, so in-memory
/// pools are pinned to a single connection that never idles out. Only one
/// `Session` can be open at a time against such a pool; a second `open()`
/// waits for the first session to finish.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    pool: SqlitePool,
}

impl SessionFactory {
    /// Connect using `config` and bring the schema up to date.
    #[instrument(skip(config), fields(url = %config.url, max_connections = config.max_connections), err)]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| map_sqlx_error("parse_database_url", e))?
            .create_if_missing(config.create_if_missing)
            .foreign_keys(true);

        let pool_options = if config.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        schema::migrate(&pool).await?;
        tracing::info!("session factory ready");

        Ok(Self { pool })
    }

    /// Connect using `GAVEL_DATABASE_URL` / `GAVEL_DATABASE_MAX_CONNECTIONS`.
    pub async fn from_env() -> Result<Self, RepositoryError> {
        let config = DatabaseConfig::from_env()?;
        Self::connect(&config).await
    }

    /// Fresh private database with the schema applied.
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        Self::connect(&DatabaseConfig::in_memory()).await
    }

    /// Acquire a connection and begin a transaction on it.
    #[instrument(skip(self), err)]
    pub async fn open(&self) -> Result<Session, RepositoryError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Session { tx })
    }

    /// Close every pooled connection. In-memory databases are discarded.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// One connection with one open transaction.
///
/// Writes are visible to later reads through the same session immediately.
/// Nothing reaches other sessions until `commit()`; dropping a session
/// without committing rolls the transaction back.
pub struct Session {
    tx: Transaction<'static, Sqlite>,
}

impl Session {
    pub fn users(&mut self) -> UserRepository<'_> {
        UserRepository::new(self)
    }

    pub fn auctions(&mut self) -> AuctionRepository<'_> {
        AuctionRepository::new(self)
    }

    pub(crate) fn connection(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    #[instrument(skip(self), err)]
    pub async fn commit(self) -> Result<(), RepositoryError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), err)]
    pub async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback_transaction", e))
    }
}
