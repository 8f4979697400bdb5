//! Infrastructure layer: SQLite sessions, schema and repositories.

pub mod config;
pub mod db;
pub mod error;
pub mod repositories;

pub use config::{ConfigError, DatabaseConfig};
pub use db::{Session, SessionFactory};
pub use error::RepositoryError;
pub use repositories::{AuctionRepository, UserRepository};
