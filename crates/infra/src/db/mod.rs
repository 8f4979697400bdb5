//! Connection pool, session (transaction) lifecycle and schema setup.

pub mod schema;
mod session;

pub use session::{Session, SessionFactory};
