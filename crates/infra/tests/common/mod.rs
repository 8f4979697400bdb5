//! Shared harness: a fresh in-memory database per test, one open session.

use gavel_infra::{Session, SessionFactory};

pub async fn open_session() -> anyhow::Result<(SessionFactory, Session)> {
    gavel_observability::init_for_tests();

    let factory = SessionFactory::in_memory().await?;
    let session = factory.open().await?;
    Ok((factory, session))
}
