use sqlx::AnyPool;
use tracing::info;

use crate::db_config::Dialect;

const SQLITE_SCHEMA: &str = include_str!("../migrations/schema_sqlite.sql");

/// Creates the incident and notification tables for the plain dialect.
/// The procedure dialect relies on the DBA-managed schema.
pub async fn init_schema(pool: &AnyPool, dialect: Dialect) -> sqlx::Result<()> {
    if dialect == Dialect::Procedures {
        return Ok(());
    }

    for stmt in SQLITE_SCHEMA.split(';') {
        if !stmt.trim().is_empty() {
            sqlx::query(stmt).execute(pool).await?;
        }
    }

    info!("incident schema ready");
    Ok(())
}
