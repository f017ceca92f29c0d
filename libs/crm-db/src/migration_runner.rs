//! Migration runner.
//!
//! Applies `MigrationTrait` items supplied by a module, records each one in a
//! per-module history table (`crm_migrations__<module>`), and skips entries that
//! are already recorded. Each migration and its history row share one
//! transaction.

use std::collections::HashSet;

use sea_orm::{
    ConnectionTrait, DatabaseBackend, DbErr, FromQueryResult, Statement, TransactionTrait,
};
use sea_orm_migration::MigrationTrait;
use thiserror::Error;
use tracing::{debug, info};

use crate::DbHandle;

const PG_IDENT_MAX: usize = 63;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to create migration table for module '{module}': {source}")]
    CreateTable { module: String, source: DbErr },

    #[error("failed to query migration history for module '{module}': {source}")]
    QueryHistory { module: String, source: DbErr },

    #[error("migration '{migration}' failed for module '{module}': {source}")]
    MigrationFailed {
        module: String,
        migration: String,
        source: DbErr,
    },

    #[error("failed to record migration '{migration}' for module '{module}': {source}")]
    RecordFailed {
        module: String,
        migration: String,
        source: DbErr,
    },

    #[error("duplicate migration name '{name}' for module '{module}'")]
    DuplicateMigrationName { module: String, name: String },
}

/// Result of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationResult {
    pub applied: usize,
    pub skipped: usize,
    pub applied_names: Vec<String>,
}

#[derive(Debug, FromQueryResult)]
struct MigrationRecord {
    version: String,
}

/// Keep `[a-zA-Z0-9_]`, replace everything else with `_`.
fn sanitize_module_name(name: &str) -> String {
    let out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() { "_".to_owned() } else { out }
}

fn migration_table_name(module_name: &str) -> String {
    let mut name = format!("crm_migrations__{}", sanitize_module_name(module_name));
    name.truncate(PG_IDENT_MAX);
    name
}

async fn ensure_migration_table(
    conn: &impl ConnectionTrait,
    table_name: &str,
    module_name: &str,
) -> Result<(), MigrationError> {
    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table_name}" (
            version VARCHAR(255) PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#
    );

    conn.execute(Statement::from_string(DatabaseBackend::Postgres, sql))
        .await
        .map_err(|e| MigrationError::CreateTable {
            module: module_name.to_owned(),
            source: e,
        })?;
    Ok(())
}

async fn get_applied_migrations(
    conn: &impl ConnectionTrait,
    table_name: &str,
    module_name: &str,
) -> Result<HashSet<String>, MigrationError> {
    let sql = format!(r#"SELECT version FROM "{table_name}""#);
    let records = MigrationRecord::find_by_statement(Statement::from_string(
        DatabaseBackend::Postgres,
        sql,
    ))
    .all(conn)
    .await
    .map_err(|e| MigrationError::QueryHistory {
        module: module_name.to_owned(),
        source: e,
    })?;

    Ok(records.into_iter().map(|r| r.version).collect())
}

async fn record_migration(
    conn: &impl ConnectionTrait,
    table_name: &str,
    module_name: &str,
    migration_name: &str,
) -> Result<(), MigrationError> {
    let sql = format!(r#"INSERT INTO "{table_name}" (version) VALUES ($1)"#);
    conn.execute(Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        &sql,
        [migration_name.into()],
    ))
    .await
    .map_err(|e| MigrationError::RecordFailed {
        module: module_name.to_owned(),
        migration: migration_name.to_owned(),
        source: e,
    })?;
    Ok(())
}

/// Run the given migrations for `module_name` against the handle's pool.
///
/// Migrations are applied in name order. Already-recorded names are skipped.
///
/// # Errors
/// Returns `MigrationError` if the history table cannot be created or read, a
/// name is duplicated, or any migration fails (that migration is rolled back).
pub async fn run_migrations_for_module(
    db: &DbHandle,
    module_name: &str,
    migrations: Vec<Box<dyn MigrationTrait>>,
) -> Result<MigrationResult, MigrationError> {
    let conn = db.sea_connection();
    run_module_migrations(&conn, module_name, migrations).await
}

async fn run_module_migrations<C>(
    conn: &C,
    module_name: &str,
    migrations: Vec<Box<dyn MigrationTrait>>,
) -> Result<MigrationResult, MigrationError>
where
    C: ConnectionTrait + TransactionTrait,
{
    if migrations.is_empty() {
        debug!(module = module_name, "No migrations to run");
        return Ok(MigrationResult::default());
    }

    let mut seen = HashSet::new();
    for m in &migrations {
        if !seen.insert(m.name().to_owned()) {
            return Err(MigrationError::DuplicateMigrationName {
                module: module_name.to_owned(),
                name: m.name().to_owned(),
            });
        }
    }

    let table_name = migration_table_name(module_name);
    ensure_migration_table(conn, &table_name, module_name).await?;
    let applied = get_applied_migrations(conn, &table_name, module_name).await?;

    let mut sorted = migrations;
    sorted.sort_by(|a, b| a.name().cmp(b.name()));

    let mut result = MigrationResult::default();

    for migration in sorted {
        let name = migration.name().to_owned();

        if applied.contains(&name) {
            debug!(module = module_name, migration = %name, "Migration already applied, skipping");
            result.skipped += 1;
            continue;
        }

        info!(module = module_name, migration = %name, "Applying migration");

        let failed = |source: DbErr| MigrationError::MigrationFailed {
            module: module_name.to_owned(),
            migration: name.clone(),
            source,
        };

        let txn = conn.begin().await.map_err(failed)?;
        let manager = sea_orm_migration::SchemaManager::new(&txn);
        let res: Result<(), MigrationError> = async {
            migration.up(&manager).await.map_err(failed)?;
            record_migration(&txn, &table_name, module_name, &name).await
        }
        .await;

        match res {
            Ok(()) => txn.commit().await.map_err(failed)?,
            Err(err) => {
                _ = txn.rollback().await;
                return Err(err);
            }
        }

        info!(module = module_name, migration = %name, "Migration applied successfully");
        result.applied += 1;
        result.applied_names.push(name);
    }

    info!(
        module = module_name,
        applied = result.applied,
        skipped = result.skipped,
        "Migration run complete"
    );

    Ok(result)
}
