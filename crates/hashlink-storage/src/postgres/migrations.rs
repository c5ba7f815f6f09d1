use hashlink_core::{Result, StorageError};
use sqlx::PgPool;
use tracing::{debug, info};

/// A named group of idempotent DDL statements.
struct Migration {
    name: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "user sequence",
        statements: &["CREATE SEQUENCE IF NOT EXISTS seq_user START 1"],
    },
    Migration {
        name: "urls table",
        statements: &[
            "CREATE TABLE IF NOT EXISTS urls ()",
            "ALTER TABLE urls ADD COLUMN IF NOT EXISTS short_id BIGINT UNIQUE NOT NULL",
            "ALTER TABLE urls ADD COLUMN IF NOT EXISTS full_url VARCHAR NOT NULL",
            "ALTER TABLE urls ADD COLUMN IF NOT EXISTS isdeleted BOOLEAN NOT NULL DEFAULT FALSE",
        ],
    },
    Migration {
        name: "relations table",
        statements: &[
            "CREATE TABLE IF NOT EXISTS relations ()",
            "ALTER TABLE relations ADD COLUMN IF NOT EXISTS user_id BIGINT NOT NULL",
            "ALTER TABLE relations ADD COLUMN IF NOT EXISTS short_id BIGINT NOT NULL",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_relations__user_id_short_id ON relations (user_id, short_id)",
            "CREATE INDEX IF NOT EXISTS idx_relations__short_id ON relations (short_id)",
        ],
    },
];

/// Brings the schema up to date. Safe to run on every start.
///
/// Any failure is returned as [`StorageError::Migration`]; callers must not
/// serve traffic after it.
pub(crate) async fn run(pool: &PgPool) -> Result<()> {
    for migration in MIGRATIONS {
        for &statement in migration.statements {
            debug!(migration = migration.name, statement, "executing migration statement");
            sqlx::query(statement).execute(pool).await.map_err(|e| {
                StorageError::Migration(format!("{} ('{statement}'): {e}", migration.name))
            })?;
        }
        info!(migration = migration.name, "migration applied");
    }

    Ok(())
}
