use anyhow::{bail, Context, Result};
use rusqlite::{Connection, Transaction};

const CURRENT_SCHEMA_VERSION: i32 = 1;

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mut version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "database version ({}) is newer than supported schema ({})",
            version,
            CURRENT_SCHEMA_VERSION
        );
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)
            .with_context(|| format!("migration to version {next_version} failed"))?;
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<()> {
    match version {
        1 => {
            tx.execute_batch(SCHEMA_V1)
                .context("failed to execute schema v1")?;
            Ok(())
        }
        _ => bail!("unknown migration target version: {version}"),
    }
}

const SCHEMA_V1: &str = "
CREATE TABLE focuses (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    item TEXT NOT NULL,
    keywords TEXT NOT NULL DEFAULT '[]',
    is_active INTEGER NOT NULL DEFAULT 1,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    last_activity_at TEXT NOT NULL,
    last_calculated_at TEXT NOT NULL
);

CREATE INDEX idx_focuses_user_active ON focuses(user_id, is_active);
CREATE INDEX idx_focuses_user_ended ON focuses(user_id, ended_at);

CREATE TABLE user_settings (
    user_id TEXT PRIMARY KEY,
    focus_calculation_enabled INTEGER NOT NULL DEFAULT 1,
    focus_calculation_interval_ms INTEGER NOT NULL,
    focus_inactivity_threshold_ms INTEGER NOT NULL,
    focus_min_duration_ms INTEGER NOT NULL,
    last_focus_calculated_at TEXT
);
";
