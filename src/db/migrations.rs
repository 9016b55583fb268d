//! Schema migration framework.
//!
//! Numbered SQL migrations are embedded at compile time via `include_str!`.
//! Each migration runs exactly once, tracked by the `schema_version` table.
//! All migration SQL is written with `IF NOT EXISTS` / `ON CONFLICT` so a
//! migration that partially applied before a crash can be re-run safely.

use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("../migrations/001_baseline.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("../migrations/002_unpaid_ar_index.sql"),
    },
    Migration {
        version: 3,
        sql: include_str!("../migrations/003_invoice_contact_name.sql"),
    },
];

fn ensure_schema_version_table(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("failed to create schema_version table: {e}"))
}

fn current_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("failed to read schema version: {e}"))
}

/// Back up the database before applying pending migrations, using SQLite's
/// online backup API. Skipped for in-memory databases (tests).
fn backup_before_migration(conn: &Connection) -> Result<(), String> {
    let db_path: String = conn
        .query_row("PRAGMA database_list", [], |row| row.get(2))
        .map_err(|e| format!("failed to get database path: {e}"))?;

    if db_path.is_empty() {
        return Ok(());
    }

    let backup_path = format!("{db_path}.pre-migration.bak");
    let mut backup_conn = Connection::open(&backup_path)
        .map_err(|e| format!("failed to open backup file: {e}"))?;

    let backup = rusqlite::backup::Backup::new(conn, &mut backup_conn)
        .map_err(|e| format!("failed to initialize pre-migration backup: {e}"))?;
    backup
        .step(-1)
        .map_err(|e| format!("pre-migration backup failed: {e}"))?;

    tracing::info!(path = %backup_path, "pre-migration backup created");
    Ok(())
}

/// Run all pending migrations. Returns the number applied (0 if up to date).
///
/// Forward-compat guard: a database with a higher recorded version than any
/// known migration refuses to run rather than risk corrupting newer state.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    ensure_schema_version_table(conn)?;

    let current = current_version(conn)?;
    let max_known = MIGRATIONS.last().map(|m| m.version).unwrap_or(0);

    if current > max_known {
        return Err(format!(
            "database schema version ({current}) is newer than this build supports ({max_known}); \
             update agencyos"
        ));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        return Ok(0);
    }

    backup_before_migration(conn)?;

    for migration in &pending {
        conn.execute_batch(migration.sql)
            .map_err(|e| format!("migration v{} failed: {e}", migration.version))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )
        .map_err(|e| format!("failed to record migration v{}: {e}", migration.version))?;
        tracing::info!(version = migration.version, "applied migration");
    }

    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_db() -> Connection {
        Connection::open_in_memory().expect("in-memory db")
    }

    #[test]
    fn fresh_db_applies_all_migrations() {
        let conn = mem_db();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, MIGRATIONS.len());
        assert_eq!(current_version(&conn).unwrap(), 3);

        // Spot-check a table from the baseline and the additive migration.
        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))
            .expect("clients table should exist");
        assert_eq!(count, 0);
    }

    #[test]
    fn idempotent_second_run_applies_nothing() {
        let conn = mem_db();
        assert_eq!(run_migrations(&conn).unwrap(), MIGRATIONS.len());
        assert_eq!(run_migrations(&conn).unwrap(), 0);
    }

    #[test]
    fn forward_compat_guard_rejects_future_version() {
        let conn = mem_db();
        ensure_schema_version_table(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (999)", [])
            .unwrap();

        let err = run_migrations(&conn).unwrap_err();
        assert!(err.contains("newer than this build supports"));
    }
}
