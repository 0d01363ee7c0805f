//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`].

use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension};

use crate::embedding::{DEFAULT_MODEL, EMBEDDING_DIM};

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM schema_meta WHERE key = ?1", [key], |row| {
        row.get::<_, String>(0)
    })
    .optional()
}

/// Get the stored embedding model identifier, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    get_meta(conn, "embedding_model")
}

/// Get the stored embedding dimensionality, if any.
pub fn get_embedding_dim(conn: &Connection) -> rusqlite::Result<Option<usize>> {
    Ok(get_meta(conn, "embedding_dim")?.and_then(|v| v.parse().ok()))
}

/// Set the stored embedding model identifier.
pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

fn has_column(conn: &Connection, column: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('memories') WHERE name = ?1",
        [column],
        |row| row.get(0),
    )
}

/// Whether the `memories` table already carries an `embedding` column.
pub fn has_embedding_column(conn: &Connection) -> rusqlite::Result<bool> {
    has_column(conn, "embedding")
}

/// Run any pending forward-only migrations. Each migration runs in a transaction.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let tx = conn.unchecked_transaction()?;
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            3 => migrate_v2_to_v3(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }
        update_schema_version(&tx, next)?;
        tx.commit()?;

        version = next;
    }

    Ok(())
}

/// Migration v1 → v2: add the `embedding` column and record which model fills it.
///
/// Rows written before this migration keep a NULL embedding.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    if !has_embedding_column(conn)? {
        conn.execute("ALTER TABLE memories ADD COLUMN embedding BLOB", [])?;
    }
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [DEFAULT_MODEL],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_dim', ?1)",
        [EMBEDDING_DIM.to_string()],
    )?;
    Ok(())
}

/// Migration v2 → v3: move key matching off SQLite's ASCII-only `lower()`.
///
/// Adds `key_folded` holding the Unicode lowercase of `key`, filled from Rust,
/// and swaps the upsert index onto it. Keys that only collide under Unicode
/// folding keep their rows; the most recently updated one stays the upsert
/// target and the others lose their folded key.
fn migrate_v2_to_v3(conn: &Connection) -> rusqlite::Result<()> {
    if !has_column(conn, "key_folded")? {
        conn.execute("ALTER TABLE memories ADD COLUMN key_folded TEXT", [])?;
    }
    conn.execute("DROP INDEX IF EXISTS idx_memories_scope_key", [])?;

    let keyed: Vec<(String, String, String)> = {
        let mut stmt = conn.prepare(
            "SELECT id, scope, key FROM memories WHERE key IS NOT NULL AND key <> '' \
             ORDER BY updated_at DESC, id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let mut seen = HashSet::new();
    let mut update = conn.prepare("UPDATE memories SET key_folded = ?1 WHERE id = ?2")?;
    for (id, scope, key) in keyed {
        let folded = fold_key(&key);
        if seen.insert((scope.clone(), folded.clone())) {
            update.execute(rusqlite::params![folded, id])?;
        } else {
            tracing::warn!(%id, %scope, %key, "key collides with a newer note after case folding");
            update.execute(rusqlite::params![Option::<String>::None, id])?;
        }
    }
    drop(update);

    conn.execute_batch(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_memories_scope_key_folded \
             ON memories(scope, key_folded) WHERE key_folded IS NOT NULL;",
    )?;
    Ok(())
}

/// Case-folded form of a key, the value upserts match on.
pub fn fold_key(key: &str) -> String {
    key.to_lowercase()
}
