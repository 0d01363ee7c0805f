//! Entry Store: every read and write against the `memories` table.
//!
//! [`upsert_entry`] is the single write path: inside one transaction it looks
//! up an existing row by `(scope, key_folded)`, then either refreshes that row
//! in place or inserts a new one. Embeddings are computed by the caller before
//! the transaction opens, so a row is never written without one.

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use super::scope::ScopeFilter;
use super::types::{MemoryEntry, NewEntry, ScopeSummary};
use super::{bytes_to_embedding, embedding_to_bytes, next_timestamp, now_timestamp};
use crate::db::migrations::fold_key;
use crate::embedding::EMBEDDING_DIM;
use crate::error::{MemoryError, MemoryResult};

const ENTRY_COLUMNS: &str =
    "id, scope, key, content, tags, embedding, created_at, updated_at";

/// Row as it sits in SQLite, before tags and embedding are decoded.
struct RawRow {
    id: String,
    scope: String,
    key: Option<String>,
    content: String,
    tags: String,
    embedding: Option<Vec<u8>>,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            scope: row.get(1)?,
            key: row.get(2)?,
            content: row.get(3)?,
            tags: row.get(4)?,
            embedding: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn decode(self) -> MemoryResult<MemoryEntry> {
        let embedding = self
            .embedding
            .map(|blob| bytes_to_embedding(&blob, EMBEDDING_DIM))
            .transpose()?;
        Ok(MemoryEntry {
            id: self.id,
            scope: self.scope,
            key: self.key,
            content: self.content,
            tags: serde_json::from_str(&self.tags)?,
            embedding,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    /// Decode everything but the embedding blob, which is left as `None`.
    fn decode_without_embedding(self) -> MemoryResult<MemoryEntry> {
        Self { embedding: None, ..self }.decode()
    }
}

/// Insert a new entry, or refresh the one already holding `(scope, key)`.
///
/// On a key match the existing `id`, `scope`, `key` and `created_at` are kept
/// and `content`, `tags`, `embedding` and `updated_at` are replaced. Without a
/// match, `new.id` must not exist anywhere yet.
pub fn upsert_entry(
    conn: &mut Connection,
    scope: &str,
    new: &NewEntry,
    embedding: &[f32],
) -> MemoryResult<MemoryEntry> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(MemoryError::InvalidArgument(format!(
            "embedding has {} dimensions, expected {EMBEDDING_DIM}",
            embedding.len()
        )));
    }

    let tx = conn.transaction()?;
    let tags_json = serde_json::to_string(&new.tags)?;
    let blob = embedding_to_bytes(embedding);

    let existing = match new.key.as_deref() {
        Some(key) => find_by_key(&tx, scope, key)?,
        None => None,
    };

    let entry = match existing {
        Some(existing) => {
            let updated_at = next_timestamp(&existing.updated_at);
            tx.execute(
                "UPDATE memories SET content = ?1, tags = ?2, embedding = ?3, updated_at = ?4 \
                 WHERE id = ?5",
                params![new.content, tags_json, blob, updated_at, existing.id],
            )?;
            tracing::debug!(id = %existing.id, scope, "updated entry in place");
            MemoryEntry {
                content: new.content.clone(),
                tags: new.tags.clone(),
                embedding: Some(embedding.to_vec()),
                updated_at,
                ..existing
            }
        }
        None => {
            if id_exists(&tx, &new.id)? {
                return Err(MemoryError::Conflict(format!(
                    "a memory with id '{}' already exists",
                    new.id
                )));
            }
            let now = now_timestamp();
            tx.execute(
                "INSERT INTO memories \
                 (id, scope, key, key_folded, content, tags, embedding, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    new.id,
                    scope,
                    new.key,
                    new.key.as_deref().map(fold_key),
                    new.content,
                    tags_json,
                    blob,
                    now
                ],
            )?;
            tracing::debug!(id = %new.id, scope, "inserted entry");
            MemoryEntry {
                id: new.id.clone(),
                scope: scope.to_string(),
                key: new.key.clone(),
                content: new.content.clone(),
                tags: new.tags.clone(),
                embedding: Some(embedding.to_vec()),
                created_at: now.clone(),
                updated_at: now,
            }
        }
    };

    tx.commit()?;
    Ok(entry)
}

fn find_by_key(tx: &Transaction, scope: &str, key: &str) -> MemoryResult<Option<MemoryEntry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM memories WHERE scope = ?1 AND key_folded = ?2"
    );
    tx.query_row(&sql, params![scope, fold_key(key)], RawRow::from_row)
        .optional()?
        .map(RawRow::decode)
        .transpose()
}

fn id_exists(conn: &Connection, id: &str) -> MemoryResult<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM memories WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?)
}

/// All entries in the scope carrying every tag in `tags`, most recently
/// updated first (ties by id), with their embeddings decoded. A malformed
/// embedding blob fails the whole load.
pub fn load_entries(
    conn: &Connection,
    filter: &ScopeFilter,
    tags: &[String],
) -> MemoryResult<Vec<MemoryEntry>> {
    query_entries(conn, filter, tags, RawRow::decode)
}

/// Same rows and order as [`load_entries`], but embeddings are never read, so
/// listing keeps working when a stored vector is damaged.
pub fn list_entries(
    conn: &Connection,
    filter: &ScopeFilter,
    tags: &[String],
) -> MemoryResult<Vec<MemoryEntry>> {
    query_entries(conn, filter, tags, RawRow::decode_without_embedding)
}

fn query_entries(
    conn: &Connection,
    filter: &ScopeFilter,
    tags: &[String],
    decode: fn(RawRow) -> MemoryResult<MemoryEntry>,
) -> MemoryResult<Vec<MemoryEntry>> {
    let rows = match filter {
        ScopeFilter::All => {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM memories ORDER BY updated_at DESC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], RawRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        ScopeFilter::Exact(scope) => {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM memories WHERE scope = ?1 \
                 ORDER BY updated_at DESC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![scope], RawRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };

    let mut entries = Vec::with_capacity(rows.len());
    for raw in rows {
        let entry = decode(raw)?;
        if entry.has_all_tags(tags) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Remove the entry only when both scope and id match.
pub fn delete_entry(conn: &Connection, scope: &str, id: &str) -> MemoryResult<bool> {
    let removed = conn.execute(
        "DELETE FROM memories WHERE id = ?1 AND scope = ?2",
        params![id, scope],
    )?;
    Ok(removed > 0)
}

fn count_in_scope(conn: &Connection, scope: &str) -> MemoryResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM memories WHERE scope = ?1",
        params![scope],
        |row| row.get(0),
    )?)
}

/// Move every entry from `old` to `new`. Never merges: fails with `Conflict`
/// when `new` already has entries, and `NotFound` when `old` has none.
/// Returns the number of entries moved.
pub fn rename_scope(conn: &mut Connection, old: &str, new: &str) -> MemoryResult<usize> {
    let tx = conn.transaction()?;

    if count_in_scope(&tx, old)? == 0 {
        return Err(MemoryError::NotFound(format!("no memories under project '{old}'")));
    }
    if count_in_scope(&tx, new)? > 0 {
        return Err(MemoryError::Conflict(format!(
            "project '{new}' already has memories"
        )));
    }

    let moved = tx.execute(
        "UPDATE memories SET scope = ?1 WHERE scope = ?2",
        params![new, old],
    )?;
    tx.commit()?;
    Ok(moved)
}

/// Distinct scopes with their entry counts, alphabetically.
pub fn scope_summaries(conn: &Connection) -> MemoryResult<Vec<ScopeSummary>> {
    let mut stmt = conn.prepare(
        "SELECT scope, COUNT(*), MAX(updated_at) FROM memories GROUP BY scope ORDER BY scope",
    )?;
    let summaries = stmt
        .query_map([], |row| {
            Ok(ScopeSummary {
                scope: row.get(0)?,
                count: row.get(1)?,
                last_updated: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(summaries)
}

/// `(id, content)` of rows needing an embedding: those without one, or all
/// rows when `include_embedded` is set.
pub fn pending_embeddings(
    conn: &Connection,
    include_embedded: bool,
) -> MemoryResult<Vec<(String, String)>> {
    let sql = if include_embedded {
        "SELECT id, content FROM memories ORDER BY id"
    } else {
        "SELECT id, content FROM memories WHERE embedding IS NULL ORDER BY id"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Write embeddings for existing rows in one transaction. `updated_at` is left
/// alone since the note itself did not change.
pub fn set_embeddings(conn: &mut Connection, batch: &[(String, Vec<f32>)]) -> MemoryResult<usize> {
    let tx = conn.transaction()?;
    let mut written = 0;
    {
        let mut stmt = tx.prepare("UPDATE memories SET embedding = ?1 WHERE id = ?2")?;
        for (id, embedding) in batch {
            if embedding.len() != EMBEDDING_DIM {
                return Err(MemoryError::InvalidArgument(format!(
                    "embedding for '{id}' has {} dimensions, expected {EMBEDDING_DIM}",
                    embedding.len()
                )));
            }
            written += stmt.execute(params![embedding_to_bytes(embedding), id])?;
        }
    }
    tx.commit()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    /// Unit vector along dimension `i`.
    fn spike(i: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[i] = 1.0;
        v
    }

    fn get_entry(conn: &Connection, id: &str) -> MemoryResult<Option<MemoryEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM memories WHERE id = ?1");
        conn.query_row(&sql, params![id], RawRow::from_row)
            .optional()?
            .map(RawRow::decode)
            .transpose()
    }

    fn new_entry(id: &str, content: &str, key: Option<&str>, tags: &[&str]) -> NewEntry {
        NewEntry {
            id: id.into(),
            content: content.into(),
            key: key.map(String::from),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn insert_sets_both_timestamps() {
        let mut conn = test_db();
        let entry = upsert_entry(&mut conn, "app", &new_entry("m1", "hello", None, &["a"]), &spike(0))
            .unwrap();
        assert_eq!(entry.created_at, entry.updated_at);
        assert_eq!(entry.scope, "app");

        let stored = get_entry(&conn, "m1").unwrap().unwrap();
        assert_eq!(stored, entry);
        assert_eq!(stored.embedding.unwrap(), spike(0));
    }

    #[test]
    fn key_match_updates_in_place() {
        let mut conn = test_db();
        let first = upsert_entry(
            &mut conn,
            "app",
            &new_entry("m1", "old", Some("lib"), &["a"]),
            &spike(0),
        )
        .unwrap();
        let second = upsert_entry(
            &mut conn,
            "app",
            &new_entry("m2", "new", Some("LIB"), &["b"]),
            &spike(1),
        )
        .unwrap();

        assert_eq!(second.id, "m1");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(second.content, "new");
        assert_eq!(second.tags, vec!["b".to_string()]);
        assert_eq!(second.key.as_deref(), Some("lib"));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert!(get_entry(&conn, "m2").unwrap().is_none());
        assert_eq!(get_entry(&conn, "m1").unwrap().unwrap().embedding.unwrap(), spike(1));
    }

    #[test]
    fn same_key_in_other_scope_is_separate() {
        let mut conn = test_db();
        upsert_entry(&mut conn, "a", &new_entry("m1", "x", Some("k"), &[]), &spike(0)).unwrap();
        let other =
            upsert_entry(&mut conn, "b", &new_entry("m2", "y", Some("k"), &[]), &spike(0)).unwrap();
        assert_eq!(other.id, "m2");
    }

    #[test]
    fn duplicate_id_without_key_match_conflicts() {
        let mut conn = test_db();
        upsert_entry(&mut conn, "a", &new_entry("m1", "x", None, &[]), &spike(0)).unwrap();
        let err =
            upsert_entry(&mut conn, "b", &new_entry("m1", "y", None, &[]), &spike(0)).unwrap_err();
        assert!(matches!(err, MemoryError::Conflict(_)));
    }

    #[test]
    fn wrong_dimension_is_rejected_before_write() {
        let mut conn = test_db();
        let err = upsert_entry(&mut conn, "a", &new_entry("m1", "x", None, &[]), &[1.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidArgument(_)));
        assert!(get_entry(&conn, "m1").unwrap().is_none());
    }

    #[test]
    fn load_filters_by_scope_and_tags() {
        let mut conn = test_db();
        upsert_entry(&mut conn, "a", &new_entry("m1", "one", None, &["x", "y"]), &spike(0)).unwrap();
        upsert_entry(&mut conn, "a", &new_entry("m2", "two", None, &["x"]), &spike(1)).unwrap();
        upsert_entry(&mut conn, "b", &new_entry("m3", "three", None, &["x", "y"]), &spike(2)).unwrap();

        let a = ScopeFilter::Exact("a".into());
        let tags = vec!["X".to_string(), "y".to_string()];
        let ids: Vec<String> = load_entries(&conn, &a, &tags)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["m1"]);

        let all = load_entries(&conn, &ScopeFilter::All, &tags).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn load_orders_most_recent_first() {
        let mut conn = test_db();
        upsert_entry(&mut conn, "a", &new_entry("m1", "one", Some("k1"), &[]), &spike(0)).unwrap();
        upsert_entry(&mut conn, "a", &new_entry("m2", "two", None, &[]), &spike(1)).unwrap();
        // Touch m1 again so it becomes the newest
        upsert_entry(&mut conn, "a", &new_entry("ignored", "one again", Some("k1"), &[]), &spike(0))
            .unwrap();

        let ids: Vec<String> = load_entries(&conn, &ScopeFilter::Exact("a".into()), &[])
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn delete_requires_matching_scope() {
        let mut conn = test_db();
        upsert_entry(&mut conn, "a", &new_entry("m1", "x", None, &[]), &spike(0)).unwrap();
        assert!(!delete_entry(&conn, "b", "m1").unwrap());
        assert!(delete_entry(&conn, "a", "m1").unwrap());
        assert!(!delete_entry(&conn, "a", "m1").unwrap());
    }

    #[test]
    fn rename_moves_every_entry() {
        let mut conn = test_db();
        upsert_entry(&mut conn, "old", &new_entry("m1", "x", Some("k"), &[]), &spike(0)).unwrap();
        upsert_entry(&mut conn, "old", &new_entry("m2", "y", None, &[]), &spike(1)).unwrap();

        assert_eq!(rename_scope(&mut conn, "old", "new").unwrap(), 2);
        assert!(load_entries(&conn, &ScopeFilter::Exact("old".into()), &[]).unwrap().is_empty());
        assert_eq!(load_entries(&conn, &ScopeFilter::Exact("new".into()), &[]).unwrap().len(), 2);
    }

    #[test]
    fn rename_of_missing_scope_is_not_found() {
        let mut conn = test_db();
        let err = rename_scope(&mut conn, "ghost", "new").unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[test]
    fn rename_onto_populated_scope_conflicts_without_changes() {
        let mut conn = test_db();
        upsert_entry(&mut conn, "a", &new_entry("m1", "x", None, &[]), &spike(0)).unwrap();
        upsert_entry(&mut conn, "b", &new_entry("m2", "y", None, &[]), &spike(1)).unwrap();

        let err = rename_scope(&mut conn, "a", "b").unwrap_err();
        assert!(matches!(err, MemoryError::Conflict(_)));
        assert_eq!(get_entry(&conn, "m1").unwrap().unwrap().scope, "a");
        assert_eq!(get_entry(&conn, "m2").unwrap().unwrap().scope, "b");
    }

    #[test]
    fn legacy_rows_load_without_embedding() {
        let conn = test_db();
        conn.execute(
            "INSERT INTO memories (id, scope, content, tags, created_at, updated_at) \
             VALUES ('old', 'global', 'legacy note', '[]', '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
        let entries = load_entries(&conn, &ScopeFilter::Exact("global".into()), &[]).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].embedding.is_none());

        let pending = pending_embeddings(&conn, false).unwrap();
        assert_eq!(pending, vec![("old".to_string(), "legacy note".to_string())]);
    }

    #[test]
    fn set_embeddings_fills_legacy_rows() {
        let mut conn = test_db();
        conn.execute(
            "INSERT INTO memories (id, scope, content, tags, created_at, updated_at) \
             VALUES ('old', 'global', 'legacy note', '[]', '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
        let written = set_embeddings(&mut conn, &[("old".to_string(), spike(3))]).unwrap();
        assert_eq!(written, 1);

        let entry = get_entry(&conn, "old").unwrap().unwrap();
        assert_eq!(entry.embedding.unwrap(), spike(3));
        assert_eq!(entry.updated_at, "2024-01-01T00:00:00.000000Z");
        assert!(pending_embeddings(&conn, false).unwrap().is_empty());
    }

    #[test]
    fn scope_summaries_count_rows() {
        let mut conn = test_db();
        upsert_entry(&mut conn, "b", &new_entry("m1", "x", None, &[]), &spike(0)).unwrap();
        upsert_entry(&mut conn, "a", &new_entry("m2", "y", None, &[]), &spike(1)).unwrap();
        upsert_entry(&mut conn, "a", &new_entry("m3", "z", None, &[]), &spike(2)).unwrap();

        let summaries = scope_summaries(&conn).unwrap();
        let counts: Vec<(String, i64)> =
            summaries.into_iter().map(|s| (s.scope, s.count)).collect();
        assert_eq!(counts, vec![("a".to_string(), 2), ("b".to_string(), 1)]);
    }

    #[test]
    fn key_match_folds_non_ascii_case() {
        let mut conn = test_db();
        upsert_entry(&mut conn, "p", &new_entry("m1", "apples", Some("ÄPFEL"), &[]), &spike(0)).unwrap();
        let updated =
            upsert_entry(&mut conn, "p", &new_entry("m2", "more apples", Some("äpfel"), &[]), &spike(1))
                .unwrap();

        assert_eq!(updated.id, "m1");
        assert_eq!(updated.key.as_deref(), Some("ÄPFEL"));
        let entries = load_entries(&conn, &ScopeFilter::Exact("p".into()), &[]).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "more apples");
        assert!(get_entry(&conn, "m2").unwrap().is_none());
    }

    #[test]
    fn damaged_embedding_fails_load_but_not_list() {
        let mut conn = test_db();
        upsert_entry(&mut conn, "p", &new_entry("good", "fine", None, &[]), &spike(0)).unwrap();
        conn.execute(
            "INSERT INTO memories (id, scope, content, tags, embedding, created_at, updated_at) \
             VALUES ('bad', 'p', 'x', '[]', x'0102', '2024-01-01T00:00:00.000000Z', \
                     '2024-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();

        let filter = ScopeFilter::Exact("p".into());
        let err = load_entries(&conn, &filter, &[]).unwrap_err();
        assert!(matches!(err, MemoryError::StorageUnavailable(_)));

        let listed = list_entries(&conn, &filter, &[]).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|e| e.embedding.is_none()));
    }
}
