//! Memory Service: the composition root for the five public operations.
//!
//! Validates input, resolves scopes, calls the embedder, and hands the
//! synchronous store work to the blocking pool behind a single connection
//! mutex so no two operations ever touch the database at the same time.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use super::scope::{resolve_write_scope, validate_project_name, ScopeFilter};
use super::search::{effective_limit, rank_entries};
use super::store;
use super::types::{
    normalize_key, normalize_tags, ListRequest, MemoryEntry, NewEntry, RetrieveRequest,
    ScopeSummary, ScoredEntry,
};
use crate::config::RetrievalConfig;
use crate::embedding::LazyEmbedder;
use crate::error::{MemoryError, MemoryResult};

#[derive(Clone)]
pub struct MemoryService {
    db: Arc<Mutex<Connection>>,
    embedder: Arc<LazyEmbedder>,
    retrieval: RetrievalConfig,
}

impl MemoryService {
    pub fn new(conn: Connection, embedder: Arc<LazyEmbedder>, retrieval: RetrievalConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            embedder,
            retrieval,
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> MemoryResult<T>
    where
        F: FnOnce(&mut Connection) -> MemoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| MemoryError::StorageUnavailable(format!("db lock poisoned: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| MemoryError::StorageUnavailable(format!("db task failed: {e}")))?
    }

    /// Store a note, or refresh the note already holding the same key in that scope.
    pub async fn store(&self, scope: Option<&str>, new: NewEntry) -> MemoryResult<MemoryEntry> {
        let scope = resolve_write_scope(scope)?;
        let new = NewEntry {
            id: new.id.trim().to_string(),
            content: new.content.trim().to_string(),
            key: normalize_key(new.key.as_deref()),
            tags: normalize_tags(&new.tags),
        };
        if new.id.is_empty() {
            return Err(MemoryError::InvalidArgument("id must not be empty".into()));
        }
        if new.content.is_empty() {
            return Err(MemoryError::InvalidArgument("content must not be empty".into()));
        }

        // Embed first so a failed model never leaves a row behind
        let embedding = self.embedder.embed(&new.content).await?;

        let scope_for_log = scope.clone();
        let entry = self
            .with_db(move |conn| store::upsert_entry(conn, &scope, &new, &embedding))
            .await?;

        tracing::info!(
            id = %entry.id,
            scope = %scope_for_log,
            key = entry.key.as_deref().unwrap_or(""),
            updated = entry.created_at != entry.updated_at,
            "memory stored"
        );
        Ok(entry)
    }

    /// Rank the scope's notes by similarity to `query`.
    pub async fn retrieve(&self, req: RetrieveRequest) -> MemoryResult<Vec<ScoredEntry>> {
        let query = req.query.trim().to_string();
        if query.is_empty() {
            return Err(MemoryError::InvalidArgument("query must not be empty".into()));
        }
        let filter = ScopeFilter::resolve(req.scope.as_deref());
        let tags = normalize_tags(&req.tags);
        let limit = effective_limit(
            req.limit,
            self.retrieval.default_limit,
            self.retrieval.max_limit,
        );

        let query_embedding = self.embedder.embed(&query).await?;

        let load_filter = filter.clone();
        let candidates = self
            .with_db(move |conn| store::load_entries(conn, &load_filter, &tags))
            .await?;
        let candidate_count = candidates.len();

        let results = rank_entries(candidates, &query_embedding, limit);
        tracing::debug!(
            scope = %filter,
            candidates = candidate_count,
            returned = results.len(),
            "retrieve complete"
        );
        Ok(results)
    }

    /// Notes in the scope carrying all `tags`, most recently updated first.
    pub async fn list(&self, req: ListRequest) -> MemoryResult<Vec<MemoryEntry>> {
        let filter = ScopeFilter::resolve(req.scope.as_deref());
        let tags = normalize_tags(&req.tags);
        self.with_db(move |conn| store::list_entries(conn, &filter, &tags))
            .await
    }

    /// Delete by scope and id. `false` when nothing matched.
    pub async fn delete(&self, scope: Option<&str>, id: &str) -> MemoryResult<bool> {
        let scope = resolve_write_scope(scope)?;
        let id = id.trim().to_string();
        if id.is_empty() {
            return Err(MemoryError::InvalidArgument("id must not be empty".into()));
        }

        let (log_scope, log_id) = (scope.clone(), id.clone());
        let removed = self
            .with_db(move |conn| store::delete_entry(conn, &scope, &id))
            .await?;
        tracing::info!(id = %log_id, scope = %log_scope, removed, "delete memory");
        Ok(removed)
    }

    /// Move a whole project to a new name. `false` when the source project has
    /// no notes; `Conflict` when the target already has some.
    pub async fn rename_project(&self, old_name: &str, new_name: &str) -> MemoryResult<bool> {
        let old = validate_project_name(old_name)?;
        let new = validate_project_name(new_name)?;
        if old == new {
            return Err(MemoryError::InvalidArgument(
                "old and new project names are the same".into(),
            ));
        }

        let (log_old, log_new) = (old.clone(), new.clone());
        match self
            .with_db(move |conn| store::rename_scope(conn, &old, &new))
            .await
        {
            Ok(moved) => {
                tracing::info!(from = %log_old, to = %log_new, moved, "project renamed");
                Ok(true)
            }
            Err(MemoryError::NotFound(msg)) => {
                tracing::info!(from = %log_old, "rename skipped: {msg}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Every scope with its entry count.
    pub async fn scopes(&self) -> MemoryResult<Vec<ScopeSummary>> {
        self.with_db(|conn| store::scope_summaries(conn)).await
    }

    /// Embed rows that have no embedding yet (or every row when `all` is set),
    /// `batch_size` at a time. `on_batch` receives the number of rows just written.
    /// Returns the total number of rows updated.
    pub async fn backfill_embeddings(
        &self,
        batch_size: usize,
        all: bool,
        mut on_batch: impl FnMut(usize),
    ) -> MemoryResult<usize> {
        let pending = self
            .with_db(move |conn| store::pending_embeddings(conn, all))
            .await?;
        if pending.is_empty() {
            return Ok(0);
        }
        tracing::info!(rows = pending.len(), all, "backfilling embeddings");

        let mut total = 0;
        for chunk in pending.chunks(batch_size.max(1)) {
            let texts: Vec<String> = chunk.iter().map(|(_, content)| content.clone()).collect();
            let vectors = self.embedder.embed_batch(texts).await?;
            let batch: Vec<(String, Vec<f32>)> = chunk
                .iter()
                .map(|(id, _)| id.clone())
                .zip(vectors)
                .collect();
            let written = self
                .with_db(move |conn| store::set_embeddings(conn, &batch))
                .await?;
            total += written;
            on_batch(written);
        }
        Ok(total)
    }

    /// Record which model produced the stored vectors.
    pub async fn set_embedding_model(&self, model: &str) -> MemoryResult<()> {
        let model = model.to_string();
        self.with_db(move |conn| Ok(crate::db::migrations::set_embedding_model(conn, &model)?))
            .await
    }
}
