//! Semantic ranking over a full scope scan.
//!
//! Candidates come from [`store::load_entries`](super::store::load_entries),
//! already filtered by scope and tags. Rows without an embedding are skipped,
//! the rest are scored by cosine similarity against the query vector.

use std::cmp::Ordering;

use super::similarity::cosine_similarity;
use super::types::{MemoryEntry, ScoredEntry};

/// Retrieval result count when the caller does not pass one.
pub const DEFAULT_LIMIT: usize = 20;

/// Upper bound on any retrieval result count.
pub const MAX_LIMIT: usize = 100;

/// Resolve the requested limit: missing or zero falls back to `default`,
/// anything above `max` is clamped.
pub fn effective_limit(requested: Option<usize>, default: usize, max: usize) -> usize {
    let max = max.min(MAX_LIMIT).max(1);
    match requested {
        None | Some(0) => default.clamp(1, max),
        Some(n) => n.min(max),
    }
}

/// Highest score first; equal scores go to the most recently updated entry,
/// then to the smaller id.
fn rank_order(a: &ScoredEntry, b: &ScoredEntry) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.entry.updated_at.cmp(&a.entry.updated_at))
        .then_with(|| a.entry.id.cmp(&b.entry.id))
}

/// Score and order `candidates` against `query`, keeping at most `limit`.
pub fn rank_entries(candidates: Vec<MemoryEntry>, query: &[f32], limit: usize) -> Vec<ScoredEntry> {
    let total = candidates.len();
    let mut scored: Vec<ScoredEntry> = candidates
        .into_iter()
        .filter_map(|entry| {
            let score = match entry.embedding.as_deref() {
                Some(v) if v.len() == query.len() => cosine_similarity(v, query),
                _ => return None,
            };
            Some(ScoredEntry { entry, score })
        })
        .collect();

    if scored.len() < total {
        tracing::debug!(skipped = total - scored.len(), "candidates without embedding skipped");
    }

    scored.sort_by(rank_order);
    scored.truncate(limit);
    scored
}
