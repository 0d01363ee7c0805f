//! Core memory type definitions.
//!
//! [`MemoryEntry`] mirrors one row of the `memories` table. The request structs
//! are the payloads the [`MemoryService`](super::service::MemoryService) accepts.

use serde::{Deserialize, Serialize};

/// A stored memory note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Caller-supplied identifier, unique across all scopes.
    pub id: String,
    /// `"global"` or a project name.
    pub scope: String,
    /// Optional upsert handle, unique per scope ignoring case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub content: String,
    /// Labels in the order first given, compared case-insensitively.
    pub tags: Vec<String>,
    /// Embedding of `content`; `None` for rows that predate semantic search.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: String,
    pub updated_at: String,
}

impl MemoryEntry {
    /// AND-match: every filter tag must be present (case-insensitive).
    pub fn has_all_tags(&self, filter: &[String]) -> bool {
        filter.iter().all(|wanted| {
            self.tags
                .iter()
                .any(|t| t.to_lowercase() == wanted.to_lowercase())
        })
    }
}

/// Payload for a store call.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub id: String,
    pub content: String,
    pub key: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RetrieveRequest {
    pub scope: Option<String>,
    pub query: String,
    pub tags: Vec<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub scope: Option<String>,
    pub tags: Vec<String>,
}

/// A retrieval hit with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredEntry {
    #[serde(flatten)]
    pub entry: MemoryEntry,
    pub score: f32,
}

/// Per-scope row count, as reported by `list_projects` and `doctor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeSummary {
    pub scope: String,
    pub count: i64,
    pub last_updated: String,
}

/// Trim, drop empties, and de-duplicate ignoring case while keeping the first
/// spelling and the original order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(tags.len());
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        let folded = tag.to_lowercase();
        if !seen.contains(&folded) {
            seen.push(folded);
            out.push(tag.to_string());
        }
    }
    out
}

/// Blank keys count as no key.
pub fn normalize_key(key: Option<&str>) -> Option<String> {
    key.map(str::trim).filter(|k| !k.is_empty()).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_tags(tags: &[&str]) -> MemoryEntry {
        MemoryEntry {
            id: "id".into(),
            scope: "global".into(),
            key: None,
            content: "c".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            embedding: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn tag_filter_is_and() {
        let e = entry_with_tags(&["x", "y"]);
        assert!(e.has_all_tags(&strings(&["x"])));
        assert!(e.has_all_tags(&strings(&["x", "y"])));
        assert!(!e.has_all_tags(&strings(&["x", "z"])));
        assert!(e.has_all_tags(&[]));
    }

    #[test]
    fn tag_filter_ignores_case() {
        let e = entry_with_tags(&["Conventions"]);
        assert!(e.has_all_tags(&strings(&["conventions"])));
    }

    #[test]
    fn normalize_tags_dedups_and_keeps_order() {
        let tags = strings(&[" b ", "a", "B", "", "c"]);
        assert_eq!(normalize_tags(&tags), strings(&["b", "a", "c"]));
    }

    #[test]
    fn blank_key_is_none() {
        assert_eq!(normalize_key(Some("  ")), None);
        assert_eq!(normalize_key(Some(" lib ")), Some("lib".into()));
        assert_eq!(normalize_key(None), None);
    }

    #[test]
    fn embedding_not_serialized() {
        let mut e = entry_with_tags(&[]);
        e.embedding = Some(vec![1.0]);
        let json = serde_json::to_value(&e).unwrap();
        assert!(json.get("embedding").is_none());
        assert!(json.get("key").is_none());
    }
}
