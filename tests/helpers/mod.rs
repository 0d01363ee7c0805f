#![allow(dead_code)]

use std::sync::Arc;

use memoria::config::RetrievalConfig;
use memoria::db;
use memoria::embedding::{l2_normalize, EmbeddingProvider, LazyEmbedder, EMBEDDING_DIM};
use memoria::memory::service::MemoryService;
use memoria::memory::types::NewEntry;
use rusqlite::Connection;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Generate a deterministic 384-dim embedding with a spike at position `seed`.
/// Each seed produces a distinct, orthogonal vector.
pub fn test_embedding(seed: u16) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[seed as usize % EMBEDDING_DIM] = 1.0;
    v
}

const VOCAB: &[&str] = &[
    "use", "zod", "validation", "avoid", "joi", "library", "choice", "rust", "python", "deploy",
    "friday", "tabs", "spaces", "database", "postgres",
];

/// Bag-of-words embedder over a small vocabulary. Texts sharing words land
/// close together; texts with no vocabulary words embed to the zero vector.
pub struct KeywordProvider;

impl EmbeddingProvider for KeywordProvider {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            let word = word.to_lowercase();
            if let Some(i) = VOCAB.iter().position(|w| *w == word) {
                v[i] += 1.0;
            }
        }
        l2_normalize(&mut v);
        Ok(v)
    }
}

/// Service over `conn` backed by [`KeywordProvider`].
pub fn service_with(conn: Connection) -> MemoryService {
    let embedder = Arc::new(LazyEmbedder::ready(Arc::new(KeywordProvider)));
    MemoryService::new(conn, embedder, RetrievalConfig::default())
}

/// Service over a fresh in-memory database.
pub fn test_service() -> MemoryService {
    service_with(test_db())
}

/// Service whose model never loads.
pub fn broken_service() -> MemoryService {
    let embedder = Arc::new(LazyEmbedder::new(|| anyhow::bail!("model files missing")));
    MemoryService::new(test_db(), embedder, RetrievalConfig::default())
}

pub fn note(id: &str, content: &str) -> NewEntry {
    NewEntry {
        id: id.into(),
        content: content.into(),
        ..Default::default()
    }
}

pub fn keyed(id: &str, content: &str, key: &str) -> NewEntry {
    NewEntry {
        key: Some(key.into()),
        ..note(id, content)
    }
}

pub fn tagged(id: &str, content: &str, tags: &[&str]) -> NewEntry {
    NewEntry {
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..note(id, content)
    }
}
