//! The semantic memory store: entry model, scopes, persistence, and ranking.

pub mod scope;
pub mod search;
pub mod service;
pub mod similarity;
pub mod store;
pub mod types;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{MemoryError, MemoryResult};

/// Serialize an embedding as consecutive little-endian `f32` values.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Inverse of [`embedding_to_bytes`]. The blob must hold exactly `dim` values.
pub fn bytes_to_embedding(bytes: &[u8], dim: usize) -> MemoryResult<Vec<f32>> {
    let width = dim * std::mem::size_of::<f32>();
    if bytes.is_empty() || bytes.len() % width != 0 {
        return Err(MemoryError::StorageUnavailable(format!(
            "embedding blob of {} bytes is not a multiple of {width}",
            bytes.len()
        )));
    }
    if bytes.len() != width {
        return Err(MemoryError::StorageUnavailable(format!(
            "embedding blob holds {} values, expected {dim}",
            bytes.len() / 4
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time, fixed-width so string order is time order.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// A timestamp strictly after `previous`, normally just "now".
pub fn next_timestamp(previous: &str) -> String {
    let now = Utc::now();
    let floor = DateTime::parse_from_rfc3339(previous)
        .ok()
        .map(|p| p.with_timezone(&Utc) + chrono::Duration::microseconds(1));
    match floor {
        Some(floor) if floor > now => format_timestamp(floor),
        _ => format_timestamp(now),
    }
}
