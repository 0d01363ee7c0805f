//! Scoped semantic memory for AI agent sessions.
//!
//! memoria stores short text notes for an agent. Each note lives in a scope
//! (the `"global"` bucket or a named project), may carry a `key` that makes
//! later stores update it in place, and carries free-form tags. Notes are found
//! again either by listing a scope or by semantic similarity to a query.
//!
//! # Architecture
//!
//! - **Storage**: SQLite, one connection, embeddings kept as little-endian `f32` blobs
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions),
//!   loaded lazily behind a single-flight initializer
//! - **Search**: exact cosine similarity over a full scan of the requested scope
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`embedding`]: Text-to-vector embedding via ONNX Runtime
//! - [`error`]: The [`error::MemoryError`] taxonomy
//! - [`memory`]: Scopes, the entry store, ranking, and the [`memory::service::MemoryService`]

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
