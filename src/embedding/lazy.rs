//! Single-flight lazy initialization of the embedding provider.
//!
//! Loading the ONNX model is the only expensive startup step, so it is
//! deferred until the first embedding request or an explicit [`LazyEmbedder::warm_up`].
//! Every caller that arrives while the load is in flight awaits the same
//! attempt, and its outcome (including a failure) is kept for all later calls.

use std::sync::Arc;

use tokio::sync::OnceCell;

use super::{EmbeddingProvider, EMBEDDING_DIM};
use crate::config::EmbeddingConfig;
use crate::error::{MemoryError, MemoryResult};

type Loader = Arc<dyn Fn() -> anyhow::Result<Box<dyn EmbeddingProvider>> + Send + Sync>;

pub struct LazyEmbedder {
    loader: Loader,
    cell: OnceCell<Result<Arc<dyn EmbeddingProvider>, String>>,
}

impl LazyEmbedder {
    /// Wrap a provider constructor. Nothing is loaded until first use.
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn EmbeddingProvider>> + Send + Sync + 'static,
    {
        Self {
            loader: Arc::new(loader),
            cell: OnceCell::new(),
        }
    }

    /// Lazy handle over [`super::create_provider`] for the given config.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let config = config.clone();
        Self::new(move || super::create_provider(&config))
    }

    /// Handle around an already constructed provider.
    pub fn ready(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            loader: Arc::new(|| -> anyhow::Result<Box<dyn EmbeddingProvider>> {
                anyhow::bail!("provider was supplied pre-initialized")
            }),
            cell: OnceCell::new_with(Some(Ok(provider))),
        }
    }

    /// `true` once the provider has loaded successfully.
    pub fn is_ready(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }

    /// Start loading in the background without waiting for it.
    pub fn warm_up(self: &Arc<Self>) {
        if self.is_ready() {
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.provider().await {
                tracing::warn!(error = %e, "embedding warm-up failed");
            }
        });
    }

    /// Resolve the provider, loading it on the first call.
    pub async fn provider(&self) -> MemoryResult<Arc<dyn EmbeddingProvider>> {
        let outcome = self
            .cell
            .get_or_init(|| async {
                let loader = Arc::clone(&self.loader);
                tracing::info!("loading embedding model");
                match tokio::task::spawn_blocking(move || loader()).await {
                    Ok(Ok(provider)) => {
                        tracing::info!(dims = provider.dimensions(), "embedding provider ready");
                        Ok(Arc::from(provider))
                    }
                    Ok(Err(e)) => {
                        tracing::error!(error = %format!("{e:#}"), "embedding model failed to load");
                        Err(format!("{e:#}"))
                    }
                    Err(e) => Err(format!("model load task failed: {e}")),
                }
            })
            .await;

        outcome.clone().map_err(MemoryError::ModelUnavailable)
    }

    /// Embed one string.
    pub async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        let provider = self.provider().await?;
        let text = text.to_owned();
        let vector = tokio::task::spawn_blocking(move || provider.embed(&text))
            .await
            .map_err(|e| MemoryError::ModelUnavailable(format!("embedding task failed: {e}")))?
            .map_err(|e| MemoryError::ModelUnavailable(format!("embedding failed: {e:#}")))?;
        check_dims(&vector)?;
        Ok(vector)
    }

    /// Embed many strings at once. Results line up with `texts` by position.
    pub async fn embed_batch(&self, texts: Vec<String>) -> MemoryResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let provider = self.provider().await?;
        let expected = texts.len();
        let vectors = tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            provider.embed_batch(&refs)
        })
        .await
        .map_err(|e| MemoryError::ModelUnavailable(format!("embedding task failed: {e}")))?
        .map_err(|e| MemoryError::ModelUnavailable(format!("batch embedding failed: {e:#}")))?;

        if vectors.len() != expected {
            return Err(MemoryError::ModelUnavailable(format!(
                "provider returned {} vectors for {expected} inputs",
                vectors.len()
            )));
        }
        for v in &vectors {
            check_dims(v)?;
        }
        Ok(vectors)
    }
}

fn check_dims(vector: &[f32]) -> MemoryResult<()> {
    if vector.len() != EMBEDDING_DIM {
        return Err(MemoryError::ModelUnavailable(format!(
            "model produced {} dimensions, expected {EMBEDDING_DIM}",
            vector.len()
        )));
    }
    Ok(())
}
