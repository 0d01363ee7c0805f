//! CLI `re-embed` command: fill in missing embeddings, or regenerate all of them.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use memoria::config::MemoriaConfig;
use memoria::db;
use memoria::embedding::LazyEmbedder;
use memoria::memory::service::MemoryService;
use memoria::memory::store::pending_embeddings;

const BATCH_SIZE: usize = 32;

pub async fn re_embed(config: &MemoriaConfig, all: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path).context("failed to open database")?;

    let total = pending_embeddings(&conn, all)?.len();
    if total == 0 {
        println!("Nothing to embed.");
        return Ok(());
    }

    let embedder = Arc::new(LazyEmbedder::from_config(&config.embedding));
    let service = MemoryService::new(conn, embedder, config.retrieval.clone());

    println!("Embedding {total} memories with model '{}'...", config.embedding.model);

    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("  {bar:40.cyan/blue} {pos}/{len} ({eta})") {
        pb.set_style(style.progress_chars("##-"));
    }

    let updated = service
        .backfill_embeddings(BATCH_SIZE, all, |n| pb.inc(n as u64))
        .await
        .context("embedding failed")?;
    pb.finish_and_clear();

    if all {
        service.set_embedding_model(&config.embedding.model).await?;
    }

    println!("Embedded {updated} memories with model '{}'.", config.embedding.model);
    Ok(())
}
