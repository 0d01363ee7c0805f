//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use memoria::config::MemoriaConfig;
use memoria::db;
use memoria::db::migrations::get_embedding_dim;
use memoria::embedding::local::model_files;
use memoria::memory::store::scope_summaries;

pub async fn doctor(config: &MemoriaConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `memoria serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("memoria Health Report");
    println!("=====================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();

    let (model_path, tokenizer_path) = model_files(&config.embedding);
    println!("Embedding model:");
    println!("  Stored:          {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {}", config.embedding.model);
    if let Some(dim) = get_embedding_dim(&conn)? {
        println!("  Dimensions:      {dim}");
    }
    match &report.embedding_model {
        Some(stored) if stored != &config.embedding.model => {
            println!("  WARNING: model mismatch! Run `memoria re-embed --all` to update vectors.");
        }
        Some(_) => println!("  Status:          OK (match)"),
        None => {}
    }
    let files_ok = model_path.exists() && tokenizer_path.exists();
    println!(
        "  Files:           {}",
        if files_ok { "present" } else { "missing (run `memoria model download`)" }
    );
    println!();

    println!("Memories:          {}", report.memory_count);
    if report.unembedded_count > 0 {
        println!(
            "  Without embedding: {} (not searchable; run `memoria re-embed`)",
            report.unembedded_count
        );
    }
    println!("Projects:          {}", report.scope_count);
    for summary in scope_summaries(&conn)? {
        println!(
            "  {:<24} {:>6}  last updated {}",
            summary.scope, summary.count, summary.last_updated
        );
    }
    println!();

    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery: restore from a backup, e.g. cp backup.db ~/.memoria/memory.db");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_picks_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
