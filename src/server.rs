//! MCP server startup for stdio and Streamable HTTP transports.
//!
//! Both entry points open the database, build the lazy embedder and the
//! [`MemoryService`], then hand a [`MemoriaTools`] handler to `rmcp`.

use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::Arc;

use crate::tools::MemoriaTools;
use memoria::config::MemoriaConfig;
use memoria::db;
use memoria::embedding::LazyEmbedder;
use memoria::memory::service::MemoryService;
use memoria::memory::store::pending_embeddings;

/// Open the DB, warn on model drift, and build the service. The model itself
/// is not loaded here; with `warm_up` set its load starts in the background.
fn build_service(config: &MemoriaConfig) -> Result<MemoryService> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    if let Ok(Some(stored_model)) = db::migrations::get_embedding_model(&conn) {
        if stored_model != config.embedding.model {
            tracing::warn!(
                stored = %stored_model,
                configured = %config.embedding.model,
                "embedding model changed, run `memoria re-embed --all` to update all vectors"
            );
        }
    }

    let legacy = pending_embeddings(&conn, false)?.len();
    if legacy > 0 {
        tracing::warn!(
            rows = legacy,
            "memories without embeddings are skipped by retrieval, run `memoria re-embed`"
        );
    }

    let embedder = Arc::new(LazyEmbedder::from_config(&config.embedding));
    if config.embedding.warm_up {
        embedder.warm_up();
    }

    Ok(MemoryService::new(conn, embedder, config.retrieval.clone()))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: MemoriaConfig) -> Result<()> {
    tracing::info!("starting memoria MCP server on stdio");

    let service = build_service(&config)?;
    let tools = MemoriaTools::new(service);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP transport.
pub async fn serve_http(config: MemoriaConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting memoria MCP server on HTTP");

    let service = build_service(&config)?;

    let mcp = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(MemoriaTools::new(service.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", mcp);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
