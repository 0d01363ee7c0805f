pub mod delete_memory;
pub mod list_memories;
pub mod rename_project;
pub mod retrieve_memories;
pub mod store_memory;

use delete_memory::DeleteMemoryParams;
use list_memories::ListMemoriesParams;
use rename_project::RenameProjectParams;
use retrieve_memories::RetrieveMemoriesParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use store_memory::StoreMemoryParams;

use memoria::error::MemoryError;
use memoria::memory::service::MemoryService;
use memoria::memory::types::{ListRequest, NewEntry, RetrieveRequest};

/// The memoria MCP tool handler. Wraps the [`MemoryService`] and exposes it
/// through the `#[tool_router]` macro. Tool results are JSON strings.
#[derive(Clone)]
pub struct MemoriaTools {
    tool_router: ToolRouter<Self>,
    service: MemoryService,
}

fn tool_error(e: MemoryError) -> String {
    serde_json::json!({ "error": e.kind(), "message": e.to_string() }).to_string()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

#[tool_router]
impl MemoriaTools {
    pub fn new(service: MemoryService) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service,
        }
    }

    /// Store a note, or update the note with the same key in that project.
    #[tool(description = "Store a memory note. Give it a key to make later stores with the same key update it instead of adding a duplicate. Omit scope for the global bucket or pass a project name.")]
    async fn store_memory(
        &self,
        Parameters(params): Parameters<StoreMemoryParams>,
    ) -> Result<String, String> {
        tracing::info!(
            content_len = params.content.len(),
            scope = params.scope.as_deref().unwrap_or("global"),
            "store_memory called"
        );

        let new = NewEntry {
            id: params
                .id
                .unwrap_or_else(|| uuid::Uuid::now_v7().to_string()),
            content: params.content,
            key: params.key,
            tags: params.tags.unwrap_or_default(),
        };

        let entry = self
            .service
            .store(params.scope.as_deref(), new)
            .await
            .map_err(tool_error)?;
        to_json(&entry)
    }

    /// Rank notes by meaning against a query.
    #[tool(description = "Search memory notes by meaning. Returns the closest notes first. Use scope '*' to search every project.")]
    async fn retrieve_memories(
        &self,
        Parameters(params): Parameters<RetrieveMemoriesParams>,
    ) -> Result<String, String> {
        tracing::info!(query = %params.query, "retrieve_memories called");

        let results = self
            .service
            .retrieve(RetrieveRequest {
                scope: params.scope,
                query: params.query,
                tags: params.tags.unwrap_or_default(),
                limit: params.limit,
            })
            .await
            .map_err(tool_error)?;

        to_json(&serde_json::json!({ "total": results.len(), "results": results }))
    }

    #[tool(description = "List memory notes in a project, most recently updated first. Optionally filter by tags.")]
    async fn list_memories(
        &self,
        Parameters(params): Parameters<ListMemoriesParams>,
    ) -> Result<String, String> {
        let entries = self
            .service
            .list(ListRequest {
                scope: params.scope,
                tags: params.tags.unwrap_or_default(),
            })
            .await
            .map_err(tool_error)?;

        to_json(&serde_json::json!({ "total": entries.len(), "memories": entries }))
    }

    #[tool(description = "Delete a memory note by id from the given project.")]
    async fn delete_memory(
        &self,
        Parameters(params): Parameters<DeleteMemoryParams>,
    ) -> Result<String, String> {
        let deleted = self
            .service
            .delete(params.scope.as_deref(), &params.id)
            .await
            .map_err(tool_error)?;

        if !deleted {
            return Err(tool_error(MemoryError::NotFound(format!(
                "no memory '{}' in that scope",
                params.id
            ))));
        }
        to_json(&serde_json::json!({ "deleted": true, "id": params.id }))
    }

    #[tool(description = "Rename a project, moving all of its notes. Fails if the new name already has notes.")]
    async fn rename_project(
        &self,
        Parameters(params): Parameters<RenameProjectParams>,
    ) -> Result<String, String> {
        let renamed = self
            .service
            .rename_project(&params.old_name, &params.new_name)
            .await
            .map_err(tool_error)?;

        if !renamed {
            return Err(tool_error(MemoryError::NotFound(format!(
                "project '{}' has no notes",
                params.old_name
            ))));
        }
        to_json(&serde_json::json!({
            "renamed": true,
            "from": params.old_name,
            "to": params.new_name,
        }))
    }

    #[tool(description = "List every project that has notes, with note counts.")]
    async fn list_projects(&self) -> Result<String, String> {
        let scopes = self.service.scopes().await.map_err(tool_error)?;
        to_json(&serde_json::json!({ "projects": scopes }))
    }
}

#[tool_handler]
impl ServerHandler for MemoriaTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "memoria keeps notes across sessions. Use store_memory to save a note \
                 (with a key to keep it updatable), retrieve_memories to search by meaning, \
                 and list_memories to browse a project."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
