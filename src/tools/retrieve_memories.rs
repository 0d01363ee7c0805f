//! MCP `retrieve_memories` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `retrieve_memories` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RetrieveMemoriesParams {
    /// Natural language query, compared by meaning rather than keywords.
    #[schemars(description = "Natural language query to rank notes against")]
    pub query: String,

    /// Project to search; `"*"` searches every project.
    #[schemars(
        description = "Project to search. Omit for 'global', use '*' to search all projects."
    )]
    pub scope: Option<String>,

    /// Only notes carrying all of these tags.
    #[schemars(description = "Only return notes that have all of these tags")]
    pub tags: Option<Vec<String>>,

    /// Maximum number of results (1–100). Defaults to 20.
    #[schemars(description = "Maximum number of results (1-100). Defaults to 20.")]
    pub limit: Option<usize>,
}
