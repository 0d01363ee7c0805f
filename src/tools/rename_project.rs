//! MCP `rename_project` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `rename_project` MCP tool.
///
/// Moves every note from one project to another. Fails if the target project
/// already has notes, since projects are never merged.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RenameProjectParams {
    #[schemars(description = "Current project name")]
    pub old_name: String,

    #[schemars(description = "New project name. Must not already contain notes.")]
    pub new_name: String,
}
