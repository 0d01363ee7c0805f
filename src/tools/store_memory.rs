use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreMemoryParams {
    #[schemars(description = "The text of the note to remember")]
    pub content: String,

    #[schemars(
        description = "Optional short identifier. Storing again with the same key in the same scope updates that note instead of adding a new one."
    )]
    pub key: Option<String>,

    #[schemars(description = "Optional labels for filtering (case-insensitive)")]
    pub tags: Option<Vec<String>>,

    #[schemars(
        description = "Project name to store under. Omit for the shared 'global' bucket. '*' is not allowed."
    )]
    pub scope: Option<String>,

    #[schemars(description = "Optional explicit id for a new note. Generated when omitted.")]
    pub id: Option<String>,
}
