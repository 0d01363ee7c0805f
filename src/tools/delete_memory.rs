use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteMemoryParams {
    #[schemars(description = "ID of the note to delete")]
    pub id: String,

    #[schemars(description = "Project the note belongs to. Omit for 'global'.")]
    pub scope: Option<String>,
}
