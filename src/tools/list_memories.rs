use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListMemoriesParams {
    #[schemars(
        description = "Project to list. Omit for 'global', use '*' to list all projects."
    )]
    pub scope: Option<String>,

    #[schemars(description = "Only list notes that have all of these tags")]
    pub tags: Option<Vec<String>>,
}
