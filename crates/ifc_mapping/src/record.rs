use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of user data: a key selecting a mapping rule and a loose bag of
/// named values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(default)]
    pub user_key: String,
    #[serde(default)]
    pub user_args: Map<String, Value>,
}

impl RawRecord {
    pub fn new(user_key: impl Into<String>, user_args: Map<String, Value>) -> Self {
        Self {
            user_key: user_key.into(),
            user_args,
        }
    }

    /// Parses a target data file: a JSON array of records.
    pub fn parse_batch(data: &str) -> Result<Vec<RawRecord>, serde_json::Error> {
        serde_json::from_str(data)
    }
}
