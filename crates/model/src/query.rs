use serde::{Deserialize, Serialize};

pub const SAVED_QUERY_DESCRIPTION: &str = "DynamoDB Export Query";

/// A named query stored in a query engine workgroup.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SavedQuery {
    pub name: String,
    pub query_string: String,
    pub database: String,
    pub workgroup: String,
    pub description: Option<String>,
}

/// Raw query text with placeholder tokens, registered under a stable name.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    pub name: String,
    pub body: String,
}

impl QueryTemplate {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        QueryTemplate {
            name: name.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishAction {
    Created,
    Updated,
}

/// Result of registering one saved query.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PublishedQuery {
    pub name: String,
    pub query_id: String,
    pub action: PublishAction,
}
