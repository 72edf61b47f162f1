use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub mod catalog;
pub mod env;
pub mod export;
pub mod query;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// This id is used for tracing and the workflow report.
pub trait InvocationId {
    fn invocation_id(&self) -> &str;
}

/// Steps of the export workflow, in execution order.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStep {
    Exporting,
    Polling,
    TableRefresh,
    QueryPublish,
}

impl Display for WorkflowStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name: &str = match self {
            WorkflowStep::Exporting => "Exporting",
            WorkflowStep::Polling => "Polling",
            WorkflowStep::TableRefresh => "TableRefresh",
            WorkflowStep::QueryPublish => "QueryPublish",
        };

        f.write_str(name)
    }
}

/// Trims surrounding whitespace and turns hyphens into underscores, since hyphens
/// are not valid in unquoted table or database names. Case is left as given.
pub fn sanitize_identifier(name: &str) -> String {
    name.trim().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_hyphens() {
        assert_eq!("orders_exported", sanitize_identifier("orders-exported"));
        assert_eq!("ddb_exported_table", sanitize_identifier(" ddb_exported_table "));
        assert_eq!("Orders_2024", sanitize_identifier("Orders-2024"));
    }

    #[test]
    fn workflow_step_serializes_screaming_case() {
        let json: String = serde_json::to_string(&WorkflowStep::TableRefresh).unwrap();

        assert_eq!("\"TABLE_REFRESH\"", json);
    }
}
