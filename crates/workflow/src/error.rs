use model::WorkflowStep;
use provider::ProviderError;
use std::fmt::{Display, Formatter};

/// Why a workflow run ended in `Failed`.
///
/// Every variant keeps the provider error or status that caused it.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("export could not be started: {0}")]
    TriggerRejected(#[source] ProviderError),

    #[error("export status could not be read: {0}")]
    PollFailed(#[source] ProviderError),

    #[error("export {export_arn} still in progress after {attempts} polls")]
    PollExhausted { export_arn: String, attempts: u32 },

    #[error("export {export_arn} still in progress after {attempts} polls, waiting {next_wait:?} more would pass the invocation deadline")]
    DeadlineReached {
        export_arn: String,
        attempts: u32,
        next_wait: std::time::Duration,
    },

    #[error("export {export_arn} failed: {reason}")]
    ExportFailed { export_arn: String, reason: String },

    #[error("export {export_arn} reported unexpected status {status}")]
    UnexpectedStatus { export_arn: String, status: String },

    #[error("catalog table {stage} failed: {source}")]
    TableRefresh {
        stage: DdlStage,
        #[source]
        source: ProviderError,
    },

    #[error("saved query '{query}' failed after publishing {published:?}: {source}")]
    QueryPublish {
        query: String,
        // Queries already created or updated during this run
        published: Vec<String>,
        #[source]
        source: ProviderError,
    },
}

impl WorkflowError {
    pub fn step(&self) -> WorkflowStep {
        match self {
            WorkflowError::TriggerRejected(_) => WorkflowStep::Exporting,
            WorkflowError::PollFailed(_)
            | WorkflowError::PollExhausted { .. }
            | WorkflowError::DeadlineReached { .. }
            | WorkflowError::ExportFailed { .. }
            | WorkflowError::UnexpectedStatus { .. } => WorkflowStep::Polling,
            WorkflowError::TableRefresh { .. } => WorkflowStep::TableRefresh,
            WorkflowError::QueryPublish { .. } => WorkflowStep::QueryPublish,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlStage {
    Drop,
    Create,
}

impl Display for DdlStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DdlStage::Drop => f.write_str("drop"),
            DdlStage::Create => f.write_str("create"),
        }
    }
}
