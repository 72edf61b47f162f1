use crate::{sdk_error, AthenaQueryEngine};
use aws_sdk_athena::operation::get_query_execution::GetQueryExecutionOutput;
use aws_sdk_athena::types::{QueryExecutionState, QueryExecutionStatus};
use provider::ProviderErrorReason::{MissingField, TimedOut};
use provider::ProviderOperation::ExecuteDdl;
use provider::ProviderError;
use std::time::Duration;

impl AthenaQueryEngine {
    /// Poll a started execution until Athena reports a terminal state.
    ///
    /// Transient failures reading the status are retried against the same execution
    /// within the poll budget, so an accepted statement is never submitted twice.
    pub(crate) async fn wait_for_execution(&self, execution_id: &str) -> Result<(), ProviderError> {
        for _ in 0..self.execution_max_polls {
            let output: GetQueryExecutionOutput = match self
                .athena_client
                .get_query_execution()
                .query_execution_id(execution_id)
                .send()
                .await
            {
                Ok(output) => output,
                Err(err) => {
                    let err: ProviderError = sdk_error(execution_id, ExecuteDdl, err);
                    if !err.is_transient() {
                        return Err(err);
                    }

                    tracing::warn!(execution_id, error = %err, "Statement status unavailable, polling again");
                    tokio::time::sleep(self.execution_poll_interval).await;
                    continue;
                }
            };

            let status: &QueryExecutionStatus = output
                .query_execution()
                .and_then(|execution| execution.status())
                .ok_or_else(|| ProviderError::new(execution_id, ExecuteDdl, MissingField("Status")))?;

            match status.state() {
                Some(QueryExecutionState::Succeeded) => return Ok(()),
                Some(QueryExecutionState::Failed) | Some(QueryExecutionState::Cancelled) => {
                    return Err(execution_failure(execution_id, status));
                }
                Some(QueryExecutionState::Queued) | Some(QueryExecutionState::Running) | None => {
                    tracing::debug!(execution_id, "Statement still running");
                }
                Some(other) => {
                    return Err(ProviderError::rejected(
                        execution_id,
                        ExecuteDdl,
                        format!("unexpected execution state {}", other.as_str()),
                    ));
                }
            }

            tokio::time::sleep(self.execution_poll_interval).await;
        }

        let waited: Duration = self
            .execution_poll_interval
            .saturating_mul(self.execution_max_polls);

        Err(ProviderError::new(execution_id, ExecuteDdl, TimedOut(waited)))
    }
}

fn execution_failure(execution_id: &str, status: &QueryExecutionStatus) -> ProviderError {
    let state: &str = status.state().map(|state| state.as_str()).unwrap_or("UNKNOWN");
    let reason: &str = status
        .state_change_reason()
        .or_else(|| status.athena_error().and_then(|err| err.error_message()))
        .unwrap_or("no reason reported");
    let message: String = format!("statement {state}: {reason}");

    // Athena flags failures caused by its own capacity as retryable
    if status.athena_error().is_some_and(|err| err.retryable()) {
        ProviderError::unavailable(execution_id, ExecuteDdl, message)
    } else {
        ProviderError::rejected(execution_id, ExecuteDdl, message)
    }
}
