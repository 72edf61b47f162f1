use lambda_runtime::tracing;
use model::InvocationId;
use provider::{ProviderError, ProviderErrorReason, ProviderOperation};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Per-run state shared by every step of a workflow invocation.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    invocation_id: String,
    step_timeout: Duration,
    deadline: Option<Instant>,
}

impl WorkflowContext {
    pub fn new(invocation_id: impl Into<String>, step_timeout: Duration) -> Self {
        WorkflowContext {
            invocation_id: invocation_id.into(),
            step_timeout,
            deadline: None,
        }
    }

    /// Bound the run by the invocation deadline, if the host imposes one.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether waiting `wait` still leaves one step timeout before the deadline.
    pub fn can_wait(&self, wait: Duration) -> bool {
        match self.deadline {
            None => true,
            Some(deadline) => Instant::now() + wait + self.step_timeout() <= deadline,
        }
    }

    /// Call a provider, failing the call once the step timeout elapses.
    /// The timed out request is dropped, not cancelled at the provider.
    pub async fn call<T, Fut>(
        &self,
        resource: &str,
        operation: ProviderOperation,
        call: Fut,
    ) -> Result<T, ProviderError>
    where
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let invocation_id: &str = self.invocation_id();
        let timeout: Duration = self.step_timeout();
        tracing::debug!(invocation_id, %operation, resource, "Provider call");

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(invocation_id, %operation, resource, ?timeout, "Provider call timed out");

                Err(ProviderError::new(
                    resource,
                    operation,
                    ProviderErrorReason::TimedOut(timeout),
                ))
            }
        }
    }
}

impl InvocationId for WorkflowContext {
    fn invocation_id(&self) -> &str {
        &self.invocation_id
    }
}
