use crate::runtime::{ExportReport, WorkflowRuntime};
use lambda_runtime::{tracing, LambdaEvent};
use model::Error;
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Lambda handler running one workflow per invocation.
///
/// The payload is ignored so scheduled events and manual invokes behave the same.
/// A failed run is returned as an error so the invocation is reported as failed.
///
/// ```no_compile
/// use lambda_runtime::{service_fn, LambdaEvent};
/// use serde_json::Value;
/// use workflow::{handle_event, WorkflowRuntime};
///
/// let runtime: WorkflowRuntime = WorkflowRuntime::new(config, store, engine);
/// lambda_runtime::run(service_fn(async |event: LambdaEvent<Value>| {
///     handle_event(&runtime, event).await
/// }))
/// .await?;
/// ```
pub async fn handle_event(
    runtime: &WorkflowRuntime,
    event: LambdaEvent<Value>,
) -> Result<ExportReport, Error> {
    let invocation_id: String = event.context.request_id.clone();
    tracing::debug!(invocation_id, payload = %event.payload, "Received workflow event");

    let deadline: Option<Instant> = invocation_deadline(event.context.deadline, SystemTime::now());
    let report: ExportReport = runtime
        .run_with_deadline(&invocation_id, deadline)
        .await
        .into_result()?;

    Ok(report)
}

// The runtime reports the deadline in epoch milliseconds, 0 when there is none
fn invocation_deadline(deadline_ms: u64, now: SystemTime) -> Option<Instant> {
    if deadline_ms == 0 {
        return None;
    }

    let now_ms: u64 = now
        .duration_since(UNIX_EPOCH)
        .map(|since_epoch| since_epoch.as_millis() as u64)
        .unwrap_or_default();

    Some(Instant::now() + Duration::from_millis(deadline_ms.saturating_sub(now_ms)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use crate::error::WorkflowError;
    use lambda_runtime::Context;
    use provider_in_memory::{InMemoryQueryEngine, InMemoryStoreProvider};
    use std::sync::Arc;
    use test_utils::end_to_end_env;

    fn event(request_id: &str) -> LambdaEvent<Value> {
        event_with_deadline(request_id, 0)
    }

    fn event_with_deadline(request_id: &str, deadline_ms: u64) -> LambdaEvent<Value> {
        let mut context: Context = Context::default();
        context.request_id = request_id.to_string();
        context.deadline = deadline_ms;

        LambdaEvent::new(serde_json::json!({ "source": "aws.events" }), context)
    }

    fn runtime(store: InMemoryStoreProvider) -> WorkflowRuntime {
        let vars = end_to_end_env();
        let config: WorkflowConfig = WorkflowConfig::from_lookup(|name| vars.get(name).cloned()).unwrap();

        WorkflowRuntime::new(config, Arc::new(store), Arc::new(InMemoryQueryEngine::default()))
    }

    #[tokio::test]
    async fn request_id_becomes_invocation_id() {
        let runtime: WorkflowRuntime = runtime(InMemoryStoreProvider::with_statuses(["COMPLETED"]));

        let report: ExportReport = handle_event(&runtime, event("request-1")).await.unwrap();

        assert_eq!("request-1", report.invocation_id);
        assert_eq!(1, report.published_queries.len());
    }

    #[tokio::test]
    async fn failed_run_is_an_error() {
        let runtime: WorkflowRuntime = runtime(InMemoryStoreProvider::with_statuses(["FAILED"]));

        let err: Error = handle_event(&runtime, event("request-1")).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<WorkflowError>(),
            Some(WorkflowError::ExportFailed { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn invocation_deadline_bounds_polling() {
        let mut statuses: Vec<&str> = vec!["IN_PROGRESS"; 6];
        statuses.push("COMPLETED");
        let runtime: WorkflowRuntime = runtime(InMemoryStoreProvider::with_statuses(statuses));

        let now_ms: u64 = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64;
        let started: Instant = Instant::now();
        let err: Error = handle_event(&runtime, event_with_deadline("request-1", now_ms + 900_000))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(900));
        assert!(matches!(
            err.downcast_ref::<WorkflowError>(),
            Some(WorkflowError::DeadlineReached { attempts: 5, .. })
        ));
    }

    #[test]
    fn missing_deadline_is_unbounded() {
        assert_eq!(None, invocation_deadline(0, SystemTime::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn past_deadline_is_now() {
        let now: SystemTime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        assert_eq!(Some(Instant::now()), invocation_deadline(1_000, now));
        assert_eq!(
            Some(Instant::now() + Duration::from_secs(60)),
            invocation_deadline(1_700_000_060_000, now)
        );
    }
}
