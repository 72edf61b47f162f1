use crate::context::WorkflowContext;
use lambda_runtime::tracing;
use model::export::{ExportDescription, ExportHandle, ExportStatus};
use provider::{ProviderError, ProviderOperation, StoreProvider};
use std::sync::Arc;

/// Starts a point in time export of the store to object storage.
pub struct ExportTrigger {
    store: Arc<dyn StoreProvider>,
    store_arn: String,
    bucket: String,
    prefix: String,
}

impl ExportTrigger {
    pub fn new(
        store: Arc<dyn StoreProvider>,
        store_arn: impl Into<String>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        ExportTrigger {
            store,
            store_arn: store_arn.into(),
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Every call schedules a new export, so this is never retried.
    pub async fn trigger(&self, ctx: &WorkflowContext) -> Result<ExportHandle, ProviderError> {
        let handle: ExportHandle = ctx
            .call(
                &self.store_arn,
                ProviderOperation::StartExport,
                self.store
                    .start_export(&self.store_arn, &self.bucket, &self.prefix),
            )
            .await?;

        tracing::info!(export_arn = handle.export_arn, export_id = handle.export_id, "Export started");

        Ok(handle)
    }
}

/// Outcome of a single status read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The handle passed in, unchanged
    Completed(ExportHandle),
    /// Still running, the only outcome worth polling again
    InProgress,
    /// Failed or reported a status the workflow does not understand
    Failed(ExportDescription),
}

pub struct ExportPoller {
    store: Arc<dyn StoreProvider>,
}

impl ExportPoller {
    pub fn new(store: Arc<dyn StoreProvider>) -> Self {
        ExportPoller { store }
    }

    pub async fn poll(
        &self,
        ctx: &WorkflowContext,
        handle: &ExportHandle,
    ) -> Result<PollOutcome, ProviderError> {
        let description: ExportDescription = ctx
            .call(
                &handle.export_arn,
                ProviderOperation::DescribeExport,
                self.store.describe_export(&handle.export_arn),
            )
            .await?;

        tracing::debug!(status = description.raw_status, "Export status");

        Ok(match description.status {
            ExportStatus::Completed => PollOutcome::Completed(handle.clone()),
            ExportStatus::InProgress => PollOutcome::InProgress,
            ExportStatus::Failed | ExportStatus::Unknown => PollOutcome::Failed(description),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider_in_memory::InMemoryStoreProvider;
    use std::time::Duration;

    const STORE_ARN: &str = "arn:aws:dynamodb:eu-west-1:123456789012:table/orders";

    fn ctx() -> WorkflowContext {
        WorkflowContext::new("invocation", Duration::from_secs(120))
    }

    #[tokio::test]
    async fn trigger_returns_handle_with_last_segment_id() {
        let store: Arc<InMemoryStoreProvider> = Arc::new(InMemoryStoreProvider::default());
        let trigger: ExportTrigger = ExportTrigger::new(store.clone(), STORE_ARN, "analytics-bucket", "exports");

        let handle: ExportHandle = trigger.trigger(&ctx()).await.unwrap();

        assert_eq!(handle.export_arn.rsplit('/').next(), Some(handle.export_id.as_str()));
        assert_eq!(vec![handle], store.exports());
    }

    #[tokio::test]
    async fn trigger_rejection_is_returned() {
        let store: Arc<InMemoryStoreProvider> =
            Arc::new(InMemoryStoreProvider::default().rejecting_exports("PointInTimeRecoveryUnavailableException"));
        let trigger: ExportTrigger = ExportTrigger::new(store.clone(), STORE_ARN, "analytics-bucket", "exports");

        let err: ProviderError = trigger.trigger(&ctx()).await.unwrap_err();

        assert!(!err.is_transient());
        assert!(store.exports().is_empty());
    }

    #[tokio::test]
    async fn poll_maps_each_status() {
        let store: Arc<InMemoryStoreProvider> = Arc::new(InMemoryStoreProvider::with_statuses([
            "IN_PROGRESS",
            "COMPLETED",
            "FAILED",
            "CANCELLING",
        ]));
        let handle: ExportHandle = ExportTrigger::new(store.clone(), STORE_ARN, "analytics-bucket", "exports")
            .trigger(&ctx())
            .await
            .unwrap();
        let poller: ExportPoller = ExportPoller::new(store.clone());

        assert_eq!(PollOutcome::InProgress, poller.poll(&ctx(), &handle).await.unwrap());
        assert_eq!(PollOutcome::Completed(handle.clone()), poller.poll(&ctx(), &handle).await.unwrap());
        assert!(matches!(
            poller.poll(&ctx(), &handle).await.unwrap(),
            PollOutcome::Failed(ExportDescription { status: ExportStatus::Failed, .. })
        ));
        assert!(matches!(
            poller.poll(&ctx(), &handle).await.unwrap(),
            PollOutcome::Failed(ExportDescription { status: ExportStatus::Unknown, raw_status, .. }) if raw_status == "CANCELLING"
        ));
    }

    #[tokio::test]
    async fn describe_errors_are_returned() {
        let store: Arc<InMemoryStoreProvider> = Arc::new(InMemoryStoreProvider::default());
        let poller: ExportPoller = ExportPoller::new(store);
        let handle: ExportHandle = ExportHandle::from_arn(format!("{STORE_ARN}/export/missing")).unwrap();

        assert!(poller.poll(&ctx(), &handle).await.is_err());
    }
}
