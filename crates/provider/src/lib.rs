use async_trait::async_trait;
use model::catalog::{DdlStatement, QueryContext};
use model::export::{ExportDescription, ExportHandle};
use model::query::SavedQuery;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// The managed store which can export itself to object storage.
///
/// Starting an export is not idempotent: every call schedules a new export.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    async fn start_export(
        &self,
        store_arn: &str,
        bucket: &str,
        prefix: &str,
    ) -> Result<ExportHandle, ProviderError>;

    async fn describe_export(&self, export_arn: &str) -> Result<ExportDescription, ProviderError>;
}

/// The query engine holding catalog tables and saved queries.
///
/// Saved queries can only be addressed by id, so lookups by name
/// list the workgroup and fetch each entry.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Run a statement and wait until the engine reports it finished.
    async fn execute_ddl(
        &self,
        statement: &DdlStatement,
        context: &QueryContext,
    ) -> Result<DdlExecution, ProviderError>;

    /// Ids of every saved query in the workgroup, across all pages.
    async fn list_saved_queries(&self, workgroup: &str) -> Result<Vec<String>, ProviderError>;

    async fn get_saved_query(&self, query_id: &str) -> Result<SavedQuery, ProviderError>;

    async fn create_saved_query(&self, query: &SavedQuery) -> Result<String, ProviderError>;

    async fn update_saved_query(
        &self,
        query_id: &str,
        query: &SavedQuery,
    ) -> Result<(), ProviderError>;
}

/// A finished statement execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlExecution {
    pub execution_id: String,
}

/// Errors from a provider call.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed for '{resource}': {reason}")]
pub struct ProviderError {
    pub resource: String,

    pub operation: ProviderOperation,
    pub reason: ProviderErrorReason,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderErrorReason {
    // The provider refused the request, retrying won't help
    #[error("request rejected: {0}")]
    Rejected(String),
    // The provider could not be reached or is throttling
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    // A field the workflow depends on was absent from the response
    #[error("response missing {0}")]
    MissingField(&'static str),
    #[error("no response within {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOperation {
    StartExport,
    DescribeExport,
    ExecuteDdl,
    ListSavedQueries,
    GetSavedQuery,
    CreateSavedQuery,
    UpdateSavedQuery,
}

impl Display for ProviderOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name: &str = match self {
            ProviderOperation::StartExport => "StartExport",
            ProviderOperation::DescribeExport => "DescribeExport",
            ProviderOperation::ExecuteDdl => "ExecuteDdl",
            ProviderOperation::ListSavedQueries => "ListSavedQueries",
            ProviderOperation::GetSavedQuery => "GetSavedQuery",
            ProviderOperation::CreateSavedQuery => "CreateSavedQuery",
            ProviderOperation::UpdateSavedQuery => "UpdateSavedQuery",
        };

        f.write_str(name)
    }
}

impl ProviderError {
    pub fn new(
        resource: impl Into<String>,
        operation: ProviderOperation,
        reason: ProviderErrorReason,
    ) -> Self {
        ProviderError {
            resource: resource.into(),
            operation,
            reason,
        }
    }

    pub fn rejected(
        resource: impl Into<String>,
        operation: ProviderOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(resource, operation, ProviderErrorReason::Rejected(message.into()))
    }

    pub fn unavailable(
        resource: impl Into<String>,
        operation: ProviderOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(resource, operation, ProviderErrorReason::Unavailable(message.into()))
    }

    /// Only an unavailable provider may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self.reason, ProviderErrorReason::Unavailable(_))
    }
}
