use async_trait::async_trait;
use aws_sdk_athena::config::http::HttpResponse;
use aws_sdk_athena::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_athena::operation::create_named_query::CreateNamedQueryOutput;
use aws_sdk_athena::operation::get_named_query::GetNamedQueryOutput;
use aws_sdk_athena::operation::list_named_queries::ListNamedQueriesOutput;
use aws_sdk_athena::operation::start_query_execution::StartQueryExecutionOutput;
use aws_sdk_athena::types::QueryExecutionContext;
use model::catalog::{DdlStatement, QueryContext};
use model::query::SavedQuery;
use provider::ProviderErrorReason::MissingField;
use provider::ProviderOperation::{
    CreateSavedQuery, ExecuteDdl, GetSavedQuery, ListSavedQueries, UpdateSavedQuery,
};
use provider::{DdlExecution, ProviderError, ProviderOperation, QueryEngine};
use std::time::Duration;

mod execution;

/// Error codes which indicate Athena may accept the same request later
const TRANSIENT_ERROR_CODES: &[&str] = &[
    "InternalServerException",
    "TooManyRequestsException",
    "ThrottlingException",
];

const DEFAULT_EXECUTION_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_EXECUTION_MAX_POLLS: u32 = 120;

/// Athena backed catalog tables and named queries.
pub struct AthenaQueryEngine {
    athena_client: aws_sdk_athena::Client,
    // How often a started statement is checked for completion
    execution_poll_interval: Duration,
    execution_max_polls: u32,
}

impl AthenaQueryEngine {
    pub fn new(athena_client: aws_sdk_athena::Client) -> Self {
        AthenaQueryEngine {
            athena_client,
            execution_poll_interval: DEFAULT_EXECUTION_POLL_INTERVAL,
            execution_max_polls: DEFAULT_EXECUTION_MAX_POLLS,
        }
    }

    pub fn with_execution_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.execution_poll_interval = interval;
        self.execution_max_polls = max_polls.max(1);
        self
    }
}

#[async_trait]
impl QueryEngine for AthenaQueryEngine {
    async fn execute_ddl(
        &self,
        statement: &DdlStatement,
        context: &QueryContext,
    ) -> Result<DdlExecution, ProviderError> {
        let sql: String = statement.sql();

        let output: StartQueryExecutionOutput = self
            .athena_client
            .start_query_execution()
            .query_string(&sql)
            .work_group(&context.workgroup)
            .query_execution_context(
                QueryExecutionContext::builder()
                    .database(&context.database)
                    .build(),
            )
            .send()
            .await
            .map_err(|err| sdk_error(&context.workgroup, ExecuteDdl, err))?;

        let execution_id: &str = output.query_execution_id().ok_or_else(|| {
            ProviderError::new(&context.workgroup, ExecuteDdl, MissingField("QueryExecutionId"))
        })?;

        tracing::debug!(execution_id, "Started statement, waiting for completion");

        self.wait_for_execution(execution_id).await?;

        Ok(DdlExecution {
            execution_id: execution_id.to_string(),
        })
    }

    async fn list_saved_queries(&self, workgroup: &str) -> Result<Vec<String>, ProviderError> {
        let mut query_ids: Vec<String> = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output: ListNamedQueriesOutput = self
                .athena_client
                .list_named_queries()
                .work_group(workgroup)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| sdk_error(workgroup, ListSavedQueries, err))?;

            query_ids.extend(output.named_query_ids().iter().cloned());

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(query_ids)
    }

    async fn get_saved_query(&self, query_id: &str) -> Result<SavedQuery, ProviderError> {
        let output: GetNamedQueryOutput = self
            .athena_client
            .get_named_query()
            .named_query_id(query_id)
            .send()
            .await
            .map_err(|err| sdk_error(query_id, GetSavedQuery, err))?;

        let named_query = output
            .named_query()
            .ok_or_else(|| ProviderError::new(query_id, GetSavedQuery, MissingField("NamedQuery")))?;

        Ok(SavedQuery {
            name: named_query.name().to_string(),
            query_string: named_query.query_string().to_string(),
            database: named_query.database().to_string(),
            workgroup: named_query.work_group().unwrap_or_default().to_string(),
            description: named_query.description().map(str::to_string),
        })
    }

    async fn create_saved_query(&self, query: &SavedQuery) -> Result<String, ProviderError> {
        let output: CreateNamedQueryOutput = self
            .athena_client
            .create_named_query()
            .name(&query.name)
            .database(&query.database)
            .query_string(&query.query_string)
            .work_group(&query.workgroup)
            .set_description(query.description.clone())
            .send()
            .await
            .map_err(|err| sdk_error(&query.name, CreateSavedQuery, err))?;

        output
            .named_query_id()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::new(&query.name, CreateSavedQuery, MissingField("NamedQueryId")))
    }

    async fn update_saved_query(
        &self,
        query_id: &str,
        query: &SavedQuery,
    ) -> Result<(), ProviderError> {
        self.athena_client
            .update_named_query()
            .named_query_id(query_id)
            .name(&query.name)
            .query_string(&query.query_string)
            .set_description(query.description.clone())
            .send()
            .await
            .map_err(|err| sdk_error(query_id, UpdateSavedQuery, err))?;

        Ok(())
    }
}

/// Map an SDK failure onto the provider taxonomy.
/// Transport failures and throttling are transient, everything else is a rejection.
pub(crate) fn sdk_error<E>(
    resource: &str,
    operation: ProviderOperation,
    err: SdkError<E, HttpResponse>,
) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message: String = DisplayErrorContext(&err).to_string();

    let transient: bool = match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(_) => err
            .code()
            .is_some_and(|code| TRANSIENT_ERROR_CODES.contains(&code)),
        _ => false,
    };

    if transient {
        ProviderError::unavailable(resource, operation, message)
    } else {
        ProviderError::rejected(resource, operation, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_athena::operation::update_named_query::UpdateNamedQueryOutput;
    use aws_sdk_athena::types::NamedQuery;
    use aws_smithy_mocks::{mock, mock_client, Rule, RuleMode};

    fn named_query_output(id: &str, name: &str) -> GetNamedQueryOutput {
        GetNamedQueryOutput::builder()
            .named_query(
                NamedQuery::builder()
                    .named_query_id(id)
                    .name(name)
                    .database("analytics")
                    .query_string("SELECT 1")
                    .work_group("primary")
                    .build()
                    .unwrap(),
            )
            .build()
    }

    fn read_table_query() -> SavedQuery {
        SavedQuery {
            name: "read-table".to_string(),
            query_string: "SELECT * FROM analytics.orders_exported".to_string(),
            database: "analytics".to_string(),
            workgroup: "primary".to_string(),
            description: Some("DynamoDB Export Query".to_string()),
        }
    }

    #[tokio::test]
    async fn list_follows_next_token() {
        let first_page: Rule = mock!(aws_sdk_athena::Client::list_named_queries)
            .match_requests(|req| req.work_group() == Some("primary") && req.next_token().is_none())
            .then_output(|| {
                ListNamedQueriesOutput::builder()
                    .named_query_ids("q-1")
                    .named_query_ids("q-2")
                    .next_token("page-2")
                    .build()
            });
        let second_page: Rule = mock!(aws_sdk_athena::Client::list_named_queries)
            .match_requests(|req| req.next_token() == Some("page-2"))
            .then_output(|| ListNamedQueriesOutput::builder().named_query_ids("q-3").build());

        let engine: AthenaQueryEngine = AthenaQueryEngine::new(mock_client!(
            aws_sdk_athena,
            RuleMode::Sequential,
            [&first_page, &second_page]
        ));

        let ids: Vec<String> = engine
            .list_saved_queries("primary")
            .await
            .expect("Listing should succeed");

        assert_eq!(vec!["q-1", "q-2", "q-3"], ids);
        assert_eq!(1, second_page.num_calls());
    }

    #[tokio::test]
    async fn get_maps_named_query() {
        let get_rule: Rule = mock!(aws_sdk_athena::Client::get_named_query)
            .match_requests(|req| req.named_query_id() == Some("q-1"))
            .then_output(|| named_query_output("q-1", "read-table"));

        let engine: AthenaQueryEngine =
            AthenaQueryEngine::new(mock_client!(aws_sdk_athena, [&get_rule]));

        let query: SavedQuery = engine.get_saved_query("q-1").await.expect("Query should exist");

        assert_eq!("read-table", query.name);
        assert_eq!("SELECT 1", query.query_string);
        assert_eq!("primary", query.workgroup);
    }

    #[tokio::test]
    async fn create_sends_name_database_and_workgroup() {
        let create_rule: Rule = mock!(aws_sdk_athena::Client::create_named_query)
            .match_requests(|req| {
                req.name() == Some("read-table")
                    && req.database() == Some("analytics")
                    && req.work_group() == Some("primary")
                    && req.description() == Some("DynamoDB Export Query")
            })
            .then_output(|| CreateNamedQueryOutput::builder().named_query_id("q-9").build());

        let engine: AthenaQueryEngine =
            AthenaQueryEngine::new(mock_client!(aws_sdk_athena, [&create_rule]));

        let id: String = engine
            .create_saved_query(&read_table_query())
            .await
            .expect("Create should succeed");

        assert_eq!("q-9", id);
    }

    #[tokio::test]
    async fn update_targets_existing_id() {
        let update_rule: Rule = mock!(aws_sdk_athena::Client::update_named_query)
            .match_requests(|req| {
                req.named_query_id() == Some("q-1")
                    && req.name() == Some("read-table")
                    && req.query_string() == Some("SELECT * FROM analytics.orders_exported")
            })
            .then_output(|| UpdateNamedQueryOutput::builder().build());

        let engine: AthenaQueryEngine =
            AthenaQueryEngine::new(mock_client!(aws_sdk_athena, [&update_rule]));

        engine
            .update_saved_query("q-1", &read_table_query())
            .await
            .expect("Update should succeed");

        assert_eq!(1, update_rule.num_calls());
    }
}
