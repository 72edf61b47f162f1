use aws_sdk_athena::operation::create_named_query::CreateNamedQueryOutput;
use aws_sdk_athena::operation::get_query_execution::GetQueryExecutionOutput;
use aws_sdk_athena::operation::list_named_queries::ListNamedQueriesOutput;
use aws_sdk_athena::operation::start_query_execution::StartQueryExecutionOutput;
use aws_sdk_athena::types::{QueryExecution, QueryExecutionState, QueryExecutionStatus};
use aws_sdk_dynamodb::operation::describe_export::DescribeExportOutput;
use aws_sdk_dynamodb::operation::export_table_to_point_in_time::ExportTableToPointInTimeOutput;
use aws_sdk_dynamodb::types::{ExportDescription, ExportStatus};
use aws_smithy_mocks::{mock, mock_client, Rule, RuleMode};
use model::env::*;
use std::collections::HashMap;
use std::env;

/// Test resource values
pub const TEST_STORE_ARN: &str = "arn:aws:dynamodb:eu-west-1:123456789012:table/orders";
pub const TEST_EXPORT_ID: &str = "01695810463958-a1b2c3d4";
pub const TEST_EXPORT_ARN: &str =
    "arn:aws:dynamodb:eu-west-1:123456789012:table/orders/export/01695810463958-a1b2c3d4";
pub const TEST_BUCKET: &str = "analytics-bucket";
pub const TEST_DATABASE: &str = "analytics";
pub const TEST_WORKGROUP: &str = "primary";
pub const TEST_TABLE: &str = "orders_exported";
pub const TEST_READ_TABLE_QUERY_NAME: &str = "read-table";
pub const TEST_READ_TABLE_QUERY: &str =
    "-- export ddb-export-id\nSELECT Item.orderId.S AS order_id FROM \"db_name\".\"table_name\";";

/// Only the variables without a default
pub fn default_env() -> HashMap<String, String> {
    [
        (DYNAMO_DB_TABLE_ARN, TEST_STORE_ARN),
        (S3_BUCKET_NAME, TEST_BUCKET),
        (GLUE_DATABASE_NAME, TEST_DATABASE),
        (ATHENA_WORKGROUP_NAME, TEST_WORKGROUP),
        (ATHENA_QUERY_STRING_READ_TABLE, TEST_READ_TABLE_QUERY),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect()
}

/// Exports land directly under `exports/` in the test bucket
pub fn end_to_end_env() -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = default_env();
    vars.extend(
        [
            (EXPORT_S3_PREFIX, "exports"),
            (EXPORT_DATA_PREFIX, "exports"),
            (ATHENA_TABLE_NAME, TEST_TABLE),
            (READ_TABLE_QUERY_NAME, TEST_READ_TABLE_QUERY_NAME),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string())),
    );

    vars
}

/// Setup default environment variables used in testing
pub fn setup_default_env() {
    for (name, value) in end_to_end_env() {
        unsafe {
            env::set_var(name, value);
        }
    }
}

/// A mock DynamoDB client whose export is in progress for the first describe, then completed
pub fn create_mock_dynamodb_client() -> aws_sdk_dynamodb::Client {
    let export_rule: Rule = mock!(aws_sdk_dynamodb::Client::export_table_to_point_in_time)
        .match_requests(|_| true)
        .sequence()
        .output(|| {
            ExportTableToPointInTimeOutput::builder()
                .export_description(export_description(ExportStatus::InProgress))
                .build()
        })
        .repeatedly()
        .build();
    let describe_rule: Rule = mock!(aws_sdk_dynamodb::Client::describe_export)
        .match_requests(|req| req.export_arn() == Some(TEST_EXPORT_ARN))
        .sequence()
        .output(|| {
            DescribeExportOutput::builder()
                .export_description(export_description(ExportStatus::InProgress))
                .build()
        })
        .output(|| {
            DescribeExportOutput::builder()
                .export_description(export_description(ExportStatus::Completed))
                .build()
        })
        .repeatedly()
        .build();

    mock_client!(aws_sdk_dynamodb, RuleMode::MatchAny, [&export_rule, &describe_rule])
}

fn export_description(status: ExportStatus) -> ExportDescription {
    ExportDescription::builder()
        .export_arn(TEST_EXPORT_ARN)
        .export_status(status)
        .build()
}

/// A mock Athena client where every statement succeeds and no named queries exist yet
pub fn create_mock_athena_client() -> aws_sdk_athena::Client {
    let start_rule: Rule = mock!(aws_sdk_athena::Client::start_query_execution)
        .match_requests(|_| true)
        .sequence()
        .output(|| {
            StartQueryExecutionOutput::builder()
                .query_execution_id("exec-1")
                .build()
        })
        .repeatedly()
        .build();
    let execution_rule: Rule = mock!(aws_sdk_athena::Client::get_query_execution)
        .match_requests(|_| true)
        .sequence()
        .output(|| {
            GetQueryExecutionOutput::builder()
                .query_execution(
                    QueryExecution::builder()
                        .query_execution_id("exec-1")
                        .status(
                            QueryExecutionStatus::builder()
                                .state(QueryExecutionState::Succeeded)
                                .build(),
                        )
                        .build(),
                )
                .build()
        })
        .repeatedly()
        .build();
    let list_rule: Rule = mock!(aws_sdk_athena::Client::list_named_queries)
        .match_requests(|_| true)
        .sequence()
        .output(|| ListNamedQueriesOutput::builder().build())
        .repeatedly()
        .build();
    let create_rule: Rule = mock!(aws_sdk_athena::Client::create_named_query)
        .match_requests(|req| req.work_group() == Some(TEST_WORKGROUP))
        .sequence()
        .output(|| {
            CreateNamedQueryOutput::builder()
                .named_query_id("query-1")
                .build()
        })
        .repeatedly()
        .build();

    mock_client!(
        aws_sdk_athena,
        RuleMode::MatchAny,
        [&start_rule, &execution_rule, &list_rule, &create_rule]
    )
}
