use async_trait::async_trait;
use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::describe_export::DescribeExportOutput;
use aws_sdk_dynamodb::operation::export_table_to_point_in_time::ExportTableToPointInTimeOutput;
use aws_sdk_dynamodb::types::ExportFormat;
use model::export::{ExportDescription, ExportHandle};
use provider::ProviderErrorReason::MissingField;
use provider::ProviderOperation::{DescribeExport, StartExport};
use provider::{ProviderError, StoreProvider};

/// Error codes which indicate DynamoDB may accept the same request later
const TRANSIENT_ERROR_CODES: &[&str] = &[
    "InternalServerError",
    "ThrottlingException",
    "RequestLimitExceeded",
    "ServiceUnavailable",
];

/// Exports a DynamoDB table with point in time recovery enabled.
pub struct DynamoDbStoreProvider {
    dynamodb_client: aws_sdk_dynamodb::Client,
}

impl DynamoDbStoreProvider {
    pub fn new(dynamodb_client: aws_sdk_dynamodb::Client) -> Self {
        DynamoDbStoreProvider { dynamodb_client }
    }
}

#[async_trait]
impl StoreProvider for DynamoDbStoreProvider {
    async fn start_export(
        &self,
        store_arn: &str,
        bucket: &str,
        prefix: &str,
    ) -> Result<ExportHandle, ProviderError> {
        let output: ExportTableToPointInTimeOutput = self
            .dynamodb_client
            .export_table_to_point_in_time()
            .table_arn(store_arn)
            .s3_bucket(bucket)
            .s3_prefix(prefix)
            .export_format(ExportFormat::DynamodbJson)
            .send()
            .await
            .map_err(|err| sdk_error(store_arn, StartExport, err))?;

        let export_arn: &str = output
            .export_description()
            .and_then(|description| description.export_arn())
            .ok_or_else(|| ProviderError::new(store_arn, StartExport, MissingField("ExportArn")))?;

        tracing::debug!(export_arn, "Export accepted by DynamoDB");

        ExportHandle::from_arn(export_arn)
            .map_err(|err| ProviderError::rejected(store_arn, StartExport, err.to_string()))
    }

    async fn describe_export(&self, export_arn: &str) -> Result<ExportDescription, ProviderError> {
        let output: DescribeExportOutput = self
            .dynamodb_client
            .describe_export()
            .export_arn(export_arn)
            .send()
            .await
            .map_err(|err| sdk_error(export_arn, DescribeExport, err))?;

        let description = output.export_description().ok_or_else(|| {
            ProviderError::new(export_arn, DescribeExport, MissingField("ExportDescription"))
        })?;

        let raw_status: &str = description
            .export_status()
            .map(|status| status.as_str())
            .ok_or_else(|| ProviderError::new(export_arn, DescribeExport, MissingField("ExportStatus")))?;

        let mut export: ExportDescription = ExportDescription::new(export_arn, raw_status);
        export.failure_code = description.failure_code().map(str::to_string);
        export.failure_message = description.failure_message().map(str::to_string);

        Ok(export)
    }
}

/// Map an SDK failure onto the provider taxonomy.
/// Transport failures and throttling are transient, everything else is a rejection.
pub(crate) fn sdk_error<E>(
    resource: &str,
    operation: provider::ProviderOperation,
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
    use aws_sdk_dynamodb::operation::describe_export::DescribeExportError;
    use aws_sdk_dynamodb::operation::export_table_to_point_in_time::ExportTableToPointInTimeError;
    use aws_sdk_dynamodb::types::error::PointInTimeRecoveryUnavailableException;
    use aws_sdk_dynamodb::types::{ExportDescription as SdkExportDescription, ExportStatus};
    use aws_smithy_mocks::{mock, mock_client, Rule};
    use model::export::ExportStatus as WorkflowExportStatus;
    use provider::ProviderErrorReason;

    const TABLE_ARN: &str = "arn:aws:dynamodb:eu-west-1:123456789012:table/orders";
    const EXPORT_ARN: &str =
        "arn:aws:dynamodb:eu-west-1:123456789012:table/orders/export/01695810463958-a1b2c3d4";

    #[tokio::test]
    async fn start_export_requests_json_export_to_bucket() {
        let export_rule: Rule = mock!(aws_sdk_dynamodb::Client::export_table_to_point_in_time)
            .match_requests(|req| {
                req.table_arn() == Some(TABLE_ARN)
                    && req.s3_bucket() == Some("analytics-bucket")
                    && req.s3_prefix() == Some("ddb-exports")
                    && req.export_format() == Some(&ExportFormat::DynamodbJson)
            })
            .then_output(|| {
                ExportTableToPointInTimeOutput::builder()
                    .export_description(SdkExportDescription::builder().export_arn(EXPORT_ARN).build())
                    .build()
            });

        let provider: DynamoDbStoreProvider =
            DynamoDbStoreProvider::new(mock_client!(aws_sdk_dynamodb, [&export_rule]));

        let handle: ExportHandle = provider
            .start_export(TABLE_ARN, "analytics-bucket", "ddb-exports")
            .await
            .expect("Export should be accepted");

        assert_eq!(EXPORT_ARN, handle.export_arn);
        assert_eq!("01695810463958-a1b2c3d4", handle.export_id);
        assert_eq!(1, export_rule.num_calls());
    }

    #[tokio::test]
    async fn start_export_without_arn_is_missing_field() {
        let export_rule: Rule = mock!(aws_sdk_dynamodb::Client::export_table_to_point_in_time)
            .then_output(|| ExportTableToPointInTimeOutput::builder().build());

        let provider: DynamoDbStoreProvider =
            DynamoDbStoreProvider::new(mock_client!(aws_sdk_dynamodb, [&export_rule]));

        let err: ProviderError = provider
            .start_export(TABLE_ARN, "analytics-bucket", "ddb-exports")
            .await
            .expect_err("Missing arn should fail");

        assert!(matches!(err.reason, ProviderErrorReason::MissingField("ExportArn")));
    }

    #[tokio::test]
    async fn start_export_rejection_is_not_transient() {
        let export_rule: Rule = mock!(aws_sdk_dynamodb::Client::export_table_to_point_in_time)
            .then_error(|| {
                ExportTableToPointInTimeError::PointInTimeRecoveryUnavailableException(
                    PointInTimeRecoveryUnavailableException::builder()
                        .message("PITR is not enabled")
                        .build(),
                )
            });

        let provider: DynamoDbStoreProvider =
            DynamoDbStoreProvider::new(mock_client!(aws_sdk_dynamodb, [&export_rule]));

        let err: ProviderError = provider
            .start_export(TABLE_ARN, "analytics-bucket", "ddb-exports")
            .await
            .expect_err("Rejected export should fail");

        assert!(matches!(err.reason, ProviderErrorReason::Rejected(_)));
        assert_eq!(TABLE_ARN, err.resource);
    }

    #[tokio::test]
    async fn describe_export_reads_status_and_failure() {
        let describe_rule: Rule = mock!(aws_sdk_dynamodb::Client::describe_export)
            .match_requests(|req| req.export_arn() == Some(EXPORT_ARN))
            .then_output(|| {
                DescribeExportOutput::builder()
                    .export_description(
                        SdkExportDescription::builder()
                            .export_arn(EXPORT_ARN)
                            .export_status(ExportStatus::Failed)
                            .failure_code("S3NoSuchBucket")
                            .failure_message("The bucket does not exist")
                            .build(),
                    )
                    .build()
            });

        let provider: DynamoDbStoreProvider =
            DynamoDbStoreProvider::new(mock_client!(aws_sdk_dynamodb, [&describe_rule]));

        let description: ExportDescription = provider
            .describe_export(EXPORT_ARN)
            .await
            .expect("Describe should succeed");

        assert_eq!(WorkflowExportStatus::Failed, description.status);
        assert_eq!("FAILED", description.raw_status);
        assert_eq!(
            "S3NoSuchBucket: The bucket does not exist",
            description.failure_reason()
        );
    }

    #[tokio::test]
    async fn describe_export_without_status_is_missing_field() {
        let describe_rule: Rule = mock!(aws_sdk_dynamodb::Client::describe_export).then_output(|| {
            DescribeExportOutput::builder()
                .export_description(SdkExportDescription::builder().export_arn(EXPORT_ARN).build())
                .build()
        });

        let provider: DynamoDbStoreProvider =
            DynamoDbStoreProvider::new(mock_client!(aws_sdk_dynamodb, [&describe_rule]));

        let err: ProviderError = provider
            .describe_export(EXPORT_ARN)
            .await
            .expect_err("Missing status should fail");

        assert!(matches!(err.reason, ProviderErrorReason::MissingField("ExportStatus")));
    }

    #[test]
    fn timeouts_are_transient() {
        let err: SdkError<DescribeExportError, HttpResponse> = SdkError::timeout_error("slow");

        assert!(sdk_error(EXPORT_ARN, DescribeExport, err).is_transient());
    }
}
