use aws_config::{BehaviorVersion, Region, SdkConfig};
use lambda_runtime::{service_fn, tracing, LambdaEvent};
use model::Error;
use provider_athena::AthenaQueryEngine;
use provider_dynamodb::DynamoDbStoreProvider;
use serde_json::Value;
use std::sync::Arc;
use workflow::{handle_event, WorkflowConfig, WorkflowRuntime};

fn create_runtime(
    config: WorkflowConfig,
    dynamodb_client: aws_sdk_dynamodb::Client,
    athena_client: aws_sdk_athena::Client,
) -> WorkflowRuntime {
    WorkflowRuntime::new(
        config,
        Arc::new(DynamoDbStoreProvider::new(dynamodb_client)),
        Arc::new(AthenaQueryEngine::new(athena_client)),
    )
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config: WorkflowConfig = WorkflowConfig::from_env()?;

    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    let sdk_config: SdkConfig = loader.load().await;

    let runtime: WorkflowRuntime = create_runtime(
        config,
        aws_sdk_dynamodb::Client::new(&sdk_config),
        aws_sdk_athena::Client::new(&sdk_config),
    );
    let runtime_ref: &WorkflowRuntime = &runtime;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_event(runtime_ref, event).await
    }))
    .await
}
