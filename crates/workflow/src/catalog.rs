use crate::context::WorkflowContext;
use crate::error::{DdlStage, WorkflowError};
use crate::retry::{retry_transient, RetryPolicy};
use crate::template::Substitutions;
use lambda_runtime::tracing;
use model::catalog::{CatalogTableDescriptor, DdlStatement, ItemAttribute, QueryContext};
use provider::{DdlExecution, ProviderError, ProviderOperation, QueryEngine};
use std::sync::Arc;

/// Points the catalog table at a new export by dropping and recreating it.
pub struct CatalogTablePublisher {
    engine: Arc<dyn QueryEngine>,
    attributes: Vec<ItemAttribute>,
    // Replaces the generated CREATE statement when set
    create_template: Option<String>,
    retry: RetryPolicy,
}

impl CatalogTablePublisher {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        attributes: Vec<ItemAttribute>,
        create_template: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        CatalogTablePublisher {
            engine,
            attributes,
            create_template,
            retry,
        }
    }

    /// The statements run for `table`, in order.
    pub fn statements(
        &self,
        table: &CatalogTableDescriptor,
        substitutions: &Substitutions,
    ) -> [(DdlStage, DdlStatement); 2] {
        let sql: String = match &self.create_template {
            Some(template) => substitutions.render(template),
            None => table.create_statement(&self.attributes),
        };

        [
            (
                DdlStage::Drop,
                DdlStatement::DropTableIfExists {
                    database: table.database_name.clone(),
                    table: table.table_name.clone(),
                },
            ),
            (
                DdlStage::Create,
                DdlStatement::CreateExternalTable {
                    table: table.clone(),
                    sql,
                },
            ),
        ]
    }

    /// Drop then create, each awaited to completion before the next starts.
    pub async fn publish(
        &self,
        ctx: &WorkflowContext,
        table: &CatalogTableDescriptor,
        substitutions: &Substitutions,
    ) -> Result<(), WorkflowError> {
        let context: QueryContext = table.context();

        for (stage, statement) in self.statements(table, substitutions) {
            let execution: DdlExecution = retry_transient(&self.retry, || {
                ctx.call(
                    &table.workgroup,
                    ProviderOperation::ExecuteDdl,
                    self.engine.execute_ddl(&statement, &context),
                )
            })
            .await
            .map_err(|source: ProviderError| WorkflowError::TableRefresh { stage, source })?;

            tracing::info!(%stage, execution_id = execution.execution_id, table = table.table_name, "Catalog statement finished");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::catalog::parse_item_attributes;
    use model::export::ExportHandle;
    use provider_in_memory::InMemoryQueryEngine;
    use std::time::Duration;

    const LOCATION: &str = "s3://analytics-bucket/exports/01700000000001-00000001/data/";

    fn ctx() -> WorkflowContext {
        WorkflowContext::new("invocation", Duration::from_secs(120))
    }

    fn table() -> CatalogTableDescriptor {
        CatalogTableDescriptor::for_export(
            "analytics",
            "orders_exported",
            "primary",
            "analytics-bucket",
            "exports",
            "01700000000001-00000001",
        )
    }

    fn substitutions() -> Substitutions {
        let handle: ExportHandle =
            ExportHandle::from_arn("arn:table/orders/export/01700000000001-00000001").unwrap();
        Substitutions::for_export(&table(), &handle)
    }

    fn publisher(engine: Arc<InMemoryQueryEngine>, create_template: Option<&str>) -> CatalogTablePublisher {
        CatalogTablePublisher::new(
            engine,
            parse_item_attributes("orderId:S,total:N").unwrap(),
            create_template.map(str::to_string),
            RetryPolicy::transient_ddl(),
        )
    }

    #[tokio::test]
    async fn drop_of_missing_table_succeeds() {
        let engine: Arc<InMemoryQueryEngine> = Arc::new(InMemoryQueryEngine::default());

        publisher(engine.clone(), None)
            .publish(&ctx(), &table(), &substitutions())
            .await
            .unwrap();

        assert_eq!(Some(LOCATION.to_string()), engine.table_location("analytics", "orders_exported"));
    }

    #[tokio::test]
    async fn existing_table_is_replaced() {
        let engine: Arc<InMemoryQueryEngine> = Arc::new(
            InMemoryQueryEngine::default().with_table("analytics", "orders_exported", "s3://old/data/"),
        );

        publisher(engine.clone(), None)
            .publish(&ctx(), &table(), &substitutions())
            .await
            .unwrap();

        let operations: Vec<String> = engine.operations();
        assert_eq!(2, operations.len());
        assert_eq!("ddl: DROP TABLE IF EXISTS `analytics.orders_exported`;", operations[0]);
        assert!(operations[1].starts_with("ddl: CREATE EXTERNAL TABLE `orders_exported`"));
        assert_eq!(Some(LOCATION.to_string()), engine.table_location("analytics", "orders_exported"));
    }

    #[tokio::test]
    async fn create_template_is_rendered() {
        let engine: Arc<InMemoryQueryEngine> = Arc::new(InMemoryQueryEngine::default());

        publisher(engine.clone(), Some("CREATE EXTERNAL TABLE table_name (Item string) LOCATION 's3Location'"))
            .publish(&ctx(), &table(), &substitutions())
            .await
            .unwrap();

        assert_eq!(
            format!("ddl: CREATE EXTERNAL TABLE orders_exported (Item string) LOCATION '{LOCATION}'"),
            engine.operations()[1]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let engine: Arc<InMemoryQueryEngine> = Arc::new(InMemoryQueryEngine::default().with_ddl_faults([
            ProviderError::unavailable("primary", ProviderOperation::ExecuteDdl, "TooManyRequestsException"),
            ProviderError::unavailable("primary", ProviderOperation::ExecuteDdl, "TooManyRequestsException"),
        ]));

        publisher(engine.clone(), None)
            .publish(&ctx(), &table(), &substitutions())
            .await
            .unwrap();

        assert_eq!(2, engine.operations().len());
    }

    #[tokio::test]
    async fn rejected_drop_stops_before_create() {
        let engine: Arc<InMemoryQueryEngine> = Arc::new(InMemoryQueryEngine::default().with_ddl_faults([
            ProviderError::rejected("primary", ProviderOperation::ExecuteDdl, "AccessDeniedException"),
        ]));

        let err: WorkflowError = publisher(engine.clone(), None)
            .publish(&ctx(), &table(), &substitutions())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::TableRefresh { stage: DdlStage::Drop, .. }));
        assert!(engine.operations().is_empty());
        assert_eq!(None, engine.table_location("analytics", "orders_exported"));
    }
}
