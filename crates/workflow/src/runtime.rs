use crate::catalog::CatalogTablePublisher;
use crate::config::WorkflowConfig;
use crate::context::WorkflowContext;
use crate::error::WorkflowError;
use crate::export::{ExportPoller, ExportTrigger, PollOutcome};
use crate::query::SavedQueryRegistrar;
use crate::template::Substitutions;
use lambda_runtime::tracing;
use lambda_runtime::tracing::{Instrument, Span};
use model::catalog::CatalogTableDescriptor;
use model::export::{ExportHandle, ExportStatus};
use model::query::PublishedQuery;
use model::WorkflowStep;
use provider::{QueryEngine, StoreProvider};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Drives one export-and-publish run from trigger to saved queries.
///
/// Runs share nothing but the providers; each call to `run` starts a new export.
pub struct WorkflowRuntime {
    config: WorkflowConfig,
    trigger: ExportTrigger,
    poller: ExportPoller,
    publisher: CatalogTablePublisher,
    registrar: SavedQueryRegistrar,
}

enum WorkflowState {
    Start,
    Exporting,
    Polling {
        handle: ExportHandle,
        // 1 based count of the describe call about to be made
        attempt: u32,
    },
    TableRefresh(ExportHandle),
    QueryPublish(Substitutions),
    Done,
    Failed(WorkflowError),
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    Done,
    Failed,
}

/// What a run did, returned to the invoker and logged.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ExportReport {
    pub invocation_id: String,
    pub state: TerminalState,
    pub export: Option<ExportHandle>,
    pub poll_attempts: u32,
    pub table: Option<CatalogTableDescriptor>,
    pub published_queries: Vec<PublishedQuery>,
    pub failed_step: Option<WorkflowStep>,
    /// Raw error text of a failed run
    pub error: Option<String>,
}

impl ExportReport {
    fn new(invocation_id: &str) -> Self {
        ExportReport {
            invocation_id: invocation_id.to_string(),
            state: TerminalState::Done,
            export: None,
            poll_attempts: 0,
            table: None,
            published_queries: Vec::new(),
            failed_step: None,
            error: None,
        }
    }
}

#[derive(Debug)]
pub struct WorkflowOutcome {
    pub report: ExportReport,
    pub error: Option<WorkflowError>,
}

impl WorkflowOutcome {
    pub fn state(&self) -> TerminalState {
        self.report.state
    }

    pub fn into_result(self) -> Result<ExportReport, WorkflowError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.report),
        }
    }
}

impl WorkflowRuntime {
    pub fn new(
        config: WorkflowConfig,
        store: Arc<dyn StoreProvider>,
        engine: Arc<dyn QueryEngine>,
    ) -> Self {
        WorkflowRuntime {
            trigger: ExportTrigger::new(
                store.clone(),
                &config.store_arn,
                &config.bucket,
                &config.export_prefix,
            ),
            poller: ExportPoller::new(store),
            publisher: CatalogTablePublisher::new(
                engine.clone(),
                config.item_attributes.clone(),
                config.create_table_template.clone(),
                config.ddl_retry_policy,
            ),
            registrar: SavedQueryRegistrar::new(
                engine,
                &config.workgroup,
                &config.database_name,
            ),
            config,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub async fn run(&self, invocation_id: &str) -> WorkflowOutcome {
        self.run_with_deadline(invocation_id, None).await
    }

    /// Run with polling bounded by `deadline`. A poll wait that would leave less than one
    /// step timeout before the deadline fails the run at `Polling` instead.
    pub async fn run_with_deadline(&self, invocation_id: &str, deadline: Option<Instant>) -> WorkflowOutcome {
        let workflow_span: Span = tracing::span!(tracing::Level::INFO, "Workflow", invocation_id);

        self.run_steps(invocation_id, deadline).instrument(workflow_span).await
    }

    async fn run_steps(&self, invocation_id: &str, deadline: Option<Instant>) -> WorkflowOutcome {
        let ctx: WorkflowContext =
            WorkflowContext::new(invocation_id, self.config.step_timeout).with_deadline(deadline);
        let mut report: ExportReport = ExportReport::new(invocation_id);
        let mut state: WorkflowState = WorkflowState::Start;

        loop {
            state = match state {
                WorkflowState::Start => {
                    tracing::info!(store_arn = self.config.store_arn, "Starting export workflow");
                    WorkflowState::Exporting
                }
                WorkflowState::Exporting => match self.trigger.trigger(&ctx).await {
                    Ok(handle) => {
                        report.export = Some(handle.clone());
                        WorkflowState::Polling { handle, attempt: 1 }
                    }
                    Err(err) => WorkflowState::Failed(WorkflowError::TriggerRejected(err)),
                },
                WorkflowState::Polling { handle, attempt } => {
                    report.poll_attempts = attempt;
                    self.poll_step(&ctx, handle, attempt).await
                }
                WorkflowState::TableRefresh(handle) => {
                    let table: CatalogTableDescriptor = CatalogTableDescriptor::for_export(
                        &self.config.database_name,
                        &self.config.table_name,
                        &self.config.workgroup,
                        &self.config.bucket,
                        &self.config.data_prefix,
                        &handle.export_id,
                    );
                    let substitutions: Substitutions = Substitutions::for_export(&table, &handle);
                    report.table = Some(table.clone());

                    match self.publisher.publish(&ctx, &table, &substitutions).await {
                        Ok(()) => WorkflowState::QueryPublish(substitutions),
                        Err(err) => WorkflowState::Failed(err),
                    }
                }
                WorkflowState::QueryPublish(substitutions) => {
                    match self.publish_queries(&ctx, &substitutions, &mut report).await {
                        Ok(()) => WorkflowState::Done,
                        Err(err) => WorkflowState::Failed(err),
                    }
                }
                WorkflowState::Done => {
                    tracing::info!(
                        poll_attempts = report.poll_attempts,
                        published = report.published_queries.len(),
                        "Export workflow done"
                    );

                    return WorkflowOutcome {
                        report,
                        error: None,
                    };
                }
                WorkflowState::Failed(err) => {
                    tracing::error!(step = %err.step(), error = %err, "Export workflow failed");

                    report.state = TerminalState::Failed;
                    report.failed_step = Some(err.step());
                    report.error = Some(err.to_string());

                    return WorkflowOutcome {
                        report,
                        error: Some(err),
                    };
                }
            };
        }
    }

    async fn poll_step(
        &self,
        ctx: &WorkflowContext,
        handle: ExportHandle,
        attempt: u32,
    ) -> WorkflowState {
        let outcome: PollOutcome = match self.poller.poll(ctx, &handle).await {
            Ok(outcome) => outcome,
            Err(err) => return WorkflowState::Failed(WorkflowError::PollFailed(err)),
        };

        match outcome {
            PollOutcome::Completed(handle) => {
                tracing::info!(attempt, "Export completed");
                WorkflowState::TableRefresh(handle)
            }
            PollOutcome::InProgress if attempt < self.config.poll_policy.max_attempts() => {
                let delay: Duration = self.config.poll_policy.delay_after(attempt);
                if !ctx.can_wait(delay) {
                    return WorkflowState::Failed(WorkflowError::DeadlineReached {
                        export_arn: handle.export_arn,
                        attempts: attempt,
                        next_wait: delay,
                    });
                }
                tracing::info!(attempt, ?delay, "Export in progress, waiting");

                tokio::time::sleep(delay).await;
                WorkflowState::Polling {
                    handle,
                    attempt: attempt + 1,
                }
            }
            PollOutcome::InProgress => WorkflowState::Failed(WorkflowError::PollExhausted {
                export_arn: handle.export_arn,
                attempts: attempt,
            }),
            PollOutcome::Failed(description) => match description.status {
                ExportStatus::Failed => WorkflowState::Failed(WorkflowError::ExportFailed {
                    reason: description.failure_reason(),
                    export_arn: description.export_arn,
                }),
                _ => WorkflowState::Failed(WorkflowError::UnexpectedStatus {
                    export_arn: description.export_arn,
                    status: description.raw_status,
                }),
            },
        }
    }

    async fn publish_queries(
        &self,
        ctx: &WorkflowContext,
        substitutions: &Substitutions,
        report: &mut ExportReport,
    ) -> Result<(), WorkflowError> {
        for template in &self.config.query_templates {
            match self.registrar.register(ctx, template, substitutions).await {
                Ok(published) => report.published_queries.push(published),
                Err(source) => {
                    return Err(WorkflowError::QueryPublish {
                        query: template.name.clone(),
                        published: report
                            .published_queries
                            .iter()
                            .map(|query| query.name.clone())
                            .collect(),
                        source,
                    });
                }
            }
        }

        Ok(())
    }
}
