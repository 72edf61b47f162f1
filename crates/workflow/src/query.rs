use crate::context::WorkflowContext;
use crate::template::Substitutions;
use lambda_runtime::tracing;
use model::query::{PublishAction, PublishedQuery, QueryTemplate, SavedQuery, SAVED_QUERY_DESCRIPTION};
use provider::{ProviderError, ProviderOperation, QueryEngine};
use std::sync::Arc;

/// Creates or updates saved queries by name within one workgroup.
pub struct SavedQueryRegistrar {
    engine: Arc<dyn QueryEngine>,
    workgroup: String,
    database: String,
}

impl SavedQueryRegistrar {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        workgroup: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        SavedQueryRegistrar {
            engine,
            workgroup: workgroup.into(),
            database: database.into(),
        }
    }

    /// Render `template` and upsert it under its name, keeping the id of an existing query.
    pub async fn register(
        &self,
        ctx: &WorkflowContext,
        template: &QueryTemplate,
        substitutions: &Substitutions,
    ) -> Result<PublishedQuery, ProviderError> {
        let query: SavedQuery = SavedQuery {
            name: template.name.clone(),
            query_string: substitutions.render(&template.body),
            database: self.database.clone(),
            workgroup: self.workgroup.clone(),
            description: Some(SAVED_QUERY_DESCRIPTION.to_string()),
        };

        let published: PublishedQuery = match self.find_by_name(ctx, &query.name).await? {
            Some(query_id) => {
                ctx.call(
                    &query.name,
                    ProviderOperation::UpdateSavedQuery,
                    self.engine.update_saved_query(&query_id, &query),
                )
                .await?;

                PublishedQuery {
                    name: query.name,
                    query_id,
                    action: PublishAction::Updated,
                }
            }
            None => {
                let query_id: String = ctx
                    .call(
                        &query.name,
                        ProviderOperation::CreateSavedQuery,
                        self.engine.create_saved_query(&query),
                    )
                    .await?;

                PublishedQuery {
                    name: query.name,
                    query_id,
                    action: PublishAction::Created,
                }
            }
        };

        tracing::info!(
            name = published.name,
            query_id = published.query_id,
            action = ?published.action,
            "Saved query published"
        );

        Ok(published)
    }

    // No name index exists, so every query in the workgroup is fetched
    async fn find_by_name(
        &self,
        ctx: &WorkflowContext,
        name: &str,
    ) -> Result<Option<String>, ProviderError> {
        let query_ids: Vec<String> = ctx
            .call(
                &self.workgroup,
                ProviderOperation::ListSavedQueries,
                self.engine.list_saved_queries(&self.workgroup),
            )
            .await?;

        for query_id in query_ids {
            let existing: SavedQuery = ctx
                .call(
                    &query_id,
                    ProviderOperation::GetSavedQuery,
                    self.engine.get_saved_query(&query_id),
                )
                .await?;

            if existing.name == name {
                return Ok(Some(query_id));
            }
        }

        Ok(None)
    }
}
