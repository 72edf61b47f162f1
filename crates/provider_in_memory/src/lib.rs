use async_trait::async_trait;
use model::catalog::{DdlStatement, QueryContext};
use model::export::{ExportDescription, ExportHandle};
use model::query::SavedQuery;
use provider::ProviderErrorReason::MissingField;
use provider::ProviderOperation::{
    CreateSavedQuery, DescribeExport, ExecuteDdl, GetSavedQuery, StartExport, UpdateSavedQuery,
};
use provider::{DdlExecution, ProviderError, QueryEngine, StoreProvider};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const EXPORT_EPOCH_MILLIS: u64 = 1_700_000_000_000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Store provider whose export statuses are scripted up front.
///
/// Each `describe_export` consumes the next scripted status; once the script
/// runs out the last status is repeated.
#[derive(Default)]
pub struct InMemoryStoreProvider {
    statuses: Arc<Mutex<VecDeque<String>>>,
    last_status: Arc<Mutex<Option<String>>>,
    start_rejection: Option<String>,
    describe_rejection: Option<String>,
    exports: Arc<Mutex<Vec<ExportHandle>>>,
    describe_calls: Arc<Mutex<usize>>,
}

impl InMemoryStoreProvider {
    pub fn with_statuses<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InMemoryStoreProvider {
            statuses: Arc::new(Mutex::new(statuses.into_iter().map(Into::into).collect())),
            ..Default::default()
        }
    }

    /// Every `start_export` fails with the given message
    pub fn rejecting_exports(mut self, message: impl Into<String>) -> Self {
        self.start_rejection = Some(message.into());
        self
    }

    /// Every `describe_export` fails with the given message
    pub fn rejecting_describe(mut self, message: impl Into<String>) -> Self {
        self.describe_rejection = Some(message.into());
        self
    }

    pub fn exports(&self) -> Vec<ExportHandle> {
        lock(&self.exports).clone()
    }

    pub fn describe_calls(&self) -> usize {
        *lock(&self.describe_calls)
    }
}

#[async_trait]
impl StoreProvider for InMemoryStoreProvider {
    async fn start_export(
        &self,
        store_arn: &str,
        _bucket: &str,
        _prefix: &str,
    ) -> Result<ExportHandle, ProviderError> {
        if let Some(message) = &self.start_rejection {
            return Err(ProviderError::rejected(store_arn, StartExport, message.clone()));
        }

        let mut exports = lock(&self.exports);
        let sequence: u64 = exports.len() as u64 + 1;
        let export_id: String = format!("{:014}-{:08x}", EXPORT_EPOCH_MILLIS + sequence, sequence);

        let handle: ExportHandle = ExportHandle::from_arn(format!("{store_arn}/export/{export_id}"))
            .map_err(|err| ProviderError::rejected(store_arn, StartExport, err.to_string()))?;
        exports.push(handle.clone());

        Ok(handle)
    }

    async fn describe_export(&self, export_arn: &str) -> Result<ExportDescription, ProviderError> {
        *lock(&self.describe_calls) += 1;

        if let Some(message) = &self.describe_rejection {
            return Err(ProviderError::rejected(export_arn, DescribeExport, message.clone()));
        }

        if !lock(&self.exports).iter().any(|handle| handle.export_arn == export_arn) {
            return Err(ProviderError::rejected(
                export_arn,
                DescribeExport,
                "ExportNotFoundException",
            ));
        }

        let mut last_status = lock(&self.last_status);
        let status: String = match lock(&self.statuses).pop_front() {
            Some(status) => {
                *last_status = Some(status.clone());
                status
            }
            None => last_status
                .clone()
                .ok_or_else(|| ProviderError::new(export_arn, DescribeExport, MissingField("ExportStatus")))?,
        };

        let mut description: ExportDescription = ExportDescription::new(export_arn, status);
        if description.status == model::export::ExportStatus::Failed {
            description.failure_code = Some("ExportFailed".to_string());
        }

        Ok(description)
    }
}

/// Query engine keeping tables and saved queries in memory.
///
/// Tables are keyed by `(database, table)`. Creating a table which already
/// exists fails, matching the behaviour of `CREATE EXTERNAL TABLE`.
#[derive(Default)]
pub struct InMemoryQueryEngine {
    tables: Arc<Mutex<HashMap<(String, String), String>>>,
    saved_queries: Arc<Mutex<BTreeMap<String, SavedQuery>>>,
    next_query_id: Arc<Mutex<usize>>,
    // Every mutating operation in call order, for ordering assertions
    operations: Arc<Mutex<Vec<String>>>,
    ddl_faults: Arc<Mutex<VecDeque<ProviderError>>>,
    rejected_query_names: Vec<String>,
}

impl InMemoryQueryEngine {
    pub fn with_table(self, database: &str, table: &str, location: &str) -> Self {
        lock(&self.tables).insert(
            (database.to_string(), table.to_string()),
            location.to_string(),
        );
        self
    }

    pub fn with_saved_query(self, query_id: &str, query: SavedQuery) -> Self {
        lock(&self.saved_queries).insert(query_id.to_string(), query);
        self
    }

    /// The next `execute_ddl` calls fail with these errors, in order
    pub fn with_ddl_faults(self, faults: impl IntoIterator<Item = ProviderError>) -> Self {
        lock(&self.ddl_faults).extend(faults);
        self
    }

    /// Creating or updating a saved query with this name is refused
    pub fn rejecting_query(mut self, name: &str) -> Self {
        self.rejected_query_names.push(name.to_string());
        self
    }

    pub fn table_location(&self, database: &str, table: &str) -> Option<String> {
        lock(&self.tables)
            .get(&(database.to_string(), table.to_string()))
            .cloned()
    }

    /// Saved queries with their ids, ordered by id
    pub fn saved_queries(&self) -> Vec<(String, SavedQuery)> {
        lock(&self.saved_queries)
            .iter()
            .map(|(id, query)| (id.clone(), query.clone()))
            .collect()
    }

    pub fn operations(&self) -> Vec<String> {
        lock(&self.operations).clone()
    }

    fn record(&self, operation: String) {
        lock(&self.operations).push(operation);
    }

    fn check_query_allowed(
        &self,
        query: &SavedQuery,
        operation: provider::ProviderOperation,
    ) -> Result<(), ProviderError> {
        if self.rejected_query_names.contains(&query.name) {
            return Err(ProviderError::rejected(
                &query.name,
                operation,
                "AccessDeniedException",
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl QueryEngine for InMemoryQueryEngine {
    async fn execute_ddl(
        &self,
        statement: &DdlStatement,
        context: &QueryContext,
    ) -> Result<DdlExecution, ProviderError> {
        if let Some(fault) = lock(&self.ddl_faults).pop_front() {
            return Err(fault);
        }

        let mut tables = lock(&self.tables);
        match statement {
            DdlStatement::DropTableIfExists { database, table } => {
                tables.remove(&(database.clone(), table.clone()));
            }
            DdlStatement::CreateExternalTable { table, .. } => {
                let key: (String, String) = (table.database_name.clone(), table.table_name.clone());
                if tables.contains_key(&key) {
                    return Err(ProviderError::rejected(
                        &context.workgroup,
                        ExecuteDdl,
                        format!("AlreadyExistsException: Table {} already exists", table.table_name),
                    ));
                }
                tables.insert(key, table.data_location.clone());
            }
        }
        drop(tables);

        self.record(format!("ddl: {}", statement.sql()));

        Ok(DdlExecution {
            execution_id: format!("exec-{}", self.operations().len()),
        })
    }

    async fn list_saved_queries(&self, workgroup: &str) -> Result<Vec<String>, ProviderError> {
        Ok(lock(&self.saved_queries)
            .iter()
            .filter(|(_, query)| query.workgroup == workgroup)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn get_saved_query(&self, query_id: &str) -> Result<SavedQuery, ProviderError> {
        lock(&self.saved_queries)
            .get(query_id)
            .cloned()
            .ok_or_else(|| {
                ProviderError::rejected(query_id, GetSavedQuery, "InvalidRequestException")
            })
    }

    async fn create_saved_query(&self, query: &SavedQuery) -> Result<String, ProviderError> {
        self.check_query_allowed(query, CreateSavedQuery)?;

        let query_id: String = {
            let mut next_query_id = lock(&self.next_query_id);
            *next_query_id += 1;
            format!("query-{:04}", *next_query_id)
        };
        lock(&self.saved_queries).insert(query_id.clone(), query.clone());
        self.record(format!("create: {}", query.name));

        Ok(query_id)
    }

    async fn update_saved_query(
        &self,
        query_id: &str,
        query: &SavedQuery,
    ) -> Result<(), ProviderError> {
        self.check_query_allowed(query, UpdateSavedQuery)?;

        let mut saved_queries = lock(&self.saved_queries);
        let existing: &mut SavedQuery = saved_queries.get_mut(query_id).ok_or_else(|| {
            ProviderError::rejected(query_id, UpdateSavedQuery, "InvalidRequestException")
        })?;

        // Update keeps the workgroup and database of the stored query
        existing.name = query.name.clone();
        existing.query_string = query.query_string.clone();
        existing.description = query.description.clone();
        drop(saved_queries);

        self.record(format!("update: {}", query.name));

        Ok(())
    }
}
