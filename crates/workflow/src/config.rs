use crate::retry::{RetryPolicy, RetryPolicyError};
use model::catalog::{parse_item_attributes, AttributeParseError, ItemAttribute};
use model::env::*;
use model::query::QueryTemplate;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_STEP_TIMEOUT_SECONDS: u64 = 120;

/// Everything a workflow run needs, read once at cold start.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub region: Option<String>,

    pub store_arn: String,
    pub bucket: String,
    pub export_prefix: String,
    pub data_prefix: String,

    pub database_name: String,
    pub workgroup: String,
    pub table_name: String,
    pub item_attributes: Vec<ItemAttribute>,
    // Raw DDL replacing the generated create statement
    pub create_table_template: Option<String>,
    /// Saved queries to publish, in order
    pub query_templates: Vec<QueryTemplate>,

    /// Waits between export polls. A Lambda invocation lasts at most 15 minutes, so when
    /// `total_wait()` is longer than the invocation deadline the run stops at `Polling`
    /// once the next wait would pass that deadline.
    pub poll_policy: RetryPolicy,
    pub ddl_retry_policy: RetryPolicy,
    pub step_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing {0} environment variable")]
    Missing(&'static str),
    #[error("invalid {name} value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid CATALOG_ITEM_ATTRIBUTES: {0}")]
    Attributes(#[from] AttributeParseError),
    #[error("invalid export poll policy: {0}")]
    PollPolicy(#[from] RetryPolicyError),
}

impl WorkflowConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars: Vars<F> = Vars { lookup };

        let export_prefix: String = vars
            .optional(EXPORT_S3_PREFIX)
            .unwrap_or_else(|| DEFAULT_EXPORT_S3_PREFIX.to_string());
        let data_prefix: String = vars.optional(EXPORT_DATA_PREFIX).unwrap_or_else(|| {
            format!("{}/{DYNAMODB_EXPORT_FOLDER}", export_prefix.trim_end_matches('/'))
        });

        let item_attributes: Vec<ItemAttribute> = parse_item_attributes(
            &vars
                .optional(CATALOG_ITEM_ATTRIBUTES)
                .unwrap_or_else(|| DEFAULT_CATALOG_ITEM_ATTRIBUTES.to_string()),
        )?;

        let create_table_template: Option<String> = vars.optional(ATHENA_QUERY_STRING_CREATE_TABLE);

        // The create table query is registered first, as the standalone export always did
        let mut query_templates: Vec<QueryTemplate> = Vec::new();
        if let Some(body) = &create_table_template {
            query_templates.push(QueryTemplate::new(
                vars.optional(CREATE_TABLE_QUERY_NAME)
                    .unwrap_or_else(|| DEFAULT_CREATE_TABLE_QUERY_NAME.to_string()),
                body.clone(),
            ));
        }
        query_templates.push(QueryTemplate::new(
            vars.optional(READ_TABLE_QUERY_NAME)
                .unwrap_or_else(|| DEFAULT_READ_TABLE_QUERY_NAME.to_string()),
            vars.required(ATHENA_QUERY_STRING_READ_TABLE)?,
        ));

        let poll_policy: RetryPolicy = RetryPolicy::new(
            Duration::from_secs(vars.parsed(EXPORT_POLL_INTERVAL_SECONDS, 30)?),
            vars.parsed(EXPORT_POLL_BACKOFF_RATE, 2.0)?,
            vars.parsed(EXPORT_POLL_MAX_ATTEMPTS, 10)?,
        )?;

        let step_timeout: Duration = match vars.parsed::<u64>(STEP_TIMEOUT_SECONDS, DEFAULT_STEP_TIMEOUT_SECONDS)? {
            0 => {
                return Err(ConfigError::Invalid {
                    name: STEP_TIMEOUT_SECONDS,
                    value: "0".to_string(),
                    reason: "must be at least 1 second".to_string(),
                })
            }
            seconds => Duration::from_secs(seconds),
        };

        Ok(WorkflowConfig {
            region: vars.optional(REGION),
            store_arn: vars.required(DYNAMO_DB_TABLE_ARN)?,
            bucket: vars.required(S3_BUCKET_NAME)?,
            export_prefix,
            data_prefix,
            database_name: vars.required(GLUE_DATABASE_NAME)?,
            workgroup: vars.required(ATHENA_WORKGROUP_NAME)?,
            table_name: vars
                .optional(ATHENA_TABLE_NAME)
                .unwrap_or_else(|| DEFAULT_ATHENA_TABLE_NAME.to_string()),
            item_attributes,
            create_table_template,
            query_templates,
            poll_policy,
            ddl_retry_policy: RetryPolicy::transient_ddl(),
            step_timeout,
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    // Blank values count as unset
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
                name,
                reason: err.to_string(),
                value,
            }),
        }
    }
}
