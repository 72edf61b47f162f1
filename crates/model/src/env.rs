/// Optional region override, otherwise the SDK default chain applies
pub const REGION: &str = "REGION";

/// ARN of the DynamoDB table to export
pub const DYNAMO_DB_TABLE_ARN: &str = "DYNAMO_DB_TABLE_ARN";
/// Bucket receiving the export
pub const S3_BUCKET_NAME: &str = "S3_BUCKET_NAME";
/// Prefix handed to the export request
pub const EXPORT_S3_PREFIX: &str = "EXPORT_S3_PREFIX";
/// Prefix under which `<export id>/data/` is written by the export
pub const EXPORT_DATA_PREFIX: &str = "EXPORT_DATA_PREFIX";

pub const GLUE_DATABASE_NAME: &str = "GLUE_DATABASE_NAME";
pub const ATHENA_WORKGROUP_NAME: &str = "ATHENA_WORKGROUP_NAME";
pub const ATHENA_TABLE_NAME: &str = "ATHENA_TABLE_NAME";
/// Comma separated `name:type` pairs describing the exported item
pub const CATALOG_ITEM_ATTRIBUTES: &str = "CATALOG_ITEM_ATTRIBUTES";

pub const ATHENA_QUERY_STRING_READ_TABLE: &str = "ATHENA_QUERY_STRING_READ_TABLE";
pub const READ_TABLE_QUERY_NAME: &str = "READ_TABLE_QUERY_NAME";
pub const ATHENA_QUERY_STRING_CREATE_TABLE: &str = "ATHENA_QUERY_STRING_CREATE_TABLE";
pub const CREATE_TABLE_QUERY_NAME: &str = "CREATE_TABLE_QUERY_NAME";

pub const EXPORT_POLL_INTERVAL_SECONDS: &str = "EXPORT_POLL_INTERVAL_SECONDS";
pub const EXPORT_POLL_BACKOFF_RATE: &str = "EXPORT_POLL_BACKOFF_RATE";
pub const EXPORT_POLL_MAX_ATTEMPTS: &str = "EXPORT_POLL_MAX_ATTEMPTS";
/// Upper bound for any single provider call
pub const STEP_TIMEOUT_SECONDS: &str = "STEP_TIMEOUT_SECONDS";

pub const DEFAULT_EXPORT_S3_PREFIX: &str = "ddb-exports";
/// DynamoDB nests every export below this folder of the requested prefix
pub const DYNAMODB_EXPORT_FOLDER: &str = "AWSDynamoDB";
pub const DEFAULT_ATHENA_TABLE_NAME: &str = "ddb_exported_table";
pub const DEFAULT_READ_TABLE_QUERY_NAME: &str = "sfn-ddb-export-read-table";
pub const DEFAULT_CREATE_TABLE_QUERY_NAME: &str = "ddb-export-create-table";
pub const DEFAULT_CATALOG_ITEM_ATTRIBUTES: &str = "personId:S,firstName:S,lastName:S,email:S";
