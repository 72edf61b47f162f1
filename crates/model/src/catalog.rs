use crate::sanitize_identifier;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Definition of the query engine table over one export.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CatalogTableDescriptor {
    pub database_name: String,
    pub table_name: String,
    /// Object storage prefix holding the export data files
    pub data_location: String,
    pub workgroup: String,
}

impl CatalogTableDescriptor {
    /// Build the descriptor for an export written to `s3://<bucket>/<data_prefix>/<export_id>/data/`.
    pub fn for_export(
        database_name: &str,
        table_name: &str,
        workgroup: &str,
        bucket: &str,
        data_prefix: &str,
        export_id: &str,
    ) -> Self {
        CatalogTableDescriptor {
            database_name: sanitize_identifier(database_name),
            table_name: sanitize_identifier(table_name),
            data_location: export_data_location(bucket, data_prefix, export_id),
            workgroup: workgroup.to_string(),
        }
    }

    pub fn context(&self) -> QueryContext {
        QueryContext {
            workgroup: self.workgroup.clone(),
            database: self.database_name.clone(),
        }
    }

    /// `CREATE EXTERNAL TABLE` over the DynamoDB JSON export layout,
    /// where each line is `{"Item": {"<attr>": {"<type>": value}}}`.
    pub fn create_statement(&self, attributes: &[ItemAttribute]) -> String {
        let fields: Vec<String> = attributes
            .iter()
            .map(|attribute| {
                format!(
                    "{}:struct<{}:{}>",
                    attribute.name,
                    attribute.kind,
                    attribute.kind.column_type()
                )
            })
            .collect();

        format!(
            "CREATE EXTERNAL TABLE `{}` (\n  Item struct<{}>\n)\nROW FORMAT SERDE 'org.openx.data.jsonserde.JsonSerDe'\nLOCATION '{}'",
            self.table_name,
            fields.join(","),
            self.data_location
        )
    }
}

pub fn export_data_location(bucket: &str, data_prefix: &str, export_id: &str) -> String {
    let bucket: &str = bucket.trim_start_matches("s3://").trim_matches('/');
    let data_prefix: &str = data_prefix.trim_matches('/');

    if data_prefix.is_empty() {
        format!("s3://{bucket}/{export_id}/data/")
    } else {
        format!("s3://{bucket}/{data_prefix}/{export_id}/data/")
    }
}

/// Where a statement runs.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub workgroup: String,
    pub database: String,
}

/// Data definition statements issued against the query engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlStatement {
    DropTableIfExists {
        database: String,
        table: String,
    },
    CreateExternalTable {
        table: CatalogTableDescriptor,
        sql: String,
    },
}

impl DdlStatement {
    pub fn sql(&self) -> String {
        match self {
            DdlStatement::DropTableIfExists { database, table } => {
                format!("DROP TABLE IF EXISTS `{database}.{table}`;")
            }
            DdlStatement::CreateExternalTable { sql, .. } => sql.clone(),
        }
    }
}

/// A top level attribute of the exported items, with its DynamoDB type descriptor.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ItemAttribute {
    pub name: String,
    pub kind: AttributeKind,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    S,
    N,
    Bool,
    Ss,
    Ns,
}

impl AttributeKind {
    fn column_type(&self) -> &'static str {
        match self {
            // Numbers are exported as JSON strings
            AttributeKind::S | AttributeKind::N => "string",
            AttributeKind::Bool => "boolean",
            AttributeKind::Ss | AttributeKind::Ns => "array<string>",
        }
    }
}

impl Display for AttributeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let descriptor: &str = match self {
            AttributeKind::S => "S",
            AttributeKind::N => "N",
            AttributeKind::Bool => "BOOL",
            AttributeKind::Ss => "SS",
            AttributeKind::Ns => "NS",
        };

        f.write_str(descriptor)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AttributeParseError {
    #[error("attribute '{0}' must be written as name:type")]
    Malformed(String),
    #[error("attribute '{name}' has unsupported type '{kind}'")]
    UnsupportedType { name: String, kind: String },
    #[error("no item attributes configured")]
    Empty,
}

impl FromStr for ItemAttribute {
    type Err = AttributeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (name, kind) = value
            .split_once(':')
            .map(|(name, kind)| (name.trim(), kind.trim()))
            .filter(|(name, kind)| !name.is_empty() && !kind.is_empty())
            .ok_or_else(|| AttributeParseError::Malformed(value.to_string()))?;

        let kind: AttributeKind = match kind.to_ascii_uppercase().as_str() {
            "S" => AttributeKind::S,
            "N" => AttributeKind::N,
            "BOOL" => AttributeKind::Bool,
            "SS" => AttributeKind::Ss,
            "NS" => AttributeKind::Ns,
            _ => {
                return Err(AttributeParseError::UnsupportedType {
                    name: name.to_string(),
                    kind: kind.to_string(),
                });
            }
        };

        Ok(ItemAttribute {
            name: name.to_string(),
            kind,
        })
    }
}

/// Parse a comma separated attribute list such as `id:S,total:N`.
pub fn parse_item_attributes(value: &str) -> Result<Vec<ItemAttribute>, AttributeParseError> {
    let attributes: Vec<ItemAttribute> = value
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(ItemAttribute::from_str)
        .collect::<Result<_, _>>()?;

    if attributes.is_empty() {
        return Err(AttributeParseError::Empty);
    }

    Ok(attributes)
}
