use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Handle for an export started by the store provider.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ExportHandle {
    pub export_arn: String,
    /// Last path segment of the ARN, used to locate the exported data
    pub export_id: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("export arn '{0}' has no trailing export id")]
pub struct InvalidExportArn(pub String);

impl ExportHandle {
    pub fn from_arn(export_arn: impl Into<String>) -> Result<Self, InvalidExportArn> {
        let export_arn: String = export_arn.into();

        let export_id: String = match export_arn.rsplit('/').next() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => return Err(InvalidExportArn(export_arn)),
        };

        Ok(ExportHandle {
            export_arn,
            export_id,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportStatus {
    InProgress,
    Completed,
    Failed,
    Unknown,
}

impl ExportStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "IN_PROGRESS" => ExportStatus::InProgress,
            "COMPLETED" => ExportStatus::Completed,
            "FAILED" => ExportStatus::Failed,
            _ => ExportStatus::Unknown,
        }
    }
}

impl Display for ExportStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let raw: &str = match self {
            ExportStatus::InProgress => "IN_PROGRESS",
            ExportStatus::Completed => "COMPLETED",
            ExportStatus::Failed => "FAILED",
            ExportStatus::Unknown => "UNKNOWN",
        };

        f.write_str(raw)
    }
}

/// A single status read of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDescription {
    pub export_arn: String,
    pub status: ExportStatus,
    /// Status as reported by the provider, kept for unexpected values
    pub raw_status: String,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
}

impl ExportDescription {
    pub fn new(export_arn: impl Into<String>, raw_status: impl Into<String>) -> Self {
        let raw_status: String = raw_status.into();

        ExportDescription {
            export_arn: export_arn.into(),
            status: ExportStatus::parse(&raw_status),
            raw_status,
            failure_code: None,
            failure_message: None,
        }
    }

    /// Provider supplied reason for a failed export, if any
    pub fn failure_reason(&self) -> String {
        match (&self.failure_code, &self.failure_message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (Some(code), None) => code.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => "no failure reason reported".to_string(),
        }
    }
}
