pub use crate::config::WorkflowConfig;
pub use crate::error::WorkflowError;
pub use crate::handler::handle_event;
pub use crate::runtime::{ExportReport, WorkflowOutcome, WorkflowRuntime};

pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod handler;
pub mod query;
pub mod retry;
pub mod runtime;
pub mod template;
