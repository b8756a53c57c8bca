use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::message::Message;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Failures that end a reply before the model produces a final answer.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The round limit was reached while the model was still requesting
    /// tools. Carries the working transcript accumulated so far so the
    /// caller can inspect or salvage it.
    #[error("Round limit of {limit} reached without a final answer")]
    RoundLimitExceeded {
        limit: usize,
        transcript: Vec<Message>,
    },

    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}
