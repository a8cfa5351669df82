use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ConversationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    AlreadyExists,
    RoundNotFound,
    EmptyBoard,
    InvalidInput,
    Persistence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("no scoreboard exists for conversation {0}")]
    NotFound(ConversationId),
    #[error("a scoreboard already exists for conversation {0}")]
    AlreadyExists(ConversationId),
    #[error("round {requested} does not exist; the board has {count} round(s)")]
    RoundNotFound { requested: i64, count: usize },
    #[error("the board has no rounds")]
    EmptyBoard,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The in-memory change stands; only the durable copy is behind.
    #[error("failed to persist scoreboards: {0}")]
    Persistence(String),
}

impl BoardError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BoardError::NotFound(_) => ErrorCode::NotFound,
            BoardError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            BoardError::RoundNotFound { .. } => ErrorCode::RoundNotFound,
            BoardError::EmptyBoard => ErrorCode::EmptyBoard,
            BoardError::InvalidInput(_) => ErrorCode::InvalidInput,
            BoardError::Persistence(_) => ErrorCode::Persistence,
        }
    }
}

impl From<BoardError> for ApiError {
    fn from(value: BoardError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}
