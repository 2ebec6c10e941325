//! Error types for Graph Store clients

use crate::query::ExecutionError;
use thiserror::Error;

/// Errors that can occur when talking to a Graph Store
#[derive(Error, Debug)]
pub enum ClientError {
    /// Query parsing or execution error
    #[error("Query error: {0}")]
    Query(String),

    /// Connection or session error (remote stores)
    #[error("Connection error: {0}")]
    Connection(String),

    /// A returned value could not be converted
    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<ExecutionError> for ClientError {
    fn from(e: ExecutionError) -> Self {
        ClientError::Query(e.to_string())
    }
}
