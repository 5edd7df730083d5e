use std::fmt;

use thiserror::Error;

/// Failure of a single query. The display text is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Request failed")]
    Network { detail: String },
    #[error("{body}")]
    Http { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl QueryError {
    pub fn network(detail: impl fmt::Display) -> Self {
        QueryError::Network {
            detail: detail.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            QueryError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(value: serde_json::Error) -> Self {
        QueryError::Decode(value.to_string())
    }
}
