// src/error.rs

use serde::Serialize;
use thiserror::Error;

/// Everything that can go wrong between fetching the rate page and
/// producing a corrected amount. Each variant renders a message fit for
/// direct display to the person who asked for the correction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrectionError {
    #[error("could not fetch the rate table from {url}: {reason}")]
    Fetch {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("rate table not found: {0}")]
    TableNotFound(String),

    #[error("rate table has an unexpected shape: {0}")]
    Structural(String),

    #[error("rate unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Machine-readable tag for a [`CorrectionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    TableNotFound,
    Structural,
    DataUnavailable,
    InvalidInput,
    Config,
}

impl CorrectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CorrectionError::Fetch { .. } => ErrorKind::Fetch,
            CorrectionError::TableNotFound(_) => ErrorKind::TableNotFound,
            CorrectionError::Structural(_) => ErrorKind::Structural,
            CorrectionError::DataUnavailable(_) => ErrorKind::DataUnavailable,
            CorrectionError::InvalidInput(_) => ErrorKind::InvalidInput,
            CorrectionError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn fetch(url: impl Into<String>, status: Option<u16>, reason: impl ToString) -> Self {
        CorrectionError::Fetch {
            url: url.into(),
            status,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CorrectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_serialize_snake_case() {
        let err = CorrectionError::DataUnavailable("no row for 1999".into());
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
        assert_eq!(
            serde_json::to_string(&err.kind()).unwrap(),
            "\"data_unavailable\""
        );
    }

    #[test]
    fn test_fetch_message_names_url() {
        let err = CorrectionError::fetch("https://example.com/selic", Some(503), "HTTP 503");
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert_eq!(
            err.to_string(),
            "could not fetch the rate table from https://example.com/selic: HTTP 503"
        );
    }
}
