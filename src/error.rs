use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MrApiError {
    #[error("api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unknown api version `{0}` (expected v1 or v2)")]
    UnknownVersion(String),

    #[error("unknown endpoint `{0}` (expected player, match, heroes or match-history)")]
    UnknownEndpoint(String),

    #[error("endpoint `{endpoint}` needs an identifier")]
    MissingIdentifier { endpoint: &'static str },

    #[error("unexpected payload from {endpoint}: {reason}")]
    UnexpectedPayload {
        endpoint: &'static str,
        reason: String,
    },
}

impl MrApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            MrApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum DataFileError {
    #[error("no files matching `{pattern}` found in {}", dir.display())]
    Missing { dir: PathBuf, pattern: String },

    #[error("file {} is missing required column `{column}`", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("none of the {rows} rows in {} could be parsed; first error: {first}", path.display())]
    NoUsableRows {
        path: PathBuf,
        rows: usize,
        first: MalformedRecord,
    },
}

/// A record that could not be turned into typed rows. Only the offending
/// match or player is dropped; the run continues.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("malformed record in match {match_uid}: {reason}")]
pub struct MalformedRecord {
    pub match_uid: String,
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(match_uid: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            match_uid: match_uid.into(),
            reason: reason.into(),
        }
    }
}
