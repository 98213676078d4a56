use std::{fmt, time::Duration};

use shared::domain::DocumentId;
use thiserror::Error;

/// Backend call a failure belongs to. Used for logging only; the controller
/// treats every [`TransportFailure`] the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    ListDocuments,
    Ask,
    Summarize,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Upload => "upload",
            Operation::ListDocuments => "list_documents",
            Operation::Ask => "ask",
            Operation::Summarize => "summarize",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    #[error("{operation}: backend unreachable: {reason}")]
    Unreachable {
        operation: Operation,
        reason: String,
    },
    #[error("{operation}: backend responded with HTTP {status}")]
    Status { operation: Operation, status: u16 },
    #[error("{operation}: malformed response body: {reason}")]
    Decode {
        operation: Operation,
        reason: String,
    },
    #[error("{operation}: timed out after {}ms", after.as_millis())]
    TimedOut {
        operation: Operation,
        after: Duration,
    },
    #[error("{operation}: cancelled")]
    Cancelled { operation: Operation },
}

impl TransportFailure {
    pub fn operation(&self) -> Operation {
        match self {
            TransportFailure::Unreachable { operation, .. }
            | TransportFailure::Status { operation, .. }
            | TransportFailure::Decode { operation, .. }
            | TransportFailure::TimedOut { operation, .. }
            | TransportFailure::Cancelled { operation } => *operation,
        }
    }

    pub(crate) fn from_reqwest(operation: Operation, err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            TransportFailure::Status {
                operation,
                status: status.as_u16(),
            }
        } else if err.is_decode() || err.is_body() {
            TransportFailure::Decode {
                operation,
                reason: err.to_string(),
            }
        } else {
            TransportFailure::Unreachable {
                operation,
                reason: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("no file selected for upload")]
    NothingPending,
    #[error("an upload is already in flight")]
    AlreadyInFlight,
    #[error(transparent)]
    Transport(#[from] TransportFailure),
}

/// Why an ask/summarize call was refused before anything was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("question is empty")]
    EmptyQuestion,
    #[error("an agent request is already in flight")]
    Busy,
    #[error("document {0} is not in the registry")]
    UnknownDocument(DocumentId),
}
