//! Backend-to-UI events and error modeling for the console controller.

use session_core::{
    PendingUploadInfo, Rejection, SessionEvent, SessionSnapshot, TransportFailure, UploadError,
};
use shared::domain::{ChatMessage, Document};

pub enum UiEvent {
    Info(String),
    Error(UiError),
    TranscriptAppended(ChatMessage),
    DocumentsUpdated(Vec<Document>),
    AgentBusy(bool),
    UploadSelected(PendingUploadInfo),
    Uploading(bool),
    UploadCompleted(Document),
    History(Vec<ChatMessage>),
    Status(SessionSnapshot),
}

impl UiEvent {
    /// Maps controller events onto UI events. Failure events are skipped:
    /// the command that triggered the call reports those itself.
    pub fn from_session(event: SessionEvent) -> Option<Self> {
        match event {
            SessionEvent::TranscriptAppended { message, .. } => {
                Some(UiEvent::TranscriptAppended(message))
            }
            SessionEvent::DocumentsRefreshed(documents) => {
                Some(UiEvent::DocumentsUpdated(documents.to_vec()))
            }
            SessionEvent::AgentBusyChanged(busy) => Some(UiEvent::AgentBusy(busy)),
            SessionEvent::UploadSelected(info) => Some(UiEvent::UploadSelected(info)),
            SessionEvent::UploadStateChanged { uploading } => Some(UiEvent::Uploading(uploading)),
            SessionEvent::UploadCompleted(document) => Some(UiEvent::UploadCompleted(document)),
            SessionEvent::DocumentsRefreshFailed(_) | SessionEvent::UploadFailed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    ListDocuments,
    Upload,
    Ask,
    Summarize,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("no such file")
            || message_lower.contains("not found")
            || message_lower.contains("empty")
        {
            UiErrorCategory::Validation
        } else if message_lower.contains("timeout")
            || message_lower.contains("timed out")
            || message_lower.contains("connection")
            || message_lower.contains("unreachable")
            || message_lower.contains("http")
        {
            UiErrorCategory::Transport
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn from_transport(context: UiErrorContext, failure: &TransportFailure) -> Self {
        Self {
            category: UiErrorCategory::Transport,
            context,
            message: failure.to_string(),
        }
    }

    pub fn from_upload(err: &UploadError) -> Self {
        match err {
            UploadError::Transport(failure) => Self::from_transport(UiErrorContext::Upload, failure),
            UploadError::NothingPending | UploadError::AlreadyInFlight => Self {
                category: UiErrorCategory::Validation,
                context: UiErrorContext::Upload,
                message: err.to_string(),
            },
        }
    }

    pub fn from_rejection(context: UiErrorContext, rejection: Rejection) -> Self {
        Self {
            category: UiErrorCategory::Validation,
            context,
            message: rejection.to_string(),
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// User-facing line, worded after the action that failed.
    pub fn summary(&self) -> String {
        match (self.context, self.category) {
            (UiErrorContext::Upload, UiErrorCategory::Transport) => {
                format!("Upload failed; the file is still selected, retry with /upload ({})", self.message)
            }
            (UiErrorContext::ListDocuments, UiErrorCategory::Transport) => {
                format!("Could not load documents; showing the previous list ({})", self.message)
            }
            (UiErrorContext::BackendStartup, _) => {
                format!("Backend worker startup failure: {}", self.message)
            }
            _ => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use session_core::Operation;

    use super::*;

    #[test]
    fn classifies_io_messages_as_validation() {
        let err = UiError::from_message(
            UiErrorContext::Upload,
            "failed to read 'a.txt': No such file or directory (os error 2)",
        );
        assert_eq!(err.category(), UiErrorCategory::Validation);
        assert_eq!(err.context(), UiErrorContext::Upload);
    }

    #[test]
    fn upload_transport_failure_mentions_retry() {
        let err = UiError::from_upload(&UploadError::Transport(TransportFailure::Status {
            operation: Operation::Upload,
            status: 400,
        }));
        assert_eq!(err.category(), UiErrorCategory::Transport);
        assert!(err.summary().contains("retry"));
        assert!(err.message().contains("400"));
    }

    #[test]
    fn failure_events_are_not_forwarded() {
        let event = SessionEvent::UploadFailed(TransportFailure::Cancelled {
            operation: Operation::Upload,
        });
        assert!(UiEvent::from_session(event).is_none());
        assert!(matches!(
            UiEvent::from_session(SessionEvent::AgentBusyChanged(true)),
            Some(UiEvent::AgentBusy(true))
        ));
    }
}
