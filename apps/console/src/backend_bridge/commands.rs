//! Backend commands queued from the input loop to the backend worker.

use shared::domain::DocumentId;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    SelectFile { path: PathBuf },
    Upload { path: Option<PathBuf> },
    RefreshDocuments,
    ListDocuments,
    Ask { question: String },
    Summarize { document_id: DocumentId },
    CancelAgentRequest,
    ShowHistory,
    ShowStatus,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::SelectFile { .. } => "select_file",
            BackendCommand::Upload { .. } => "upload",
            BackendCommand::RefreshDocuments => "refresh_documents",
            BackendCommand::ListDocuments => "list_documents",
            BackendCommand::Ask { .. } => "ask",
            BackendCommand::Summarize { .. } => "summarize",
            BackendCommand::CancelAgentRequest => "cancel_agent_request",
            BackendCommand::ShowHistory => "show_history",
            BackendCommand::ShowStatus => "show_status",
        }
    }
}
