//! Input parsing and command orchestration from console lines to the backend queue.

use std::path::PathBuf;

use crossbeam_channel::{Sender, TrySendError};
use shared::domain::DocumentId;

use crate::backend_bridge::commands::BackendCommand;

#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleInput {
    Command(BackendCommand),
    Help,
    Quit,
    Empty,
    Invalid(String),
}

pub fn parse_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ConsoleInput::Command(BackendCommand::Ask {
            question: line.to_string(),
        });
    };

    let (verb, arg) = match rest.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, arg.trim()),
        None => (rest, ""),
    };

    match (verb, arg) {
        ("help" | "h" | "?", _) => ConsoleInput::Help,
        ("quit" | "exit" | "q", _) => ConsoleInput::Quit,
        ("select", "") => ConsoleInput::Invalid("usage: /select <path>".to_string()),
        ("select", path) => ConsoleInput::Command(BackendCommand::SelectFile {
            path: PathBuf::from(path),
        }),
        ("upload", "") => ConsoleInput::Command(BackendCommand::Upload { path: None }),
        ("upload", path) => ConsoleInput::Command(BackendCommand::Upload {
            path: Some(PathBuf::from(path)),
        }),
        ("docs" | "documents", _) => ConsoleInput::Command(BackendCommand::ListDocuments),
        ("refresh", _) => ConsoleInput::Command(BackendCommand::RefreshDocuments),
        ("summarize" | "sum", raw) => match raw.parse::<i64>() {
            Ok(id) => ConsoleInput::Command(BackendCommand::Summarize {
                document_id: DocumentId(id),
            }),
            Err(_) => ConsoleInput::Invalid("usage: /summarize <document id>".to_string()),
        },
        ("cancel", _) => ConsoleInput::Command(BackendCommand::CancelAgentRequest),
        ("history", _) => ConsoleInput::Command(BackendCommand::ShowHistory),
        ("status", _) => ConsoleInput::Command(BackendCommand::ShowStatus),
        (other, _) => ConsoleInput::Invalid(format!("unknown command '/{other}'; try /help")),
    }
}

pub fn dispatch_backend_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
    status: &mut String,
) {
    let cmd_name = cmd.name();

    match cmd_tx.try_send(cmd) {
        Ok(()) => tracing::debug!(command = cmd_name, "queued console->backend command"),
        Err(TrySendError::Full(_)) => {
            tracing::warn!(command = cmd_name, "console->backend command queue is full");
            *status = "Command queue is full; please retry".to_string();
        }
        Err(TrySendError::Disconnected(_)) => {
            tracing::error!(command = cmd_name, "console->backend command queue disconnected");
            *status =
                "Backend worker disconnected (possible startup/runtime failure); restart the console"
                    .to_string();
        }
    }
}
