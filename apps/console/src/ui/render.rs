use std::io::{self, Write};

use crossbeam_channel::Receiver;
use session_core::{AgentRequest, SessionSnapshot};
use shared::domain::{ChatMessage, ChatRole, Document};

use crate::controller::events::UiEvent;

pub const THINKING_INDICATOR: &str = "Agent is thinking...";
pub const UPLOADING_INDICATOR: &str = "Uploading...";
pub const UPLOAD_SUCCESS_TEXT: &str = "Uploaded successfully!";
pub const EMPTY_DOCUMENTS_TEXT: &str = "No documents yet.";

pub fn help_text() -> &'static str {
    "\
Commands:
  /select <path>     choose a file to upload
  /upload [path]     upload the selected (or given) file
  /docs              show the document list
  /refresh           reload the document list from the server
  /summarize <id>    ask the agent to summarize a document
  /cancel            abandon the request the agent is working on
  /history           print the whole conversation
  /status            show session state
  /help              show this help
  /quit              exit
Anything else is sent to the agent as a question."
}

pub fn human_readable_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else if value.fract() == 0.0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub fn render_message(message: &ChatMessage) -> String {
    let speaker = match message.role {
        ChatRole::User => "you",
        ChatRole::Agent => "agent",
    };
    format!("{speaker}> {}", message.content)
}

pub fn render_documents(documents: &[Document]) -> Vec<String> {
    if documents.is_empty() {
        return vec![EMPTY_DOCUMENTS_TEXT.to_string()];
    }
    documents
        .iter()
        .map(|doc| {
            format!(
                "  [{}] {} ({})",
                doc.id,
                doc.title,
                doc.created_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect()
}

pub fn render_status(snapshot: &SessionSnapshot) -> Vec<String> {
    let mut lines = vec![format!("documents: {}", snapshot.documents.len())];
    lines.push(format!("messages: {}", snapshot.transcript.len()));
    lines.push(match &snapshot.pending_upload {
        Some(info) => format!(
            "selected file: {} ({})",
            info.filename,
            human_readable_bytes(info.size_bytes)
        ),
        None => "selected file: none".to_string(),
    });
    if snapshot.uploading {
        lines.push(UPLOADING_INDICATOR.to_string());
    }
    match &snapshot.in_flight {
        Some(AgentRequest::Ask { question }) => {
            lines.push(format!("{THINKING_INDICATOR} (question: {question})"))
        }
        Some(AgentRequest::Summarize { title, .. }) => {
            lines.push(format!("{THINKING_INDICATOR} (summarizing {title})"))
        }
        None => lines.push("agent: idle".to_string()),
    }
    lines
}

pub fn render_event(event: &UiEvent) -> Vec<String> {
    match event {
        UiEvent::Info(text) => vec![text.clone()],
        UiEvent::Error(err) => {
            tracing::debug!(
                category = ?err.category(),
                context = ?err.context(),
                "ui: error event: {}",
                err.message()
            );
            vec![format!("error: {}", err.summary())]
        }
        UiEvent::TranscriptAppended(message) => vec![render_message(message)],
        UiEvent::DocumentsUpdated(documents) => {
            let mut lines = vec!["Documents:".to_string()];
            lines.extend(render_documents(documents));
            lines
        }
        UiEvent::AgentBusy(true) => vec![THINKING_INDICATOR.to_string()],
        UiEvent::AgentBusy(false) => Vec::new(),
        UiEvent::UploadSelected(info) => vec![format!(
            "Selected {} ({}); /upload to send it",
            info.filename,
            human_readable_bytes(info.size_bytes)
        )],
        UiEvent::Uploading(true) => vec![UPLOADING_INDICATOR.to_string()],
        UiEvent::Uploading(false) => Vec::new(),
        UiEvent::UploadCompleted(document) => vec![format!(
            "{UPLOAD_SUCCESS_TEXT} [{}] {}",
            document.id, document.title
        )],
        UiEvent::History(messages) if messages.is_empty() => {
            vec!["No messages yet.".to_string()]
        }
        UiEvent::History(messages) => messages.iter().map(render_message).collect(),
        UiEvent::Status(snapshot) => render_status(snapshot),
    }
}

/// Prints events until every sender is gone.
pub fn run(ui_rx: Receiver<UiEvent>) {
    let stdout = io::stdout();
    while let Ok(event) = ui_rx.recv() {
        let mut out = stdout.lock();
        for line in render_event(&event) {
            if writeln!(out, "{line}").is_err() {
                return;
            }
        }
        let _ = out.flush();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use session_core::PendingUploadInfo;
    use shared::domain::DocumentId;

    use super::*;

    fn doc(id: i64, title: &str) -> Document {
        Document {
            id: DocumentId(id),
            title: title.to_string(),
            created_at: Utc
                .with_ymd_and_hms(2024, 5, 1, 9, 30, 0)
                .single()
                .expect("valid timestamp"),
        }
    }

    #[test]
    fn formats_sizes_readably() {
        assert_eq!(human_readable_bytes(0), "0 B");
        assert_eq!(human_readable_bytes(1023), "1023 B");
        assert_eq!(human_readable_bytes(1024), "1 KB");
        assert_eq!(human_readable_bytes(1536), "1.5 KB");
    }

    #[test]
    fn empty_document_list_has_placeholder() {
        assert_eq!(render_documents(&[]), vec![EMPTY_DOCUMENTS_TEXT.to_string()]);
        let lines = render_documents(&[doc(3, "Report.pdf")]);
        assert_eq!(lines, vec!["  [3] Report.pdf (2024-05-01 09:30)".to_string()]);
    }

    #[test]
    fn busy_events_show_indicators() {
        assert_eq!(render_event(&UiEvent::AgentBusy(true)), vec![THINKING_INDICATOR]);
        assert!(render_event(&UiEvent::AgentBusy(false)).is_empty());
        assert_eq!(render_event(&UiEvent::Uploading(true)), vec![UPLOADING_INDICATOR]);
    }

    #[test]
    fn transcript_lines_name_the_speaker() {
        let lines = render_event(&UiEvent::History(vec![
            ChatMessage::user("What is X?"),
            ChatMessage::agent("X is Y."),
        ]));
        assert_eq!(lines, vec!["you> What is X?", "agent> X is Y."]);
    }

    #[test]
    fn status_reports_selection_and_in_flight_request() {
        let snapshot = SessionSnapshot {
            documents: Arc::from(vec![doc(1, "a.txt")]),
            transcript: vec![ChatMessage::user("Summarize a.txt")],
            pending_upload: Some(PendingUploadInfo {
                filename: "b.txt".to_string(),
                size_bytes: 2048,
            }),
            question_input: String::new(),
            uploading: false,
            awaiting_agent: true,
            in_flight: Some(AgentRequest::Summarize {
                document_id: DocumentId(1),
                title: "a.txt".to_string(),
            }),
        };

        let lines = render_status(&snapshot);
        assert!(lines.contains(&"selected file: b.txt (2 KB)".to_string()));
        assert!(lines.iter().any(|l| l.contains("summarizing a.txt")));
    }

    #[test]
    fn upload_completion_uses_success_text() {
        let lines = render_event(&UiEvent::UploadCompleted(doc(9, "notes.md")));
        assert_eq!(lines, vec!["Uploaded successfully! [9] notes.md"]);
    }
}
