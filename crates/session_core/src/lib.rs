use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::domain::{ChatMessage, Document, DocumentId};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod error;
pub mod registry;
pub mod sequencer;
pub mod transcript;
pub mod transport;
pub mod upload;

pub use error::{Operation, Rejection, TransportFailure, UploadError};
pub use registry::DocumentRegistry;
pub use sequencer::{AgentRequest, RequestSequencer, SequencerState};
pub use transcript::ChatTranscript;
pub use transport::{bounded, EndpointPaths, HttpBackend, MissingBackend, WorkflowBackend};
pub use upload::{PendingUpload, PendingUploadInfo, UploadCoordinator, UploadReceipt};

pub const ASK_FAILURE_TEXT: &str = "Error: Could not connect to the Agent.";
pub const SUMMARIZE_FAILURE_TEXT: &str = "Failed to summarize.";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub fn summarize_prompt(title: &str) -> String {
    format!("Summarize {title}")
}

pub fn summary_message(title: &str, summary: &str) -> String {
    format!("📝 **Summary of {title}:**\n\n{summary}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Bound for list, ask and summarize calls.
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    TranscriptAppended { index: usize, message: ChatMessage },
    DocumentsRefreshed(Arc<[Document]>),
    DocumentsRefreshFailed(TransportFailure),
    AgentBusyChanged(bool),
    UploadSelected(PendingUploadInfo),
    UploadStateChanged { uploading: bool },
    UploadCompleted(Document),
    UploadFailed(TransportFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Answered,
    Failed,
    Rejected(Rejection),
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub documents: Arc<[Document]>,
    pub transcript: Vec<ChatMessage>,
    pub pending_upload: Option<PendingUploadInfo>,
    pub question_input: String,
    pub uploading: bool,
    pub awaiting_agent: bool,
    pub in_flight: Option<AgentRequest>,
}

/// Owns the session state. Each sub-component holds a disjoint slice of it;
/// the controller sequences them and publishes [`SessionEvent`]s.
pub struct SessionController {
    backend: Arc<dyn WorkflowBackend>,
    settings: ControllerSettings,
    registry: DocumentRegistry,
    uploads: UploadCoordinator,
    transcript: ChatTranscript,
    sequencer: RequestSequencer,
    question_input: Mutex<String>,
    session_token: CancellationToken,
    events: broadcast::Sender<SessionEvent>,
}

/// The network half of an ask/summarize exchange. Resolving it writes the
/// single terminal transcript entry and returns the sequencer to `IDLE`; if
/// it is dropped unresolved the fixed failure text is written instead.
struct PendingExchange<'a> {
    controller: &'a SessionController,
    failure_text: &'static str,
    resolved: bool,
}

impl PendingExchange<'_> {
    fn resolve(mut self, message: ChatMessage) {
        self.resolved = true;
        self.controller.finish_exchange(message);
    }
}

impl Drop for PendingExchange<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            warn!("agent: request abandoned before resolution");
            self.controller
                .finish_exchange(ChatMessage::agent(self.failure_text));
        }
    }
}

impl SessionController {
    pub fn new(settings: ControllerSettings) -> Arc<Self> {
        Self::new_with_backend(Arc::new(MissingBackend), settings)
    }

    pub fn new_with_backend(
        backend: Arc<dyn WorkflowBackend>,
        settings: ControllerSettings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            backend,
            settings,
            registry: DocumentRegistry::new(),
            uploads: UploadCoordinator::new(),
            transcript: ChatTranscript::new(),
            sequencer: RequestSequencer::new(),
            question_input: Mutex::new(String::new()),
            session_token: CancellationToken::new(),
            events,
        })
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn input(&self) -> MutexGuard<'_, String> {
        self.question_input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Initial registry population.
    pub async fn start(&self) -> Result<usize, TransportFailure> {
        info!("session: starting, loading document list");
        self.refresh_documents().await
    }

    /// Cancels every outstanding backend call. Calls made afterwards fail
    /// immediately with [`TransportFailure::Cancelled`].
    pub fn shutdown(&self) {
        info!("session: shutting down");
        self.session_token.cancel();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            documents: self.registry.list(),
            transcript: self.transcript.snapshot(),
            pending_upload: self.uploads.pending(),
            question_input: self.question_input(),
            uploading: self.uploads.is_uploading(),
            awaiting_agent: self.awaiting_agent(),
            in_flight: self.sequencer.in_flight(),
        }
    }

    // Document registry

    pub fn documents(&self) -> Arc<[Document]> {
        self.registry.list()
    }

    pub async fn refresh_documents(&self) -> Result<usize, TransportFailure> {
        let ticket = self.registry.issue();
        let fetched = bounded(
            Operation::ListDocuments,
            self.settings.request_timeout,
            &self.session_token,
            self.backend.list_documents(),
        )
        .await;

        match fetched {
            Ok(documents) => match self.registry.replace(ticket, documents) {
                Some(applied) => {
                    info!("registry: refreshed documents count={}", applied.len());
                    let count = applied.len();
                    self.emit(SessionEvent::DocumentsRefreshed(applied));
                    Ok(count)
                }
                None => Ok(self.registry.list().len()),
            },
            Err(failure) => {
                warn!("registry: refresh failed, keeping previous list: {failure}");
                self.emit(SessionEvent::DocumentsRefreshFailed(failure.clone()));
                Err(failure)
            }
        }
    }

    // Upload coordinator

    pub fn select_file(&self, upload: PendingUpload) -> Option<PendingUploadInfo> {
        let info = upload.info();
        debug!(
            "upload: selected filename={} size_bytes={}",
            info.filename, info.size_bytes
        );
        let replaced = self.uploads.select(upload).map(|prev| prev.info());
        self.emit(SessionEvent::UploadSelected(info));
        replaced
    }

    pub fn pending_upload(&self) -> Option<PendingUploadInfo> {
        self.uploads.pending()
    }

    pub fn uploading(&self) -> bool {
        self.uploads.is_uploading()
    }

    /// Sends the pending file. On success the slot is cleared and the
    /// registry refreshed once; on failure the file stays pending for retry.
    pub async fn submit_upload(&self) -> Result<UploadReceipt, UploadError> {
        let submission = self.uploads.begin().inspect_err(|err| {
            warn!("upload: submit rejected: {err}");
        })?;
        self.emit(SessionEvent::UploadStateChanged { uploading: true });
        info!(
            "upload: submitting filename={} size_bytes={}",
            submission.upload.filename,
            submission.upload.bytes.len()
        );

        let sent = bounded(
            Operation::Upload,
            self.settings.upload_timeout,
            &self.session_token,
            self.backend.upload_document(&submission.upload),
        )
        .await;

        let document = match sent {
            Ok(document) => document,
            Err(failure) => {
                warn!(
                    "upload: failed filename={}, keeping file pending: {failure}",
                    submission.upload.filename
                );
                drop(submission.permit);
                self.emit(SessionEvent::UploadFailed(failure.clone()));
                self.emit(SessionEvent::UploadStateChanged { uploading: false });
                return Err(UploadError::Transport(failure));
            }
        };

        info!(
            "upload: stored document id={} title={}",
            document.id, document.title
        );
        self.uploads.complete(submission.selection);
        self.emit(SessionEvent::UploadCompleted(document.clone()));

        let refresh = self.refresh_documents().await;
        drop(submission.permit);
        self.emit(SessionEvent::UploadStateChanged { uploading: false });

        Ok(UploadReceipt { document, refresh })
    }

    // Chat transcript

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.snapshot()
    }

    fn append(&self, message: ChatMessage) {
        let index = self.transcript.append(message.clone());
        self.emit(SessionEvent::TranscriptAppended { index, message });
    }

    // Question input

    pub fn set_question_input(&self, text: impl Into<String>) {
        *self.input() = text.into();
    }

    pub fn question_input(&self) -> String {
        self.input().clone()
    }

    pub async fn submit_question(&self) -> DispatchOutcome {
        let question = self.question_input();
        self.ask(&question).await
    }

    // Request sequencer

    pub fn awaiting_agent(&self) -> bool {
        self.sequencer.state() == SequencerState::AwaitingResponse
    }

    pub fn sequencer_state(&self) -> SequencerState {
        self.sequencer.state()
    }

    pub fn cancel_agent_request(&self) -> bool {
        let cancelled = self.sequencer.cancel();
        if cancelled {
            info!("agent: cancelling in-flight request");
        }
        cancelled
    }

    pub async fn ask(&self, question: &str) -> DispatchOutcome {
        if question.trim().is_empty() {
            debug!("agent: ignoring empty question");
            return DispatchOutcome::Rejected(Rejection::EmptyQuestion);
        }

        let request = AgentRequest::Ask {
            question: question.to_string(),
        };
        let cancel = match self.admit(request, ChatMessage::user(question), true) {
            Ok(cancel) => cancel,
            Err(rejection) => return DispatchOutcome::Rejected(rejection),
        };
        let exchange = PendingExchange {
            controller: self,
            failure_text: ASK_FAILURE_TEXT,
            resolved: false,
        };

        info!("agent: ask dispatched chars={}", question.chars().count());
        let answered = bounded(
            Operation::Ask,
            self.settings.request_timeout,
            &cancel,
            self.backend.ask(question),
        )
        .await;

        match answered {
            Ok(response) => {
                debug!("agent: answer received sources={:?}", response.sources);
                exchange.resolve(ChatMessage::agent(response.answer));
                DispatchOutcome::Answered
            }
            Err(failure) => {
                warn!("agent: ask failed: {failure}");
                exchange.resolve(ChatMessage::agent(ASK_FAILURE_TEXT));
                DispatchOutcome::Failed
            }
        }
    }

    pub async fn summarize(&self, document_id: DocumentId, title: &str) -> DispatchOutcome {
        let request = AgentRequest::Summarize {
            document_id,
            title: title.to_string(),
        };
        let cancel = match self.admit(request, ChatMessage::user(summarize_prompt(title)), false) {
            Ok(cancel) => cancel,
            Err(rejection) => return DispatchOutcome::Rejected(rejection),
        };
        let exchange = PendingExchange {
            controller: self,
            failure_text: SUMMARIZE_FAILURE_TEXT,
            resolved: false,
        };

        info!("agent: summarize dispatched document_id={document_id}");
        let summarized = bounded(
            Operation::Summarize,
            self.settings.request_timeout,
            &cancel,
            self.backend.summarize(document_id),
        )
        .await;

        match summarized {
            Ok(summary) => {
                exchange.resolve(ChatMessage::agent(summary_message(title, &summary)));
                DispatchOutcome::Answered
            }
            Err(failure) => {
                warn!("agent: summarize failed document_id={document_id}: {failure}");
                exchange.resolve(ChatMessage::agent(SUMMARIZE_FAILURE_TEXT));
                DispatchOutcome::Failed
            }
        }
    }

    /// Summarizes a document from the current registry snapshot by id.
    pub async fn summarize_document(&self, document_id: DocumentId) -> DispatchOutcome {
        match self.registry.find(document_id) {
            Some(document) => self.summarize(document.id, &document.title).await,
            None => {
                warn!("agent: summarize rejected, unknown document_id={document_id}");
                DispatchOutcome::Rejected(Rejection::UnknownDocument(document_id))
            }
        }
    }

    /// Admits a request into the sequencer, writing the user entry (and
    /// clearing the input for asks) as part of the transition.
    fn admit(
        &self,
        request: AgentRequest,
        user_message: ChatMessage,
        clear_input: bool,
    ) -> Result<CancellationToken, Rejection> {
        let mut appended = None;
        let cancel = self
            .sequencer
            .begin(request, &self.session_token, || {
                appended = Some(self.transcript.append(user_message.clone()));
                if clear_input {
                    self.input().clear();
                }
            })
            .inspect_err(|rejection| warn!("agent: request dropped: {rejection}"))?;

        if let Some(index) = appended {
            self.emit(SessionEvent::TranscriptAppended {
                index,
                message: user_message,
            });
        }
        self.emit(SessionEvent::AgentBusyChanged(true));
        Ok(cancel)
    }

    fn finish_exchange(&self, message: ChatMessage) {
        self.append(message);
        if let Some(elapsed) = self.sequencer.finish() {
            debug!("agent: request resolved after {}ms", elapsed.as_millis());
        }
        self.emit(SessionEvent::AgentBusyChanged(false));
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
