//! Backend worker: owns the tokio runtime and the session controller, and
//! turns queued commands into controller calls.

use std::{
    path::Path,
    sync::Arc,
    thread::{self, JoinHandle},
};

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use session_core::{DispatchOutcome, HttpBackend, PendingUpload, SessionController};

use crate::{
    backend_bridge::commands::BackendCommand,
    config::Settings,
    controller::events::{UiError, UiErrorContext, UiEvent},
};

pub fn launch(
    settings: Settings,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let backend = HttpBackend::new(settings.api_base_url.clone(), settings.endpoints());
            tracing::info!(
                "backend: using api_base_url={} ask_path={}",
                backend.base_url(),
                backend.endpoints().ask
            );
            let controller =
                SessionController::new_with_backend(Arc::new(backend), settings.controller_settings());

            let mut events = controller.subscribe_events();
            let forward_tx = ui_tx.clone();
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    if let Some(evt) = UiEvent::from_session(event) {
                        let _ = forward_tx.try_send(evt);
                    }
                }
            });

            let startup = Arc::clone(&controller);
            let startup_tx = ui_tx.clone();
            tokio::spawn(async move {
                if let Err(failure) = startup.start().await {
                    let _ = startup_tx.try_send(UiEvent::Error(UiError::from_transport(
                        UiErrorContext::ListDocuments,
                        &failure,
                    )));
                }
            });

            while let Ok(cmd) = cmd_rx.recv() {
                tokio::spawn(execute(Arc::clone(&controller), cmd, ui_tx.clone()));
            }

            controller.shutdown();
        });
    })
}

async fn read_pending_upload(path: &Path) -> anyhow::Result<PendingUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.bin")
        .to_string();
    let upload = PendingUpload::new(filename, bytes);
    Ok(match mime_guess::from_path(path).first_raw() {
        Some(mime_type) => upload.with_mime_type(mime_type),
        None => upload,
    })
}

async fn select_file(controller: &SessionController, path: &Path, ui_tx: &Sender<UiEvent>) -> bool {
    match read_pending_upload(path).await {
        Ok(upload) => {
            controller.select_file(upload);
            true
        }
        Err(err) => {
            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                UiErrorContext::Upload,
                format!("{err:#}"),
            )));
            false
        }
    }
}

fn report_outcome(outcome: DispatchOutcome, context: UiErrorContext, ui_tx: &Sender<UiEvent>) {
    if let DispatchOutcome::Rejected(rejection) = outcome {
        let _ = ui_tx.try_send(UiEvent::Error(UiError::from_rejection(context, rejection)));
    }
}

async fn execute(controller: Arc<SessionController>, cmd: BackendCommand, ui_tx: Sender<UiEvent>) {
    match cmd {
        BackendCommand::SelectFile { path } => {
            select_file(&controller, &path, &ui_tx).await;
        }
        BackendCommand::Upload { path } => {
            if let Some(path) = path {
                if !select_file(&controller, &path, &ui_tx).await {
                    return;
                }
            }
            match controller.submit_upload().await {
                Ok(receipt) => {
                    if let Err(failure) = receipt.refresh {
                        let _ = ui_tx.try_send(UiEvent::Error(UiError::from_transport(
                            UiErrorContext::ListDocuments,
                            &failure,
                        )));
                    }
                }
                Err(err) => {
                    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_upload(&err)));
                }
            }
        }
        BackendCommand::RefreshDocuments => {
            if let Err(failure) = controller.refresh_documents().await {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_transport(
                    UiErrorContext::ListDocuments,
                    &failure,
                )));
            }
        }
        BackendCommand::ListDocuments => {
            let _ = ui_tx.try_send(UiEvent::DocumentsUpdated(controller.documents().to_vec()));
        }
        BackendCommand::Ask { question } => {
            let outcome = controller.ask(&question).await;
            report_outcome(outcome, UiErrorContext::Ask, &ui_tx);
        }
        BackendCommand::Summarize { document_id } => {
            let outcome = controller.summarize_document(document_id).await;
            report_outcome(outcome, UiErrorContext::Summarize, &ui_tx);
        }
        BackendCommand::CancelAgentRequest => {
            if !controller.cancel_agent_request() {
                let _ = ui_tx.try_send(UiEvent::Info("No agent request in flight".to_string()));
            }
        }
        BackendCommand::ShowHistory => {
            let _ = ui_tx.try_send(UiEvent::History(controller.transcript()));
        }
        BackendCommand::ShowStatus => {
            let _ = ui_tx.try_send(UiEvent::Status(controller.snapshot()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use crossbeam_channel::bounded;
    use session_core::{
        ControllerSettings, Operation, Rejection, TransportFailure, WorkflowBackend,
    };
    use shared::{
        domain::{ChatMessage, Document, DocumentId},
        protocol::AskResponse,
    };
    use tokio::sync::Notify;

    use super::*;

    #[derive(Default)]
    struct HeldAskBackend {
        release: Notify,
        ask_calls: AtomicUsize,
        asked: Mutex<Vec<String>>,
    }

    fn not_scripted(operation: Operation) -> TransportFailure {
        TransportFailure::Unreachable {
            operation,
            reason: "not scripted".to_string(),
        }
    }

    #[async_trait]
    impl WorkflowBackend for HeldAskBackend {
        async fn upload_document(&self, _upload: &PendingUpload) -> Result<Document, TransportFailure> {
            Err(not_scripted(Operation::Upload))
        }

        async fn list_documents(&self) -> Result<Vec<Document>, TransportFailure> {
            Err(not_scripted(Operation::ListDocuments))
        }

        async fn ask(&self, question: &str) -> Result<AskResponse, TransportFailure> {
            self.ask_calls.fetch_add(1, Ordering::SeqCst);
            self.asked.lock().expect("asked").push(question.to_string());
            self.release.notified().await;
            Ok(AskResponse {
                answer: format!("answer to {question}"),
                sources: Vec::new(),
            })
        }

        async fn summarize(&self, _document_id: DocumentId) -> Result<String, TransportFailure> {
            Err(not_scripted(Operation::Summarize))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ask_commands_yield_one_answer_and_one_busy_rejection() {
        let backend = Arc::new(HeldAskBackend::default());
        let controller =
            SessionController::new_with_backend(backend.clone(), ControllerSettings::default());
        let (ui_tx, ui_rx) = bounded(16);

        let first = tokio::spawn(execute(
            Arc::clone(&controller),
            BackendCommand::Ask {
                question: "q1".to_string(),
            },
            ui_tx.clone(),
        ));
        let second = tokio::spawn(execute(
            Arc::clone(&controller),
            BackendCommand::Ask {
                question: "q2".to_string(),
            },
            ui_tx.clone(),
        ));

        let mut errors = Vec::new();
        for _ in 0..500 {
            errors.extend(ui_rx.try_iter().filter_map(|event| match event {
                UiEvent::Error(err) => Some(err),
                _ => None,
            }));
            if !errors.is_empty() && backend.ask_calls.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        backend.release.notify_one();
        first.await.expect("first task");
        second.await.expect("second task");
        errors.extend(ui_rx.try_iter().filter_map(|event| match event {
            UiEvent::Error(err) => Some(err),
            _ => None,
        }));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), Rejection::Busy.to_string());
        assert_eq!(errors[0].context(), UiErrorContext::Ask);

        let asked = backend.asked.lock().expect("asked").clone();
        assert_eq!(asked.len(), 1);
        let question = asked[0].clone();
        assert!(question == "q1" || question == "q2");
        assert_eq!(
            controller.transcript(),
            vec![
                ChatMessage::user(question.clone()),
                ChatMessage::agent(format!("answer to {question}")),
            ]
        );
    }
}
