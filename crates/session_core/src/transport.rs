//! Backend seam: the [`WorkflowBackend`] trait, its reqwest implementation and
//! the timeout/cancellation wrapper every controller call goes through.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Document, DocumentId},
    protocol::{
        AskRequest, AskResponse, DocumentListResponse, SummarizeRequest, SummarizeResponse,
        UploadResponse, UPLOAD_FILE_FIELD,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{Operation, TransportFailure},
    upload::PendingUpload,
};

#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    async fn upload_document(&self, upload: &PendingUpload) -> Result<Document, TransportFailure>;
    async fn list_documents(&self) -> Result<Vec<Document>, TransportFailure>;
    async fn ask(&self, question: &str) -> Result<AskResponse, TransportFailure>;
    async fn summarize(&self, document_id: DocumentId) -> Result<String, TransportFailure>;
}

/// Placeholder backend for a controller that has not been wired to a server.
pub struct MissingBackend;

#[async_trait]
impl WorkflowBackend for MissingBackend {
    async fn upload_document(&self, _upload: &PendingUpload) -> Result<Document, TransportFailure> {
        Err(missing(Operation::Upload))
    }

    async fn list_documents(&self) -> Result<Vec<Document>, TransportFailure> {
        Err(missing(Operation::ListDocuments))
    }

    async fn ask(&self, _question: &str) -> Result<AskResponse, TransportFailure> {
        Err(missing(Operation::Ask))
    }

    async fn summarize(&self, _document_id: DocumentId) -> Result<String, TransportFailure> {
        Err(missing(Operation::Summarize))
    }
}

fn missing(operation: Operation) -> TransportFailure {
    TransportFailure::Unreachable {
        operation,
        reason: "backend is not configured".to_string(),
    }
}

/// Endpoint paths relative to the API base url.
///
/// The question-answering route differs between deployments (`/agent` for
/// the routed agent, `/qa` for plain retrieval), so every path is overridable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPaths {
    pub upload: String,
    pub documents: String,
    pub ask: String,
    pub summarize: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            upload: "/upload".into(),
            documents: "/documents".into(),
            ask: "/agent".into(),
            summarize: "/summarize".into(),
        }
    }
}

pub struct HttpBackend {
    http: Client,
    base_url: String,
    endpoints: EndpointPaths,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, endpoints: EndpointPaths) -> Self {
        Self::with_client(Client::new(), base_url, endpoints)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>, endpoints: EndpointPaths) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            endpoints,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoints(&self) -> &EndpointPaths {
        &self.endpoints
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<T, TransportFailure> {
        request
            .send()
            .await
            .map_err(|err| TransportFailure::from_reqwest(operation, err))?
            .error_for_status()
            .map_err(|err| TransportFailure::from_reqwest(operation, err))?
            .json::<T>()
            .await
            .map_err(|err| TransportFailure::from_reqwest(operation, err))
    }
}

fn file_part(upload: &PendingUpload) -> Part {
    let part = || Part::bytes(upload.bytes.clone()).file_name(upload.filename.clone());
    match upload.mime_type.as_deref() {
        Some(mime_type) => part().mime_str(mime_type).unwrap_or_else(|err| {
            warn!(
                "upload: ignoring invalid mime type filename={} mime_type={mime_type}: {err}",
                upload.filename
            );
            part()
        }),
        None => part(),
    }
}

#[async_trait]
impl WorkflowBackend for HttpBackend {
    async fn upload_document(&self, upload: &PendingUpload) -> Result<Document, TransportFailure> {
        let form = Form::new().part(UPLOAD_FILE_FIELD, file_part(upload));
        let request = self.http.post(self.url(&self.endpoints.upload)).multipart(form);
        let document: UploadResponse = self.send_json(Operation::Upload, request).await?;
        Ok(document)
    }

    async fn list_documents(&self) -> Result<Vec<Document>, TransportFailure> {
        let request = self.http.get(self.url(&self.endpoints.documents));
        let documents: DocumentListResponse =
            self.send_json(Operation::ListDocuments, request).await?;
        Ok(documents)
    }

    async fn ask(&self, question: &str) -> Result<AskResponse, TransportFailure> {
        let request = self.http.post(self.url(&self.endpoints.ask)).json(&AskRequest {
            question: question.to_string(),
        });
        let response: AskResponse = self.send_json(Operation::Ask, request).await?;
        if !response.sources.is_empty() {
            debug!("ask: answer cites {} source(s)", response.sources.len());
        }
        Ok(response)
    }

    async fn summarize(&self, document_id: DocumentId) -> Result<String, TransportFailure> {
        let request = self
            .http
            .post(self.url(&self.endpoints.summarize))
            .json(&SummarizeRequest { document_id });
        let response: SummarizeResponse = self.send_json(Operation::Summarize, request).await?;
        Ok(response.summary)
    }
}

/// Races `call` against a timeout and a cancellation token. Whichever
/// finishes first decides the outcome; the call future is dropped otherwise.
pub async fn bounded<T, F>(
    operation: Operation,
    timeout: Duration,
    cancel: &CancellationToken,
    call: F,
) -> Result<T, TransportFailure>
where
    F: Future<Output = Result<T, TransportFailure>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportFailure::Cancelled { operation }),
        outcome = tokio::time::timeout(timeout, call) => match outcome {
            Ok(result) => result,
            Err(_) => Err(TransportFailure::TimedOut {
                operation,
                after: timeout,
            }),
        },
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
