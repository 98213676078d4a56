//! Request and response bodies of the document-workflow backend.

use serde::{Deserialize, Serialize};

use crate::domain::{Document, DocumentId};

/// Body returned by `POST /upload`; the backend echoes the stored document.
pub type UploadResponse = Document;

/// Body returned by `GET /documents`.
pub type DocumentListResponse = Vec<Document>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub document_id: DocumentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

/// Multipart field name carrying the uploaded file.
pub const UPLOAD_FILE_FIELD: &str = "file";
