use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Mutex, MutexGuard, PoisonError,
};

use shared::domain::Document;

use crate::error::{TransportFailure, UploadError};

/// A local file waiting to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl PendingUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: None,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn info(&self) -> PendingUploadInfo {
        PendingUploadInfo {
            filename: self.filename.clone(),
            size_bytes: self.bytes.len() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUploadInfo {
    pub filename: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub document: Document,
    /// Outcome of the registry refresh that follows every successful upload.
    pub refresh: Result<usize, TransportFailure>,
}

struct StagedUpload {
    selection: u64,
    upload: PendingUpload,
}

/// Owns the single pending-file slot and the `uploading` flag.
#[derive(Default)]
pub struct UploadCoordinator {
    pending: Mutex<Option<StagedUpload>>,
    selections: AtomicU64,
    in_flight: AtomicBool,
}

/// Held for the duration of one submission; releases the `uploading` flag on drop.
pub(crate) struct UploadPermit<'a> {
    in_flight: &'a AtomicBool,
}

impl Drop for UploadPermit<'_> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

pub(crate) struct Submission<'a> {
    pub permit: UploadPermit<'a>,
    pub selection: u64,
    pub upload: PendingUpload,
}

impl UploadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<StagedUpload>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `upload` as the pending file, returning the one it replaced.
    pub fn select(&self, upload: PendingUpload) -> Option<PendingUpload> {
        let selection = self.selections.fetch_add(1, Ordering::AcqRel) + 1;
        self.slot()
            .replace(StagedUpload { selection, upload })
            .map(|staged| staged.upload)
    }

    pub fn pending(&self) -> Option<PendingUploadInfo> {
        self.slot().as_ref().map(|staged| staged.upload.info())
    }

    pub fn is_uploading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claims the in-flight flag and copies out the pending file. Rejected
    /// (never queued) when a submission is already running.
    pub(crate) fn begin(&self) -> Result<Submission<'_>, UploadError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(UploadError::AlreadyInFlight);
        }
        let permit = UploadPermit {
            in_flight: &self.in_flight,
        };

        let slot = self.slot();
        let Some(staged) = slot.as_ref() else {
            return Err(UploadError::NothingPending);
        };
        Ok(Submission {
            permit,
            selection: staged.selection,
            upload: staged.upload.clone(),
        })
    }

    /// Clears the slot if it still holds the submitted selection. A file
    /// picked while the upload was running stays pending.
    pub(crate) fn complete(&self, selection: u64) -> bool {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|staged| staged.selection == selection) {
            slot.take();
            true
        } else {
            false
        }
    }
}
