use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use shared::domain::DocumentId;
use tokio_util::sync::CancellationToken;

use crate::error::Rejection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    AwaitingResponse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentRequest {
    Ask {
        question: String,
    },
    Summarize {
        document_id: DocumentId,
        title: String,
    },
}

struct InFlight {
    request: AgentRequest,
    cancel: CancellationToken,
    started_at: Instant,
}

/// Two-state single-flight guard for ask/summarize.
#[derive(Default)]
pub struct RequestSequencer {
    slot: Mutex<Option<InFlight>>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SequencerState {
        if self.slot().is_some() {
            SequencerState::AwaitingResponse
        } else {
            SequencerState::Idle
        }
    }

    pub fn in_flight(&self) -> Option<AgentRequest> {
        self.slot().as_ref().map(|flight| flight.request.clone())
    }

    /// Moves `IDLE -> AWAITING_RESPONSE`. `record` runs inside the same
    /// critical section before the transition, so the local half of the
    /// exchange is written exactly when the request is admitted.
    pub(crate) fn begin(
        &self,
        request: AgentRequest,
        parent: &CancellationToken,
        record: impl FnOnce(),
    ) -> Result<CancellationToken, Rejection> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Err(Rejection::Busy);
        }
        record();
        let cancel = parent.child_token();
        *slot = Some(InFlight {
            request,
            cancel: cancel.clone(),
            started_at: Instant::now(),
        });
        Ok(cancel)
    }

    /// Moves back to `IDLE`, returning how long the request was outstanding.
    pub(crate) fn finish(&self) -> Option<std::time::Duration> {
        self.slot().take().map(|flight| flight.started_at.elapsed())
    }

    pub fn cancel(&self) -> bool {
        match self.slot().as_ref() {
            Some(flight) => {
                flight.cancel.cancel();
                true
            }
            None => false,
        }
    }
}
