use crate::insight::RequestId;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use tracing::debug;

/// Raised by [`CancellationToken::ensure_active`] once the owning call has
/// been cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request {request_id} cancelled at stage={stage}")]
pub struct Cancelled {
    pub request_id: RequestId,
    pub stage: &'static str,
}

/// Shared flag for one in-flight analysis call.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    request_id: RequestId,
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn for_request(request_id: RequestId) -> Self {
        Self {
            request_id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn ensure_active(&self, stage: &'static str) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled {
                request_id: self.request_id,
                stage,
            });
        }
        Ok(())
    }
}

/// Holds the token of the call currently owned by a service. Installing a new
/// token cancels the previous one.
#[derive(Debug, Default)]
pub struct CancellationSlot {
    current: Mutex<Option<CancellationToken>>,
}

impl CancellationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, request_id: RequestId) -> CancellationToken {
        let token = CancellationToken::for_request(request_id);
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = guard.replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    pub fn cancel_current(&self) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = guard.take() {
            debug!(request_id = %token.request_id(), "Cancelling in-flight analysis call");
            token.cancel();
        }
    }

    /// Drops the slot entry if it still belongs to `request_id`.
    pub fn release(&self, request_id: RequestId) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if guard.as_ref().map(CancellationToken::request_id) == Some(request_id) {
            guard.take();
        }
    }
}
