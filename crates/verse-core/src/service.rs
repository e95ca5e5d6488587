//! Boundary with the external AI analysis service.
//!
//! The service runs wherever it likes (worker thread, HTTP client, test fake)
//! and reports back through an [`AnalysisSink`]. The sink tags every callback
//! with the request id captured when the call was issued and forwards it into
//! the owning lifecycle's inbox, so state is only ever touched on the owner's
//! thread.

use crate::insight::{AnalysisType, RequestId};
use crate::reference::VerseReference;
use std::sync::mpsc::Sender;
use tracing::trace;

/// Everything the service needs to run one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub request_id: RequestId,
    pub reference: VerseReference,
    pub analysis_type: AnalysisType,
    pub translation_id: String,
}

/// Final payload of a successful analysis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisResponse {
    pub content: String,
    pub citations: Vec<String>,
}

/// Failure reported by the analysis service. `Display` is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Could not reach the analysis service: {0}")]
    Transport(String),

    #[error("Analysis service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Analysis service sent an unreadable response: {0}")]
    Malformed(String),

    #[error("Analysis service returned no content")]
    EmptyResponse,

    #[error("No API key configured (set {0})")]
    MissingApiKey(String),

    #[error("{0}")]
    Service(String),
}

/// Messages delivered into a lifecycle inbox.
#[derive(Debug, Clone, PartialEq)]
pub enum InsightMessage {
    Token {
        request_id: RequestId,
        fragment: String,
    },
    Completed {
        request_id: RequestId,
        result: Result<AnalysisResponse, AnalysisError>,
    },
}

impl InsightMessage {
    pub fn request_id(&self) -> RequestId {
        match self {
            InsightMessage::Token { request_id, .. }
            | InsightMessage::Completed { request_id, .. } => *request_id,
        }
    }
}

/// Callback pair handed to the service for one request.
///
/// `token` may be called any number of times; `complete` consumes the sink so
/// a request can terminate at most once.
#[derive(Debug)]
pub struct AnalysisSink {
    request_id: RequestId,
    inbox: Sender<InsightMessage>,
}

impl AnalysisSink {
    pub(crate) fn new(request_id: RequestId, inbox: Sender<InsightMessage>) -> Self {
        Self { request_id, inbox }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn token(&self, fragment: &str) {
        let message = InsightMessage::Token {
            request_id: self.request_id,
            fragment: fragment.to_string(),
        };
        if self.inbox.send(message).is_err() {
            trace!(request_id = %self.request_id, "Inbox closed; dropping token");
        }
    }

    pub fn complete(self, result: Result<AnalysisResponse, AnalysisError>) {
        let message = InsightMessage::Completed {
            request_id: self.request_id,
            result,
        };
        if self.inbox.send(message).is_err() {
            trace!(request_id = %self.request_id, "Inbox closed; dropping completion");
        }
    }
}

/// External AI analysis service.
pub trait AnalysisService: Send + Sync {
    /// Starts the analysis and returns immediately.
    fn analyze(&self, request: AnalysisRequest, sink: AnalysisSink);

    /// Best-effort cancellation of whatever call is in flight.
    fn cancel(&self);
}
