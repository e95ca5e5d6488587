//! Verse insight request lifecycle.
//!
//! One lifecycle per reader screen. It issues analysis requests, folds
//! streamed fragments into [`InsightState`], and makes sure that only the most
//! recently issued request can change what is visible. Every request gets a
//! fresh [`RequestId`]; callbacks carry the id they were issued with and are
//! dropped when it no longer matches the current one. `dismiss` clears the
//! current id before touching anything else, so late callbacks can never
//! resurrect a dismissed overlay. Correctness never depends on the service
//! honouring `cancel`.

use crate::config::AppConfig;
use crate::insight::{AnalysisType, InsightSnapshot, InsightState, RequestId, VerseInsight};
use crate::observable::StateCell;
use crate::reference::VerseReference;
use crate::service::{
    AnalysisError, AnalysisRequest, AnalysisResponse, AnalysisService, AnalysisSink,
    InsightMessage,
};
use crate::store::InsightStore;
use chrono::Utc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// How long a saved insight stays on screen before it is dismissed.
    pub auto_dismiss_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            auto_dismiss_delay: Duration::from_millis(1500),
        }
    }
}

impl From<&AppConfig> for LifecycleOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            auto_dismiss_delay: Duration::from_millis(config.auto_dismiss_delay_ms),
        }
    }
}

/// Subject of the request that is currently allowed to mutate state.
#[derive(Debug, Clone)]
struct ActiveRequest {
    reference: VerseReference,
    analysis_type: AnalysisType,
}

#[derive(Debug, Clone, Copy)]
struct PendingDismiss {
    request_id: Option<RequestId>,
    due_at: Instant,
}

pub struct InsightLifecycle {
    service: Arc<dyn AnalysisService>,
    store: Arc<dyn InsightStore>,
    options: LifecycleOptions,
    inbox_tx: Sender<InsightMessage>,
    inbox_rx: Receiver<InsightMessage>,
    next_request_id: u64,
    current_request: Option<RequestId>,
    active: Option<ActiveRequest>,
    streaming_content: String,
    state: InsightState,
    pending_dismiss: Option<PendingDismiss>,
    snapshot: StateCell<InsightSnapshot>,
}

impl InsightLifecycle {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        store: Arc<dyn InsightStore>,
        options: LifecycleOptions,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel();
        Self {
            service,
            store,
            options,
            inbox_tx,
            inbox_rx,
            next_request_id: 1,
            current_request: None,
            active: None,
            streaming_content: String::new(),
            state: InsightState::Idle,
            pending_dismiss: None,
            snapshot: StateCell::new(InsightSnapshot::idle()),
        }
    }

    pub fn state(&self) -> &InsightState {
        &self.state
    }

    pub fn active_reference(&self) -> Option<&VerseReference> {
        self.active.as_ref().map(|active| &active.reference)
    }

    pub fn current_request(&self) -> Option<RequestId> {
        self.current_request
    }

    pub fn snapshot(&self) -> &InsightSnapshot {
        self.snapshot.get()
    }

    pub fn subscribe(&self) -> Receiver<InsightSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn has_pending_dismiss(&self) -> bool {
        self.pending_dismiss.is_some()
    }

    /// Issues a new analysis, superseding whatever was in flight.
    pub fn start_analysis(
        &mut self,
        reference: VerseReference,
        analysis_type: AnalysisType,
    ) -> RequestId {
        self.service.cancel();

        let request_id = self.allocate_request_id();
        if let Some(previous) = self.current_request.replace(request_id) {
            debug!(%previous, %request_id, "Superseding in-flight analysis");
        }
        self.streaming_content.clear();

        self.state = InsightState::Thinking { analysis_type };
        self.active = Some(ActiveRequest {
            reference: reference.clone(),
            analysis_type,
        });
        self.publish();

        info!(
            %request_id,
            reference = %reference,
            analysis = %analysis_type,
            "Starting verse analysis"
        );
        let translation_id = reference.translation_id.clone();
        let request = AnalysisRequest {
            request_id,
            reference,
            analysis_type,
            translation_id,
        };
        let sink = AnalysisSink::new(request_id, self.inbox_tx.clone());
        self.service.analyze(request, sink);
        request_id
    }

    /// Hides the overlay and invalidates the in-flight request.
    pub fn dismiss(&mut self) {
        self.current_request = None;
        self.service.cancel();
        self.pending_dismiss = None;

        if self.state.is_idle() && self.active.is_none() && self.streaming_content.is_empty() {
            return;
        }
        debug!(phase = self.state.phase(), "Dismissing insight overlay");
        self.state = InsightState::Idle;
        self.active = None;
        self.streaming_content.clear();
        self.publish();
    }

    /// Hands the insight to the store and schedules an auto-dismiss that only
    /// fires if no newer request has been issued by then.
    pub fn save(&mut self, insight: VerseInsight) {
        info!(
            id = insight.id(),
            reference = %insight.reference(),
            analysis = %insight.analysis_type(),
            "Saving insight"
        );
        self.store.save(insight);
        self.pending_dismiss = Some(PendingDismiss {
            request_id: self.current_request,
            due_at: Instant::now() + self.options.auto_dismiss_delay,
        });
    }

    /// Runs timers that are due. Hosts call this from their event loop.
    pub fn tick(&mut self, now: Instant) {
        let Some(pending) = self.pending_dismiss else {
            return;
        };
        if now < pending.due_at {
            return;
        }
        self.pending_dismiss = None;
        if pending.request_id == self.current_request {
            debug!("Auto-dismissing saved insight");
            self.dismiss();
        } else {
            debug!(
                saved = ?pending.request_id,
                current = ?self.current_request,
                "Skipping auto-dismiss; a newer analysis has started"
            );
        }
    }

    /// Applies every message already waiting in the inbox. Returns how many
    /// changed visible state.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.inbox_rx.try_recv() {
            if self.handle_message(message) {
                applied += 1;
            }
        }
        applied
    }

    /// Blocks up to `timeout` for one message, then drains the rest.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.inbox_rx.recv_timeout(timeout) {
            Ok(message) => usize::from(self.handle_message(message)) + self.pump(),
            Err(RecvTimeoutError::Timeout) => 0,
            // The lifecycle holds a sender itself, so the inbox cannot disconnect.
            Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Returns true when the message changed visible state.
    pub fn handle_message(&mut self, message: InsightMessage) -> bool {
        let request_id = message.request_id();
        if self.current_request != Some(request_id) {
            debug!(
                %request_id,
                current = ?self.current_request,
                "Ignoring stale analysis callback"
            );
            return false;
        }
        match message {
            InsightMessage::Token { fragment, .. } => self.on_token(request_id, &fragment),
            InsightMessage::Completed { result, .. } => self.on_completed(request_id, result),
        }
    }

    fn on_token(&mut self, request_id: RequestId, fragment: &str) -> bool {
        if !self.state.is_in_progress() {
            debug!(%request_id, phase = self.state.phase(), "Ignoring token after request finished");
            return false;
        }
        let Some(active) = &self.active else {
            return false;
        };
        self.streaming_content.push_str(fragment);
        self.state = InsightState::Streaming {
            analysis_type: active.analysis_type,
            content: self.streaming_content.clone(),
        };
        self.publish();
        true
    }

    fn on_completed(
        &mut self,
        request_id: RequestId,
        result: Result<AnalysisResponse, AnalysisError>,
    ) -> bool {
        if !self.state.is_in_progress() {
            debug!(%request_id, phase = self.state.phase(), "Ignoring duplicate completion");
            return false;
        }
        let Some(active) = self.active.clone() else {
            return false;
        };
        match result {
            Ok(response) => {
                let content = if response.content.trim().is_empty() {
                    std::mem::take(&mut self.streaming_content)
                } else {
                    response.content
                };
                let insight = VerseInsight::new(
                    active.reference,
                    active.analysis_type,
                    content,
                    response.citations,
                    Utc::now(),
                );
                info!(
                    %request_id,
                    id = insight.id(),
                    chars = insight.content().len(),
                    citations = insight.citations().len(),
                    "Verse analysis complete"
                );
                self.state = InsightState::Complete(insight);
            }
            Err(err) => {
                warn!(%request_id, "Verse analysis failed: {err}");
                self.state = InsightState::Error {
                    message: err.to_string(),
                };
            }
        }
        self.publish();
        true
    }

    fn allocate_request_id(&mut self) -> RequestId {
        let request_id = RequestId(self.next_request_id);
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        request_id
    }

    fn publish(&mut self) {
        let next = InsightSnapshot {
            revision: self.snapshot.get().revision + 1,
            state: self.state.clone(),
            reference: self.active_reference().cloned(),
        };
        self.snapshot.set(next);
        trace!(
            revision = self.snapshot.get().revision,
            phase = self.state.phase(),
            subscribers = self.snapshot.subscriber_count(),
            "Published insight snapshot"
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryInsightStore;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records requests and lets tests fire callbacks in any order.
    #[derive(Default)]
    pub(crate) struct FakeService {
        pub(crate) requests: Mutex<Vec<AnalysisRequest>>,
        sinks: Mutex<Vec<Option<AnalysisSink>>>,
        pub(crate) cancels: AtomicUsize,
    }

    impl FakeService {
        pub(crate) fn token(&self, call: usize, fragment: &str) {
            let sinks = self.sinks.lock().unwrap();
            sinks[call].as_ref().expect("call already completed").token(fragment);
        }

        pub(crate) fn complete(&self, call: usize, result: Result<AnalysisResponse, AnalysisError>) {
            let sink = self.sinks.lock().unwrap()[call]
                .take()
                .expect("call already completed");
            sink.complete(result);
        }

        pub(crate) fn cancel_count(&self) -> usize {
            self.cancels.load(Ordering::SeqCst)
        }
    }

    impl AnalysisService for FakeService {
        fn analyze(&self, request: AnalysisRequest, sink: AnalysisSink) {
            self.requests.lock().unwrap().push(request);
            self.sinks.lock().unwrap().push(Some(sink));
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn reference(verse: u32) -> VerseReference {
        VerseReference::new("KJV", "John", 3, verse, "For God so loved the world")
    }

    fn ok(content: &str) -> Result<AnalysisResponse, AnalysisError> {
        Ok(AnalysisResponse {
            content: content.to_string(),
            citations: vec!["Romans 5:8".to_string()],
        })
    }

    fn build(delay_ms: u64) -> (InsightLifecycle, Arc<FakeService>, Arc<MemoryInsightStore>) {
        let service = Arc::new(FakeService::default());
        let store = Arc::new(MemoryInsightStore::new());
        let lifecycle = InsightLifecycle::new(
            service.clone(),
            store.clone(),
            LifecycleOptions {
                auto_dismiss_delay: Duration::from_millis(delay_ms),
            },
        );
        (lifecycle, service, store)
    }

    fn completed_insight(lifecycle: &InsightLifecycle) -> VerseInsight {
        match lifecycle.state() {
            InsightState::Complete(insight) => insight.clone(),
            other => panic!("expected complete state, got {other:?}"),
        }
    }

    #[test]
    fn start_cancels_then_enters_thinking_for_reference() {
        let (mut lifecycle, service, _) = build(1500);
        lifecycle.start_analysis(reference(16), AnalysisType::ContextMeaning);

        assert_eq!(service.cancel_count(), 1);
        assert_eq!(
            lifecycle.state(),
            &InsightState::Thinking {
                analysis_type: AnalysisType::ContextMeaning
            }
        );
        assert_eq!(lifecycle.active_reference(), Some(&reference(16)));
        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].translation_id, "KJV");
        assert_eq!(requests[0].analysis_type, AnalysisType::ContextMeaning);
    }

    #[test]
    fn thinking_and_reference_are_published_together() {
        let (mut lifecycle, _, _) = build(1500);
        let rx = lifecycle.subscribe();
        lifecycle.start_analysis(reference(16), AnalysisType::ContextMeaning);
        lifecycle.start_analysis(reference(17), AnalysisType::CrossReferences);

        let snapshots: Vec<InsightSnapshot> = rx.try_iter().collect();
        assert_eq!(snapshots.len(), 3);
        for snapshot in &snapshots[1..] {
            if let InsightState::Thinking { analysis_type } = snapshot.state {
                let verse = snapshot.reference.as_ref().unwrap().verse;
                match analysis_type {
                    AnalysisType::ContextMeaning => assert_eq!(verse, 16),
                    AnalysisType::CrossReferences => assert_eq!(verse, 17),
                    other => panic!("unexpected analysis {other:?}"),
                }
            } else {
                panic!("expected thinking snapshot");
            }
        }
        assert!(snapshots.windows(2).all(|w| w[0].revision < w[1].revision));
    }

    #[test]
    fn only_the_latest_request_mutates_state() {
        let (mut lifecycle, service, _) = build(1500);
        lifecycle.start_analysis(reference(16), AnalysisType::ContextMeaning);
        lifecycle.start_analysis(reference(17), AnalysisType::CrossReferences);

        service.token(0, "stale ");
        service.complete(0, ok("stale content"));
        assert_eq!(lifecycle.pump(), 0);
        assert_eq!(
            lifecycle.state(),
            &InsightState::Thinking {
                analysis_type: AnalysisType::CrossReferences
            }
        );

        service.token(1, "fresh");
        service.complete(1, ok("fresh content"));
        assert_eq!(lifecycle.pump(), 2);
        let insight = completed_insight(&lifecycle);
        assert_eq!(insight.content(), "fresh content");
        assert_eq!(insight.reference().verse, 17);
        assert_eq!(insight.analysis_type(), AnalysisType::CrossReferences);
    }

    #[test]
    fn stale_callbacks_interleaved_with_current_ones_are_dropped() {
        let (mut lifecycle, service, _) = build(1500);
        lifecycle.start_analysis(reference(1), AnalysisType::ContextMeaning);
        lifecycle.start_analysis(reference(2), AnalysisType::ContextMeaning);

        service.token(1, "a");
        service.token(0, "X");
        service.token(1, "b");
        service.complete(0, ok("X"));
        lifecycle.pump();

        assert_eq!(
            lifecycle.state(),
            &InsightState::Streaming {
                analysis_type: AnalysisType::ContextMeaning,
                content: "ab".into()
            }
        );
    }

    #[test]
    fn request_ids_are_never_reused() {
        let (mut lifecycle, _, _) = build(1500);
        let mut seen = std::collections::HashSet::new();
        for verse in 1..=50 {
            let id = lifecycle.start_analysis(reference(verse), AnalysisType::ContextMeaning);
            assert!(seen.insert(id), "request id {id} issued twice");
            if verse % 7 == 0 {
                lifecycle.dismiss();
            }
        }
    }

    #[test]
    fn tokens_accumulate_in_order() {
        let (mut lifecycle, service, _) = build(1500);
        let rx = lifecycle.subscribe();
        lifecycle.start_analysis(reference(16), AnalysisType::HistoricalContext);
        for fragment in ["a", "b", "c"] {
            service.token(0, fragment);
        }
        assert_eq!(lifecycle.pump(), 3);

        assert_eq!(
            lifecycle.state(),
            &InsightState::Streaming {
                analysis_type: AnalysisType::HistoricalContext,
                content: "abc".into()
            }
        );
        let contents: Vec<String> = rx
            .try_iter()
            .filter_map(|snapshot| match snapshot.state {
                InsightState::Streaming { content, .. } => Some(content),
                _ => None,
            })
            .collect();
        assert_eq!(contents, vec!["a", "ab", "abc"]);
    }

    #[test]
    fn empty_fragment_still_moves_to_streaming() {
        let (mut lifecycle, service, _) = build(1500);
        let rx = lifecycle.subscribe();
        lifecycle.start_analysis(reference(16), AnalysisType::ContextMeaning);
        service.token(0, "");
        assert_eq!(lifecycle.pump(), 1);

        assert_eq!(
            lifecycle.state(),
            &InsightState::Streaming {
                analysis_type: AnalysisType::ContextMeaning,
                content: String::new()
            }
        );
        let last = rx.try_iter().last().unwrap();
        assert!(matches!(last.state, InsightState::Streaming { .. }));
    }

    #[test]
    fn completion_falls_back_to_streamed_content() {
        let (mut lifecycle, service, _) = build(1500);
        lifecycle.start_analysis(reference(16), AnalysisType::ContextMeaning);
        service.token(0, "streamed body");
        service.complete(
            0,
            Ok(AnalysisResponse {
                content: String::new(),
                citations: vec![],
            }),
        );
        lifecycle.pump();
        assert_eq!(completed_insight(&lifecycle).content(), "streamed body");
    }

    #[test]
    fn dismiss_guards_late_callbacks() {
        let (mut lifecycle, service, _) = build(1500);
        lifecycle.start_analysis(reference(16), AnalysisType::ContextMeaning);
        service.token(0, "partial");
        lifecycle.pump();

        lifecycle.dismiss();
        assert_eq!(lifecycle.current_request(), None);
        assert_eq!(lifecycle.active_reference(), None);

        service.token(0, " more");
        service.complete(0, ok("done"));
        assert_eq!(lifecycle.pump(), 0);
        assert_eq!(lifecycle.state(), &InsightState::Idle);
    }

    #[test]
    fn callbacks_queued_before_dismiss_are_dropped_after_it() {
        let (mut lifecycle, service, _) = build(1500);
        lifecycle.start_analysis(reference(16), AnalysisType::ContextMeaning);
        service.token(0, "queued");
        service.complete(0, ok("queued"));
        lifecycle.dismiss();
        assert_eq!(lifecycle.pump(), 0);
        assert_eq!(lifecycle.state(), &InsightState::Idle);
    }

    #[test]
    fn stale_auto_dismiss_does_not_clobber_newer_request() {
        let (mut lifecycle, service, store) = build(20);
        lifecycle.start_analysis(reference(16), AnalysisType::ContextMeaning);
        service.complete(0, ok("first"));
        lifecycle.pump();
        let insight = completed_insight(&lifecycle);

        lifecycle.save(insight.clone());
        assert_eq!(store.insights(), vec![insight]);

        lifecycle.start_analysis(reference(16), AnalysisType::CrossReferences);
        service.token(1, "second");
        lifecycle.pump();

        lifecycle.tick(Instant::now() + Duration::from_millis(50));
        assert!(!lifecycle.has_pending_dismiss());
        assert_eq!(
            lifecycle.state(),
            &InsightState::Streaming {
                analysis_type: AnalysisType::CrossReferences,
                content: "second".into()
            }
        );
    }

    #[test]
    fn auto_dismiss_fires_after_delay_when_not_superseded() {
        let (mut lifecycle, service, _) = build(200);
        lifecycle.start_analysis(reference(16), AnalysisType::ContextMeaning);
        service.complete(0, ok("done"));
        lifecycle.pump();
        let insight = completed_insight(&lifecycle);
        lifecycle.save(insight);

        lifecycle.tick(Instant::now());
        assert!(matches!(lifecycle.state(), InsightState::Complete(_)));
        assert!(lifecycle.has_pending_dismiss());

        lifecycle.tick(Instant::now() + Duration::from_millis(250));
        assert_eq!(lifecycle.state(), &InsightState::Idle);
        assert_eq!(lifecycle.active_reference(), None);
    }

    #[test]
    fn failure_is_terminal_and_later_tokens_are_ignored() {
        let (mut lifecycle, service, _) = build(1500);
        lifecycle.start_analysis(reference(16), AnalysisType::OriginalLanguage);
        service.complete(0, Err(AnalysisError::Transport("connection reset".into())));
        lifecycle.pump();

        let expected = InsightState::Error {
            message: "Could not reach the analysis service: connection reset".into(),
        };
        assert_eq!(lifecycle.state(), &expected);

        // The sink was consumed by `complete`; reach the inbox directly.
        lifecycle
            .inbox_tx
            .send(InsightMessage::Token {
                request_id: RequestId(1),
                fragment: "late".into(),
            })
            .unwrap();
        assert_eq!(lifecycle.pump(), 0);
        assert_eq!(lifecycle.state(), &expected);
    }

    #[test]
    fn duplicate_completion_is_ignored() {
        let (mut lifecycle, service, _) = build(1500);
        let request_id = lifecycle.start_analysis(reference(16), AnalysisType::ContextMeaning);
        service.complete(0, ok("first"));
        lifecycle.pump();
        let first = completed_insight(&lifecycle);

        assert!(!lifecycle.handle_message(InsightMessage::Completed {
            request_id,
            result: ok("second"),
        }));
        assert_eq!(completed_insight(&lifecycle), first);
    }

    #[test]
    fn dismiss_when_idle_only_cancels() {
        let (mut lifecycle, service, _) = build(1500);
        let rx = lifecycle.subscribe();
        lifecycle.dismiss();
        lifecycle.dismiss();

        assert_eq!(lifecycle.state(), &InsightState::Idle);
        assert_eq!(service.cancel_count(), 2);
        assert!(service.requests.lock().unwrap().is_empty());
        let snapshots: Vec<InsightSnapshot> = rx.try_iter().collect();
        assert_eq!(snapshots.len(), 1, "only the priming snapshot");
    }

    #[test]
    fn pump_timeout_applies_messages_from_worker_threads() {
        let (mut lifecycle, service, _) = build(1500);
        lifecycle.start_analysis(reference(16), AnalysisType::ContextMeaning);
        let worker_service = service.clone();
        let handle = std::thread::spawn(move || {
            worker_service.token(0, "from ");
            worker_service.token(0, "worker");
        });
        handle.join().unwrap();

        assert_eq!(lifecycle.pump_timeout(Duration::from_millis(100)), 2);
        assert_eq!(
            lifecycle.state(),
            &InsightState::Streaming {
                analysis_type: AnalysisType::ContextMeaning,
                content: "from worker".into()
            }
        );
    }
}
