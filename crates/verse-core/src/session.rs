//! Headless reader screen: navigation state plus the insight overlay.

use crate::audio_resume::{AudioPlayer, AudioResumePosition, ChapterNavigator, ResumeReplay};
use crate::insight::{AnalysisType, InsightSnapshot, InsightState, RequestId};
use crate::lifecycle::InsightLifecycle;
use crate::presenter::{self, OverlayAction, OverlayView};
use crate::reference::VerseReference;
use serde::Serialize;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use ts_rs::TS;

/// Verse the reader keeps in view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct ScrollAnchor {
    pub book_id: String,
    pub chapter: u32,
    pub verse: u32,
    /// True while the anchor follows the insight subject.
    pub follows_insight: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct ReaderSnapshot {
    pub translation_id: String,
    pub book_name: String,
    pub chapter: u32,
    pub selected_verse: Option<u32>,
    pub scroll_anchor: Option<ScrollAnchor>,
    pub overlay: OverlayView,
    pub insight_revision: u64,
    pub resume_pending: bool,
}

#[derive(Debug, Clone)]
pub enum ReaderCommand {
    GetSnapshot,
    SelectVerse { reference: VerseReference },
    StartAnalysis { analysis_type: AnalysisType },
    RetryAnalysis,
    DismissInsight,
    SaveInsight,
    ShareInsight,
    ChapterLoaded {
        translation_id: String,
        book_name: String,
        chapter: u32,
    },
    ResumeAudio { position: AudioResumePosition },
    CancelResume,
}

impl ReaderCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetSnapshot => "reader_get_snapshot",
            Self::SelectVerse { .. } => "reader_select_verse",
            Self::StartAnalysis { .. } => "reader_start_analysis",
            Self::RetryAnalysis => "reader_retry_analysis",
            Self::DismissInsight => "reader_dismiss_insight",
            Self::SaveInsight => "reader_save_insight",
            Self::ShareInsight => "reader_share_insight",
            Self::ChapterLoaded { .. } => "reader_chapter_loaded",
            Self::ResumeAudio { .. } => "reader_resume_audio",
            Self::CancelResume => "reader_cancel_resume",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReaderEvent {
    pub action: &'static str,
    pub snapshot: ReaderSnapshot,
    /// Set by `ShareInsight` when there is a finished insight to share.
    pub share_text: Option<String>,
}

pub struct ReaderSession {
    translation_id: String,
    book_name: String,
    chapter: u32,
    selected: Option<VerseReference>,
    last_request: Option<(VerseReference, AnalysisType)>,
    lifecycle: InsightLifecycle,
    resume: ResumeReplay,
    navigator: Arc<dyn ChapterNavigator + Send + Sync>,
    player: Arc<dyn AudioPlayer + Send + Sync>,
}

impl ReaderSession {
    pub fn new(
        translation_id: impl Into<String>,
        lifecycle: InsightLifecycle,
        navigator: Arc<dyn ChapterNavigator + Send + Sync>,
        player: Arc<dyn AudioPlayer + Send + Sync>,
    ) -> Self {
        Self {
            translation_id: translation_id.into().trim().to_ascii_uppercase(),
            book_name: String::new(),
            chapter: 0,
            selected: None,
            last_request: None,
            lifecycle,
            resume: ResumeReplay::default(),
            navigator,
            player,
        }
    }

    pub fn lifecycle(&self) -> &InsightLifecycle {
        &self.lifecycle
    }

    pub fn selected(&self) -> Option<&VerseReference> {
        self.selected.as_ref()
    }

    pub fn subscribe_insight(&self) -> Receiver<InsightSnapshot> {
        self.lifecycle.subscribe()
    }

    pub fn apply_command(&mut self, command: ReaderCommand) -> ReaderEvent {
        let action = command.action();
        let mut share_text = None;
        match command {
            ReaderCommand::GetSnapshot => {}
            ReaderCommand::SelectVerse { reference } => self.select_verse(reference),
            ReaderCommand::StartAnalysis { analysis_type } => {
                self.start_analysis(analysis_type);
            }
            ReaderCommand::RetryAnalysis => {
                self.retry_analysis();
            }
            ReaderCommand::DismissInsight => self.lifecycle.dismiss(),
            ReaderCommand::SaveInsight => self.save_insight(),
            ReaderCommand::ShareInsight => share_text = self.share_insight(),
            ReaderCommand::ChapterLoaded {
                translation_id,
                book_name,
                chapter,
            } => self.chapter_loaded(&translation_id, &book_name, chapter),
            ReaderCommand::ResumeAudio { position } => {
                self.resume.begin(position, self.navigator.as_ref());
            }
            ReaderCommand::CancelResume => self.resume.cancel(),
        }
        ReaderEvent {
            action,
            snapshot: self.snapshot(),
            share_text,
        }
    }

    /// Analyzes the selected verse. Returns `None` when nothing is selected.
    pub fn start_analysis(&mut self, analysis_type: AnalysisType) -> Option<RequestId> {
        let Some(reference) = self.selected.clone() else {
            warn!(analysis = %analysis_type, "No verse selected; ignoring analysis request");
            return None;
        };
        self.last_request = Some((reference.clone(), analysis_type));
        Some(self.lifecycle.start_analysis(reference, analysis_type))
    }

    /// Re-issues the last analysis after a failure.
    pub fn retry_analysis(&mut self) -> Option<RequestId> {
        let view = self.overlay();
        if !view.offers(OverlayAction::Retry) {
            debug!(phase = self.lifecycle.state().phase(), "Retry not offered");
            return None;
        }
        let (reference, analysis_type) = self.last_request.clone()?;
        info!(reference = %reference, analysis = %analysis_type, "Retrying verse analysis");
        Some(self.lifecycle.start_analysis(reference, analysis_type))
    }

    pub fn pump(&mut self) -> usize {
        self.lifecycle.pump()
    }

    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        self.lifecycle.pump_timeout(timeout)
    }

    pub fn tick(&mut self, now: Instant) {
        self.lifecycle.tick(now);
    }

    pub fn overlay(&self) -> OverlayView {
        OverlayView::from_state(self.lifecycle.state(), self.lifecycle.active_reference())
    }

    pub fn snapshot(&self) -> ReaderSnapshot {
        ReaderSnapshot {
            translation_id: self.translation_id.clone(),
            book_name: self.book_name.clone(),
            chapter: self.chapter,
            selected_verse: self.selected.as_ref().map(|reference| reference.verse),
            scroll_anchor: self.scroll_anchor(),
            overlay: self.overlay(),
            insight_revision: self.lifecycle.snapshot().revision,
            resume_pending: self.resume.is_waiting(),
        }
    }

    fn scroll_anchor(&self) -> Option<ScrollAnchor> {
        let (reference, follows_insight) = match self.lifecycle.active_reference() {
            Some(subject) if !self.lifecycle.state().is_idle() => (subject, true),
            _ => (self.selected.as_ref()?, false),
        };
        Some(ScrollAnchor {
            book_id: reference.book_id.clone(),
            chapter: reference.chapter,
            verse: reference.verse,
            follows_insight,
        })
    }

    fn select_verse(&mut self, reference: VerseReference) {
        debug!(reference = %reference, "Selected verse");
        self.selected = Some(reference);
    }

    fn save_insight(&mut self) {
        let InsightState::Complete(insight) = self.lifecycle.state() else {
            debug!(phase = self.lifecycle.state().phase(), "Nothing to save");
            return;
        };
        let insight = insight.clone();
        self.lifecycle.save(insight);
    }

    fn share_insight(&self) -> Option<String> {
        match self.lifecycle.state() {
            InsightState::Complete(insight) => Some(presenter::share_text(insight)),
            other => {
                debug!(phase = other.phase(), "Nothing to share");
                None
            }
        }
    }

    fn chapter_loaded(&mut self, translation_id: &str, book_name: &str, chapter: u32) {
        let loaded = VerseReference::new(translation_id, book_name, chapter, 1, "");
        let book_id = loaded.book_id.clone();
        info!(
            translation = %loaded.translation_id,
            book = %loaded.book_name,
            chapter,
            "Chapter loaded"
        );
        self.translation_id = loaded.translation_id.clone();
        self.book_name = loaded.book_name.clone();
        self.chapter = chapter;

        if self
            .selected
            .as_ref()
            .is_some_and(|selected| !selected.same_chapter(translation_id, &book_id, chapter))
        {
            self.selected = None;
        }
        if self
            .lifecycle
            .active_reference()
            .is_some_and(|subject| !subject.same_chapter(translation_id, &book_id, chapter))
        {
            debug!("Insight subject left the screen; dismissing");
            self.lifecycle.dismiss();
        }
        self.resume
            .on_chapter_loaded(translation_id, &book_id, chapter, self.player.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_resume::VoiceType;
    use crate::lifecycle::LifecycleOptions;
    use crate::lifecycle::tests::{FakeService, reference};
    use crate::presenter::OverlayPhase;
    use crate::service::{AnalysisError, AnalysisResponse};
    use crate::store::{InsightStore, MemoryInsightStore};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        opened: Mutex<Vec<(String, String, u32)>>,
        played: Mutex<Vec<(usize, VoiceType)>>,
    }

    impl ChapterNavigator for Recorder {
        fn open_chapter(&self, translation_id: &str, book_id: &str, chapter: u32) {
            self.opened
                .lock()
                .unwrap()
                .push((translation_id.into(), book_id.into(), chapter));
        }
    }

    impl AudioPlayer for Recorder {
        fn play_from(&self, verse_index: usize, voice_type: VoiceType) {
            self.played.lock().unwrap().push((verse_index, voice_type));
        }
    }

    struct Harness {
        session: ReaderSession,
        service: Arc<FakeService>,
        store: Arc<MemoryInsightStore>,
        recorder: Arc<Recorder>,
    }

    fn harness() -> Harness {
        let service = Arc::new(FakeService::default());
        let store = Arc::new(MemoryInsightStore::new());
        let recorder = Arc::new(Recorder::default());
        let lifecycle = InsightLifecycle::new(
            service.clone(),
            store.clone(),
            LifecycleOptions {
                auto_dismiss_delay: Duration::from_millis(10),
            },
        );
        let mut session = ReaderSession::new("kjv", lifecycle, recorder.clone(), recorder.clone());
        session.apply_command(ReaderCommand::ChapterLoaded {
            translation_id: "KJV".into(),
            book_name: "John".into(),
            chapter: 3,
        });
        Harness {
            session,
            service,
            store,
            recorder,
        }
    }

    fn answer(content: &str) -> Result<AnalysisResponse, AnalysisError> {
        Ok(AnalysisResponse {
            content: content.into(),
            citations: vec!["1 John 4:9".into()],
        })
    }

    #[test]
    fn action_names_are_stable() {
        assert_eq!(ReaderCommand::GetSnapshot.action(), "reader_get_snapshot");
        assert_eq!(
            ReaderCommand::StartAnalysis {
                analysis_type: AnalysisType::ContextMeaning
            }
            .action(),
            "reader_start_analysis"
        );
        assert_eq!(ReaderCommand::ShareInsight.action(), "reader_share_insight");
    }

    #[test]
    fn analysis_without_selection_is_ignored() {
        let mut h = harness();
        let event = h.session.apply_command(ReaderCommand::StartAnalysis {
            analysis_type: AnalysisType::ContextMeaning,
        });
        assert_eq!(event.action, "reader_start_analysis");
        assert!(!event.snapshot.overlay.visible);
        assert!(h.service.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn scroll_anchor_follows_insight_subject_while_live() {
        let mut h = harness();
        h.session.apply_command(ReaderCommand::SelectVerse {
            reference: reference(16),
        });
        let event = h.session.apply_command(ReaderCommand::StartAnalysis {
            analysis_type: AnalysisType::CrossReferences,
        });
        assert_eq!(event.snapshot.overlay.phase, OverlayPhase::Thinking);

        let event = h.session.apply_command(ReaderCommand::SelectVerse {
            reference: reference(18),
        });
        let anchor = event.snapshot.scroll_anchor.unwrap();
        assert_eq!(anchor.verse, 16);
        assert!(anchor.follows_insight);
        assert_eq!(event.snapshot.selected_verse, Some(18));

        let event = h.session.apply_command(ReaderCommand::DismissInsight);
        let anchor = event.snapshot.scroll_anchor.unwrap();
        assert_eq!(anchor.verse, 18);
        assert!(!anchor.follows_insight);
    }

    #[test]
    fn streamed_answer_can_be_shared_and_saved() {
        let mut h = harness();
        h.session.apply_command(ReaderCommand::SelectVerse {
            reference: reference(16),
        });
        h.session.apply_command(ReaderCommand::StartAnalysis {
            analysis_type: AnalysisType::ContextMeaning,
        });
        let early = h.session.apply_command(ReaderCommand::ShareInsight);
        assert_eq!(early.share_text, None);

        h.service.token(0, "God gave ");
        h.service.complete(0, answer("God gave His Son."));
        assert_eq!(h.session.pump(), 2);

        let shared = h.session.apply_command(ReaderCommand::ShareInsight);
        let text = shared.share_text.unwrap();
        assert!(text.starts_with("John 3:16 (KJV)"));
        assert!(text.ends_with("See also: 1 John 4:9"));

        let saved = h.session.apply_command(ReaderCommand::SaveInsight);
        assert_eq!(saved.snapshot.overlay.phase, OverlayPhase::Complete);
        assert_eq!(h.store.insights().len(), 1);

        h.session.tick(Instant::now() + Duration::from_millis(50));
        let after = h.session.apply_command(ReaderCommand::GetSnapshot);
        assert!(!after.snapshot.overlay.visible);
    }

    #[test]
    fn retry_reissues_the_failed_request() {
        let mut h = harness();
        h.session.apply_command(ReaderCommand::SelectVerse {
            reference: reference(17),
        });
        h.session.apply_command(ReaderCommand::StartAnalysis {
            analysis_type: AnalysisType::HistoricalContext,
        });
        assert_eq!(h.session.retry_analysis(), None);

        h.service
            .complete(0, Err(AnalysisError::Service("rate limited".into())));
        h.session.pump();
        let failed = h.session.apply_command(ReaderCommand::GetSnapshot);
        assert!(failed.snapshot.overlay.offers(OverlayAction::Retry));

        h.session.apply_command(ReaderCommand::SelectVerse {
            reference: reference(20),
        });
        let retried = h.session.apply_command(ReaderCommand::RetryAnalysis);
        assert_eq!(retried.snapshot.overlay.phase, OverlayPhase::Thinking);
        let requests = h.service.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].reference.verse, 17);
        assert_eq!(requests[1].analysis_type, AnalysisType::HistoricalContext);
    }

    #[test]
    fn leaving_the_chapter_dismisses_the_insight() {
        let mut h = harness();
        h.session.apply_command(ReaderCommand::SelectVerse {
            reference: reference(16),
        });
        h.session.apply_command(ReaderCommand::StartAnalysis {
            analysis_type: AnalysisType::ContextMeaning,
        });
        let event = h.session.apply_command(ReaderCommand::ChapterLoaded {
            translation_id: "KJV".into(),
            book_name: "John".into(),
            chapter: 4,
        });
        assert!(!event.snapshot.overlay.visible);
        assert_eq!(event.snapshot.selected_verse, None);
        assert_eq!(event.snapshot.scroll_anchor, None);
        assert_eq!(h.session.lifecycle().current_request(), None);

        h.service.complete(0, answer("late"));
        assert_eq!(h.session.pump(), 0);
    }

    #[test]
    fn cancelled_resume_does_not_play_when_chapter_loads() {
        let mut h = harness();
        let position = AudioResumePosition {
            translation_id: "KJV".into(),
            book_id: "romans".into(),
            book_name: "Romans".into(),
            chapter: 8,
            verse_index: 27,
            voice_type: VoiceType::System,
        };
        h.session.apply_command(ReaderCommand::ResumeAudio { position });
        let event = h.session.apply_command(ReaderCommand::CancelResume);
        assert_eq!(event.action, "reader_cancel_resume");
        assert!(!event.snapshot.resume_pending);

        h.session.apply_command(ReaderCommand::ChapterLoaded {
            translation_id: "KJV".into(),
            book_name: "Romans".into(),
            chapter: 8,
        });
        assert!(h.recorder.played.lock().unwrap().is_empty());
    }

    #[test]
    fn resume_plays_once_target_chapter_loads() {
        let mut h = harness();
        let position = AudioResumePosition {
            translation_id: "KJV".into(),
            book_id: "romans".into(),
            book_name: "Romans".into(),
            chapter: 8,
            verse_index: 27,
            voice_type: VoiceType::Natural,
        };
        let event = h.session.apply_command(ReaderCommand::ResumeAudio { position });
        assert!(event.snapshot.resume_pending);
        assert_eq!(
            h.recorder.opened.lock().unwrap().as_slice(),
            &[("KJV".to_string(), "romans".to_string(), 8)]
        );

        let event = h.session.apply_command(ReaderCommand::ChapterLoaded {
            translation_id: "KJV".into(),
            book_name: "Romans".into(),
            chapter: 8,
        });
        assert!(!event.snapshot.resume_pending);
        assert_eq!(event.snapshot.book_name, "Romans");
        assert_eq!(
            h.recorder.played.lock().unwrap().as_slice(),
            &[(27, VoiceType::Natural)]
        );
    }
}
