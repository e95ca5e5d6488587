//! Resume narration where the listener left off.
//!
//! The position is a plain value object persisted by [`crate::cache`]. On
//! resume the reader opens the stored chapter, waits for its content, then
//! asks the audio service to start at the stored verse.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;

/// Preferred narration voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum VoiceType {
    /// On-device speech synthesis.
    System,
    /// Neural voice from the remote TTS provider.
    #[default]
    Natural,
}

impl std::fmt::Display for VoiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            VoiceType::System => "system",
            VoiceType::Natural => "natural",
        })
    }
}

impl std::str::FromStr for VoiceType {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(VoiceType::System),
            "natural" => Ok(VoiceType::Natural),
            _ => Err("unknown voice type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AudioResumePosition {
    pub translation_id: String,
    pub book_id: String,
    pub book_name: String,
    pub chapter: u32,
    /// Zero-based index of the verse within the chapter.
    pub verse_index: usize,
    #[serde(default)]
    pub voice_type: VoiceType,
}

/// Reader navigation, as far as resume needs it.
pub trait ChapterNavigator {
    fn open_chapter(&self, translation_id: &str, book_id: &str, chapter: u32);
}

/// Narration playback, as far as resume needs it.
pub trait AudioPlayer {
    fn play_from(&self, verse_index: usize, voice_type: VoiceType);
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResumeReplay {
    #[default]
    Inactive,
    AwaitingContent(AudioResumePosition),
    Playing(AudioResumePosition),
}

impl ResumeReplay {
    pub fn begin(&mut self, position: AudioResumePosition, navigator: &dyn ChapterNavigator) {
        info!(
            translation = %position.translation_id,
            book = %position.book_name,
            chapter = position.chapter,
            verse_index = position.verse_index,
            voice = %position.voice_type,
            "Resuming narration; opening chapter"
        );
        navigator.open_chapter(&position.translation_id, &position.book_id, position.chapter);
        *self = ResumeReplay::AwaitingContent(position);
    }

    /// Returns true when playback was started.
    pub fn on_chapter_loaded(
        &mut self,
        translation_id: &str,
        book_id: &str,
        chapter: u32,
        player: &dyn AudioPlayer,
    ) -> bool {
        let ResumeReplay::AwaitingContent(position) = self else {
            return false;
        };
        let matches = position.translation_id.eq_ignore_ascii_case(translation_id)
            && position.book_id == book_id
            && position.chapter == chapter;
        if !matches {
            debug!(
                book_id,
                chapter,
                expected_book = %position.book_id,
                expected_chapter = position.chapter,
                "Loaded chapter is not the resume target; still waiting"
            );
            return false;
        }
        player.play_from(position.verse_index, position.voice_type);
        let position = position.clone();
        *self = ResumeReplay::Playing(position);
        true
    }

    pub fn cancel(&mut self) {
        if !matches!(self, ResumeReplay::Inactive) {
            debug!("Cancelled narration resume");
        }
        *self = ResumeReplay::Inactive;
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, ResumeReplay::AwaitingContent(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        opened: RefCell<Vec<(String, String, u32)>>,
        played: RefCell<Vec<(usize, VoiceType)>>,
    }

    impl ChapterNavigator for Recorder {
        fn open_chapter(&self, translation_id: &str, book_id: &str, chapter: u32) {
            self.opened
                .borrow_mut()
                .push((translation_id.to_string(), book_id.to_string(), chapter));
        }
    }

    impl AudioPlayer for Recorder {
        fn play_from(&self, verse_index: usize, voice_type: VoiceType) {
            self.played.borrow_mut().push((verse_index, voice_type));
        }
    }

    fn position() -> AudioResumePosition {
        AudioResumePosition {
            translation_id: "KJV".into(),
            book_id: "john".into(),
            book_name: "John".into(),
            chapter: 3,
            verse_index: 15,
            voice_type: VoiceType::System,
        }
    }

    #[test]
    fn replay_opens_chapter_then_plays_once_loaded() {
        let recorder = Recorder::default();
        let mut replay = ResumeReplay::default();
        replay.begin(position(), &recorder);
        assert!(replay.is_waiting());
        assert_eq!(
            recorder.opened.borrow().as_slice(),
            &[("KJV".to_string(), "john".to_string(), 3)]
        );

        assert!(replay.on_chapter_loaded("kjv", "john", 3, &recorder));
        assert_eq!(recorder.played.borrow().as_slice(), &[(15, VoiceType::System)]);
        assert_eq!(replay, ResumeReplay::Playing(position()));
    }

    #[test]
    fn replay_ignores_other_chapters_and_repeat_loads() {
        let recorder = Recorder::default();
        let mut replay = ResumeReplay::default();
        replay.begin(position(), &recorder);

        assert!(!replay.on_chapter_loaded("KJV", "john", 4, &recorder));
        assert!(replay.is_waiting());
        assert!(replay.on_chapter_loaded("KJV", "john", 3, &recorder));
        assert!(!replay.on_chapter_loaded("KJV", "john", 3, &recorder));
        assert_eq!(recorder.played.borrow().len(), 1);
    }

    #[test]
    fn cancelled_replay_never_plays() {
        let recorder = Recorder::default();
        let mut replay = ResumeReplay::default();
        replay.begin(position(), &recorder);
        replay.cancel();
        assert!(!replay.on_chapter_loaded("KJV", "john", 3, &recorder));
        assert!(recorder.played.borrow().is_empty());
    }

    #[test]
    fn voice_type_parses_and_defaults() {
        assert_eq!("System".parse::<VoiceType>().unwrap(), VoiceType::System);
        assert!("robot".parse::<VoiceType>().is_err());
        let decoded: AudioResumePosition = toml::from_str(
            "translation_id = \"KJV\"\nbook_id = \"john\"\nbook_name = \"John\"\nchapter = 1\nverse_index = 0\n",
        )
        .unwrap();
        assert_eq!(decoded.voice_type, VoiceType::Natural);
    }
}
