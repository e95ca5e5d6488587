//! On-disk locations for reader state, plus the audio resume cache.
//!
//! Everything lives under one cache directory (`.cache/` unless configured
//! otherwise). The resume position is a tiny TOML file; saved insights are a
//! JSON document owned by [`crate::store::JsonInsightStore`].

use crate::audio_resume::AudioResumePosition;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_CACHE_DIR: &str = ".cache";

pub fn insights_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("insights.json")
}

pub fn audio_resume_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("audio_resume.toml")
}

/// Load the stored resume position, if present and readable.
pub fn load_audio_resume(cache_dir: &Path) -> Option<AudioResumePosition> {
    let path = audio_resume_path(cache_dir);
    let data = fs::read_to_string(&path).ok()?;
    match toml::from_str::<AudioResumePosition>(&data) {
        Ok(position) => Some(position),
        Err(err) => {
            warn!(path = %path.display(), "Ignoring unreadable audio resume cache: {err}");
            None
        }
    }
}

/// Persist the resume position. Errors are logged and otherwise ignored so
/// playback never stalls on the cache.
pub fn save_audio_resume(cache_dir: &Path, position: &AudioResumePosition) {
    let path = audio_resume_path(cache_dir);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let contents = match toml::to_string(position) {
        Ok(contents) => contents,
        Err(err) => {
            warn!("Failed to encode audio resume position: {err}");
            return;
        }
    };
    match fs::File::create(&path).and_then(|mut file| file.write_all(contents.as_bytes())) {
        Ok(()) => debug!(
            path = %path.display(),
            book = %position.book_name,
            chapter = position.chapter,
            verse_index = position.verse_index,
            "Saved audio resume position"
        ),
        Err(err) => warn!(path = %path.display(), "Failed to save audio resume position: {err}"),
    }
}

pub fn clear_audio_resume(cache_dir: &Path) {
    let path = audio_resume_path(cache_dir);
    if path.exists() {
        if let Err(err) = fs::remove_file(&path) {
            warn!(path = %path.display(), "Failed to clear audio resume position: {err}");
        }
    }
}
