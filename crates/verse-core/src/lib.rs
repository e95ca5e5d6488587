//! Core of the verse reader: the insight request lifecycle and the pieces the
//! reader screen wires around it.

pub mod audio_resume;
pub mod cache;
pub mod cancellation;
pub mod citations;
pub mod config;
pub mod insight;
pub mod lifecycle;
pub mod observable;
pub mod openai;
pub mod presenter;
pub mod reference;
pub mod service;
pub mod session;
pub mod store;

use std::fs;
use std::path::Path;
use ts_rs::TS;

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> Result<(), String> {
    T::export_all_to(out_dir).map_err(|err| err.to_string())
}

/// Writes TypeScript declarations for every view type a front end renders.
/// Stale `.ts` files in `out_dir` are removed first.
pub fn export_ts_bindings(out_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;

    for entry in fs::read_dir(out_dir)
        .map_err(|err| format!("Failed to list {}: {err}", out_dir.display()))?
    {
        let entry = entry.map_err(|err| format!("Failed to read entry: {err}"))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .map_err(|err| format!("Failed to remove {}: {err}", path.display()))?;
        }
    }

    export_single_type::<reference::VerseReference>(out_dir)?;
    export_single_type::<insight::VerseInsight>(out_dir)?;
    export_single_type::<presenter::OverlayView>(out_dir)?;
    export_single_type::<session::ReaderSnapshot>(out_dir)?;
    export_single_type::<audio_resume::AudioResumePosition>(out_dir)?;
    Ok(())
}
