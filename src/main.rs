//! Entry point for the terminal verse reader.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml` (or `VERSE_READER_CONFIG`).
//! - Drive a headless reader session and print what its overlay shows.

mod cli;

use crate::cli::{Command, InsightsCommand, ResumeCommand};
use anyhow::{Context, Result, anyhow};
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};
use verse_core::audio_resume::{AudioPlayer, AudioResumePosition, ChapterNavigator, VoiceType};
use verse_core::cache;
use verse_core::config::{AppConfig, load_config};
use verse_core::insight::{AnalysisType, InsightSnapshot, InsightState};
use verse_core::lifecycle::{InsightLifecycle, LifecycleOptions};
use verse_core::openai::{AnalysisSettings, OpenAiAnalysisService};
use verse_core::reference::VerseReference;
use verse_core::session::{ReaderCommand, ReaderSession};
use verse_core::store::{InsightStore, JsonInsightStore};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const CONFIG_ENV: &str = "VERSE_READER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let command = cli::parse_args(env::args().skip(1))?;
    let config_path = env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&config_path);
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        config = %config_path.display(),
        level = %config.log_level,
        translation = %config.translation_id,
        cache_dir = %config.cache_dir,
        "Starting verse reader"
    );

    match command {
        Command::Analyze {
            reference,
            analysis_type,
            text,
            save,
        } => run_analyze(&config, &reference, analysis_type, text, save),
        Command::Insights(command) => run_insights(&config, command),
        Command::Resume(command) => run_resume(&config, command),
    }
}

/// The terminal cannot open chapters or play narration; it only reports the
/// requests a graphical host would act on.
struct TerminalHost;

impl ChapterNavigator for TerminalHost {
    fn open_chapter(&self, translation_id: &str, book_id: &str, chapter: u32) {
        info!(translation_id, book_id, chapter, "Reader asked to open chapter");
    }
}

impl AudioPlayer for TerminalHost {
    fn play_from(&self, verse_index: usize, voice_type: VoiceType) {
        info!(verse_index, voice = %voice_type, "Reader asked to start narration");
    }
}

fn run_analyze(
    config: &AppConfig,
    reference: &str,
    analysis_type: AnalysisType,
    text: Option<String>,
    save: bool,
) -> Result<()> {
    let mut reference = VerseReference::parse(reference, &config.translation_id)?;
    if let Some(text) = text {
        reference = reference.with_text(text);
    }

    let json_store = Arc::new(JsonInsightStore::open(&config.cache_dir()));
    let saved_path = json_store.path().to_path_buf();
    let store: Arc<dyn InsightStore> = json_store;
    let service = Arc::new(OpenAiAnalysisService::new(AnalysisSettings::from(config))?);
    let lifecycle = InsightLifecycle::new(service, store, LifecycleOptions::from(config));
    let host = Arc::new(TerminalHost);
    let mut session = ReaderSession::new(&config.translation_id, lifecycle, host.clone(), host);
    let snapshots = session.subscribe_insight();

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("installing Ctrl-C handler")?;
    }

    session.apply_command(ReaderCommand::ChapterLoaded {
        translation_id: reference.translation_id.clone(),
        book_name: reference.book_name.clone(),
        chapter: reference.chapter,
    });
    session.apply_command(ReaderCommand::SelectVerse {
        reference: reference.clone(),
    });
    let event = session.apply_command(ReaderCommand::StartAnalysis { analysis_type });
    let mut out = io::stdout().lock();
    writeln!(
        out,
        "{} · {}",
        event.snapshot.overlay.title,
        event.snapshot.overlay.subtitle.unwrap_or_default()
    )?;
    out.flush()?;

    let tick = Duration::from_millis(config.tick_interval_ms);
    let mut printer = StreamPrinter::default();
    let mut saved = false;
    loop {
        if interrupted.load(Ordering::SeqCst) {
            session.apply_command(ReaderCommand::DismissInsight);
            writeln!(out)?;
            warn!("Interrupted; analysis cancelled");
            return Ok(());
        }

        session.pump_timeout(tick);
        session.tick(Instant::now());
        for snapshot in snapshots.try_iter() {
            printer.render(&mut out, &snapshot)?;
        }

        let state = session.lifecycle().state();
        if let InsightState::Error { message } = state {
            return Err(anyhow!("Analysis failed: {message}"));
        }
        let complete = matches!(state, InsightState::Complete(_));
        let idle = state.is_idle();
        if complete && !save {
            return Ok(());
        }
        if complete && !saved {
            session.apply_command(ReaderCommand::SaveInsight);
            saved = true;
        }
        // Saved insights auto-dismiss; wait for that so the store is settled.
        if idle && saved {
            writeln!(out, "Saved to {}", saved_path.display())?;
            return Ok(());
        }
    }
}

/// Prints only what is new since the last snapshot.
#[derive(Default)]
struct StreamPrinter {
    shown: String,
    finished: bool,
}

impl StreamPrinter {
    fn render(&mut self, out: &mut impl Write, snapshot: &InsightSnapshot) -> io::Result<()> {
        match &snapshot.state {
            InsightState::Streaming { content, .. } => self.print_delta(out, content)?,
            InsightState::Complete(insight) if !self.finished => {
                self.print_delta(out, insight.content())?;
                writeln!(out)?;
                if !insight.citations().is_empty() {
                    writeln!(out, "\nSee also: {}", insight.citations().join("; "))?;
                }
                self.finished = true;
            }
            _ => {}
        }
        out.flush()
    }

    fn print_delta(&mut self, out: &mut impl Write, content: &str) -> io::Result<()> {
        match content.strip_prefix(self.shown.as_str()) {
            Some(rest) => write!(out, "{rest}")?,
            // Final content diverged from the stream; print it whole.
            None => write!(out, "\n{content}")?,
        }
        self.shown = content.to_string();
        Ok(())
    }
}

fn run_insights(config: &AppConfig, command: InsightsCommand) -> Result<()> {
    let store = JsonInsightStore::open(&config.cache_dir());
    let mut out = io::stdout().lock();
    match command {
        InsightsCommand::List => {
            let insights = store.insights();
            if insights.is_empty() {
                writeln!(out, "No saved insights.")?;
            }
            for insight in insights {
                let preview = insight.content().lines().next().unwrap_or_default();
                writeln!(
                    out,
                    "{}  {}  {:<20} {:<22} {}",
                    insight.id(),
                    insight.created_at().format("%Y-%m-%d %H:%M"),
                    insight.reference().short_display(),
                    insight.analysis_type().title(),
                    preview
                )?;
            }
        }
        InsightsCommand::Remove { id } => {
            if store.remove(&id) {
                writeln!(out, "Removed {id}")?;
            } else {
                return Err(anyhow!("No saved insight with id {id}"));
            }
        }
        InsightsCommand::Clear => {
            store.clear();
            writeln!(out, "Cleared saved insights")?;
        }
    }
    Ok(())
}

fn run_resume(config: &AppConfig, command: ResumeCommand) -> Result<()> {
    let cache_dir = config.cache_dir();
    let mut out = io::stdout().lock();
    match command {
        ResumeCommand::Show => match cache::load_audio_resume(&cache_dir) {
            Some(position) => writeln!(out, "{}", describe_position(&position))?,
            None => writeln!(out, "No narration position stored.")?,
        },
        ResumeCommand::Set { reference, voice } => {
            let reference = VerseReference::parse(&reference, &config.translation_id)?;
            let position = AudioResumePosition {
                translation_id: reference.translation_id,
                book_id: reference.book_id,
                book_name: reference.book_name,
                chapter: reference.chapter,
                verse_index: reference.verse.saturating_sub(1) as usize,
                voice_type: voice.unwrap_or(config.default_voice),
            };
            cache::save_audio_resume(&cache_dir, &position);
            writeln!(out, "Stored {}", describe_position(&position))?;
        }
        ResumeCommand::Clear => {
            cache::clear_audio_resume(&cache_dir);
            writeln!(out, "Cleared narration position")?;
        }
    }
    Ok(())
}

fn describe_position(position: &AudioResumePosition) -> String {
    format!(
        "{} {}:{} ({}), {} voice",
        position.book_name,
        position.chapter,
        position.verse_index + 1,
        position.translation_id,
        position.voice_type
    )
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    if env::var_os("RUST_LOG").is_some() {
        return;
    }
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    }
}
