//! Analysis service backed by an OpenAI-compatible chat completions endpoint.
//!
//! Each call runs on its own worker thread with a blocking client and streams
//! server-sent events back through the [`AnalysisSink`]. A cancelled call stops
//! reading and reports nothing.
//!
//! Cancellation is checked between stream lines. A read blocked on a silent
//! server is only released by the next line, end of stream, or the request
//! timeout, so a superseded worker can linger that long. Its output is already
//! stale by request id and never reaches the screen.

use crate::cancellation::{CancellationSlot, CancellationToken};
use crate::citations::extract_citations;
use crate::config::AppConfig;
use crate::service::{
    AnalysisError, AnalysisRequest, AnalysisResponse, AnalysisService, AnalysisSink,
};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl From<&AppConfig> for AnalysisSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            endpoint: config.analysis_endpoint.clone(),
            model: config.analysis_model.clone(),
            api_key_env: config.analysis_api_key_env.clone(),
            temperature: config.analysis_temperature,
            max_tokens: config.analysis_max_tokens,
            request_timeout: Duration::from_secs(config.analysis_request_timeout_secs),
        }
    }
}

pub struct OpenAiAnalysisService {
    client: Client,
    settings: AnalysisSettings,
    in_flight: Arc<CancellationSlot>,
}

impl OpenAiAnalysisService {
    pub fn new(settings: AnalysisSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("building HTTP client for analysis service")?;
        info!(
            endpoint = %settings.endpoint,
            model = %settings.model,
            timeout_secs = settings.request_timeout.as_secs(),
            "Configured analysis service"
        );
        Ok(Self {
            client,
            settings,
            in_flight: Arc::new(CancellationSlot::new()),
        })
    }
}

impl AnalysisService for OpenAiAnalysisService {
    fn analyze(&self, request: AnalysisRequest, sink: AnalysisSink) {
        let api_key = match std::env::var(&self.settings.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                warn!(env = %self.settings.api_key_env, "Analysis API key is not set");
                sink.complete(Err(AnalysisError::MissingApiKey(
                    self.settings.api_key_env.clone(),
                )));
                return;
            }
        };
        let token = self.in_flight.install(request.request_id);
        let client = self.client.clone();
        let settings = self.settings.clone();
        let in_flight = Arc::clone(&self.in_flight);
        std::thread::spawn(move || {
            let request_id = request.request_id;
            match run_call(&client, &settings, &api_key, &request, &token, &sink) {
                Ok(Some(response)) => sink.complete(Ok(response)),
                Ok(None) => debug!(%request_id, "Analysis call cancelled; no completion sent"),
                Err(err) => sink.complete(Err(err)),
            }
            in_flight.release(request_id);
        });
    }

    fn cancel(&self) {
        self.in_flight.cancel_current();
    }
}

/// `Ok(None)` when the call was cancelled part way.
fn run_call(
    client: &Client,
    settings: &AnalysisSettings,
    api_key: &str,
    request: &AnalysisRequest,
    token: &CancellationToken,
    sink: &AnalysisSink,
) -> Result<Option<AnalysisResponse>, AnalysisError> {
    if token.ensure_active("connect").is_err() {
        return Ok(None);
    }
    let body = request_body(settings, request);
    let response = client
        .post(&settings.endpoint)
        .bearer_auth(api_key)
        .header("Accept", "text/event-stream")
        .json(&body)
        .send()
        .map_err(|e| AnalysisError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().unwrap_or_default();
        return Err(AnalysisError::Status {
            status: status.as_u16(),
            body: truncate(&text, MAX_ERROR_BODY_CHARS),
        });
    }

    let mut content = String::new();
    for line in BufReader::new(response).lines() {
        if let Err(cancelled) = token.ensure_active("stream") {
            debug!(%cancelled, "Stopping analysis stream");
            return Ok(None);
        }
        let line = line.map_err(|e| AnalysisError::Transport(e.to_string()))?;
        match parse_event_line(&line)? {
            StreamEvent::Delta(fragment) => {
                content.push_str(&fragment);
                sink.token(&fragment);
            }
            StreamEvent::Done => break,
            StreamEvent::Skip => {}
        }
    }
    if token.ensure_active("finish").is_err() {
        return Ok(None);
    }
    if content.trim().is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    let citations = extract_citations(&content);
    Ok(Some(AnalysisResponse { content, citations }))
}

pub(crate) fn request_body(settings: &AnalysisSettings, request: &AnalysisRequest) -> Value {
    let reference = &request.reference;
    let system = format!(
        "You are a careful Bible study assistant. {} \
         Answer in concise markdown with short headings. \
         Cite any other passages as \"Book Chapter:Verse\".",
        request.analysis_type.instruction()
    );
    let mut user = format!(
        "Verse: {} ({} translation)",
        reference.short_display(),
        request.translation_id
    );
    if !reference.text.trim().is_empty() {
        user.push_str("\nText: ");
        user.push_str(reference.text.trim());
    }
    json!({
        "model": settings.model,
        "stream": true,
        "temperature": settings.temperature,
        "max_tokens": settings.max_tokens,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user },
        ],
    })
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StreamEvent {
    Delta(String),
    Done,
    Skip,
}

pub(crate) fn parse_event_line(line: &str) -> Result<StreamEvent, AnalysisError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(StreamEvent::Skip);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(StreamEvent::Skip);
    }
    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }
    let value: Value =
        serde_json::from_str(data).map_err(|e| AnalysisError::Malformed(e.to_string()))?;
    if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
        return Err(AnalysisError::Service(message.to_string()));
    }
    let fragment = value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if fragment.is_empty() {
        Ok(StreamEvent::Skip)
    } else {
        Ok(StreamEvent::Delta(fragment.to_string()))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push('…');
    out
}
