//! Maps insight state to a plain view model for whatever draws the overlay.

use crate::insight::{InsightState, VerseInsight};
use crate::reference::VerseReference;
use serde::Serialize;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OverlayPhase {
    Idle,
    Thinking,
    Streaming,
    Complete,
    Error,
}

/// User events the overlay offers in its current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OverlayAction {
    Dismiss,
    Save,
    Share,
    Retry,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct OverlayView {
    pub phase: OverlayPhase,
    pub visible: bool,
    pub title: String,
    pub subtitle: Option<String>,
    pub body: String,
    pub citations: Vec<String>,
    pub show_spinner: bool,
    pub actions: Vec<OverlayAction>,
}

impl OverlayView {
    pub fn hidden() -> Self {
        Self {
            phase: OverlayPhase::Idle,
            visible: false,
            title: String::new(),
            subtitle: None,
            body: String::new(),
            citations: Vec::new(),
            show_spinner: false,
            actions: Vec::new(),
        }
    }

    pub fn from_state(state: &InsightState, reference: Option<&VerseReference>) -> Self {
        let subtitle = reference.map(VerseReference::shareable_display);
        match state {
            InsightState::Idle => Self::hidden(),
            InsightState::Thinking { analysis_type } => Self {
                phase: OverlayPhase::Thinking,
                visible: true,
                title: analysis_type.title().to_string(),
                subtitle,
                body: String::new(),
                citations: Vec::new(),
                show_spinner: true,
                actions: vec![OverlayAction::Dismiss],
            },
            InsightState::Streaming {
                analysis_type,
                content,
            } => Self {
                phase: OverlayPhase::Streaming,
                visible: true,
                title: analysis_type.title().to_string(),
                subtitle,
                body: content.clone(),
                citations: Vec::new(),
                show_spinner: false,
                actions: vec![OverlayAction::Dismiss],
            },
            InsightState::Complete(insight) => Self {
                phase: OverlayPhase::Complete,
                visible: true,
                title: insight.analysis_type().title().to_string(),
                subtitle: Some(insight.reference().shareable_display()),
                body: insight.content().to_string(),
                citations: insight.citations().to_vec(),
                show_spinner: false,
                actions: vec![
                    OverlayAction::Save,
                    OverlayAction::Share,
                    OverlayAction::Dismiss,
                ],
            },
            InsightState::Error { message } => {
                let mut actions = Vec::with_capacity(2);
                if reference.is_some() {
                    actions.push(OverlayAction::Retry);
                }
                actions.push(OverlayAction::Dismiss);
                Self {
                    phase: OverlayPhase::Error,
                    visible: true,
                    title: "Insight unavailable".to_string(),
                    subtitle,
                    body: message.clone(),
                    citations: Vec::new(),
                    show_spinner: false,
                    actions,
                }
            }
        }
    }

    pub fn offers(&self, action: OverlayAction) -> bool {
        self.actions.contains(&action)
    }
}

/// Plain-text payload for the system share sheet.
pub fn share_text(insight: &VerseInsight) -> String {
    let reference = insight.reference();
    let mut out = String::new();
    out.push_str(&reference.shareable_display());
    if !reference.text.trim().is_empty() {
        out.push_str("\n\"");
        out.push_str(reference.text.trim());
        out.push('"');
    }
    out.push_str("\n\n");
    out.push_str(insight.analysis_type().title());
    out.push_str("\n\n");
    out.push_str(insight.content().trim());
    if !insight.citations().is_empty() {
        out.push_str("\n\nSee also: ");
        out.push_str(&insight.citations().join("; "));
    }
    out
}
