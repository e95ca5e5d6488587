//! Insight model: analysis kinds, completed insights and the live overlay state.

use crate::reference::VerseReference;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ts_rs::TS;

/// Identity of one issued analysis request. Only used to detect staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category of AI commentary requested for a verse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum AnalysisType {
    ContextMeaning,
    CrossReferences,
    HistoricalContext,
    OriginalLanguage,
    PracticalApplication,
}

pub const ANALYSIS_TYPES: [AnalysisType; 5] = [
    AnalysisType::ContextMeaning,
    AnalysisType::CrossReferences,
    AnalysisType::HistoricalContext,
    AnalysisType::OriginalLanguage,
    AnalysisType::PracticalApplication,
];

impl AnalysisType {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisType::ContextMeaning => "context-meaning",
            AnalysisType::CrossReferences => "cross-references",
            AnalysisType::HistoricalContext => "historical-context",
            AnalysisType::OriginalLanguage => "original-language",
            AnalysisType::PracticalApplication => "practical-application",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            AnalysisType::ContextMeaning => "Context & Meaning",
            AnalysisType::CrossReferences => "Cross References",
            AnalysisType::HistoricalContext => "Historical Context",
            AnalysisType::OriginalLanguage => "Original Language",
            AnalysisType::PracticalApplication => "Practical Application",
        }
    }

    /// Instruction appended to the system prompt for this kind of analysis.
    pub fn instruction(self) -> &'static str {
        match self {
            AnalysisType::ContextMeaning => {
                "Explain what this verse means within its surrounding passage and the book's argument."
            }
            AnalysisType::CrossReferences => {
                "List the most relevant cross references and explain briefly how each one connects to this verse."
            }
            AnalysisType::HistoricalContext => {
                "Describe the historical, cultural and authorial setting that informs this verse."
            }
            AnalysisType::OriginalLanguage => {
                "Discuss key words of this verse in the original Hebrew, Aramaic or Greek and their range of meaning."
            }
            AnalysisType::PracticalApplication => {
                "Offer grounded, practical ways a reader might apply this verse today."
            }
        }
    }
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "context-meaning" | "context" | "meaning" => Ok(AnalysisType::ContextMeaning),
            "cross-references" | "cross-reference" | "xref" => Ok(AnalysisType::CrossReferences),
            "historical-context" | "history" => Ok(AnalysisType::HistoricalContext),
            "original-language" | "language" => Ok(AnalysisType::OriginalLanguage),
            "practical-application" | "application" => Ok(AnalysisType::PracticalApplication),
            _ => Err("unknown analysis type"),
        }
    }
}

/// Result of one completed analysis. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VerseInsight {
    id: String,
    reference: VerseReference,
    analysis_type: AnalysisType,
    content: String,
    citations: Vec<String>,
    created_at: DateTime<Utc>,
}

impl VerseInsight {
    pub fn new(
        reference: VerseReference,
        analysis_type: AnalysisType,
        content: String,
        citations: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let id = insight_id(&reference, analysis_type, created_at);
        Self {
            id,
            reference,
            analysis_type,
            content,
            citations,
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn reference(&self) -> &VerseReference {
        &self.reference
    }

    pub fn analysis_type(&self) -> AnalysisType {
        self.analysis_type
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn citations(&self) -> &[String] {
        &self.citations
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn insight_id(
    reference: &VerseReference,
    analysis_type: AnalysisType,
    created_at: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reference.translation_id.as_bytes());
    hasher.update(b"|");
    hasher.update(reference.book_id.as_bytes());
    hasher.update(format!("|{}:{}|", reference.chapter, reference.verse).as_bytes());
    hasher.update(analysis_type.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(created_at.to_rfc3339().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Live state of the insight overlay for one reader screen.
#[derive(Debug, Clone, PartialEq)]
pub enum InsightState {
    Idle,
    Thinking {
        analysis_type: AnalysisType,
    },
    Streaming {
        analysis_type: AnalysisType,
        content: String,
    },
    Complete(VerseInsight),
    Error {
        message: String,
    },
}

impl InsightState {
    pub fn phase(&self) -> &'static str {
        match self {
            InsightState::Idle => "idle",
            InsightState::Thinking { .. } => "thinking",
            InsightState::Streaming { .. } => "streaming",
            InsightState::Complete(_) => "complete",
            InsightState::Error { .. } => "error",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, InsightState::Idle)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            InsightState::Thinking { .. } | InsightState::Streaming { .. }
        )
    }
}

/// What observers of the lifecycle receive on every visible change.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightSnapshot {
    pub revision: u64,
    pub state: InsightState,
    pub reference: Option<VerseReference>,
}

impl InsightSnapshot {
    pub fn idle() -> Self {
        Self {
            revision: 0,
            state: InsightState::Idle,
            reference: None,
        }
    }
}
