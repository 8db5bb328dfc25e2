//! Error taxonomy and aggregation
//!
//! Every failure a scenario observes is classified into a [`Severity`] and
//! pushed into the shared [`ErrorAggregator`]. Aggregation is append-only
//! during the run; deduplication happens once, at report time.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::BenchError;

/// Message substituted for failures the benchmarker cannot classify
pub const CONTACT_ORGANIZERS: &str = "Please contact the organizers";

/// Application errors tolerated during load before the run is failed
pub const APPLICATION_ERROR_LIMIT: usize = 10;

/// Failure severity, ascending impact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Transient network error, discounted
    Temporary,
    /// A threshold was exceeded, discounted
    Timeout,
    /// Observable business-logic defect in the target
    Application,
    /// Unexpected defect, fatal
    Critical,
}

impl Severity {
    pub fn is_trivial(self) -> bool {
        matches!(self, Severity::Temporary | Severity::Timeout)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Temporary => "temporary",
            Severity::Timeout => "timeout",
            Severity::Application => "application",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Which flow produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioLabel {
    Initialize,
    Verify,
    ChairSearch,
    EstateSearch,
    EstateNazotteSearch,
    Bot,
    ChairDraftPost,
    EstateDraftPost,
}

impl std::fmt::Display for ScenarioLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScenarioLabel::Initialize => "initialize",
            ScenarioLabel::Verify => "verify",
            ScenarioLabel::ChairSearch => "chair_search",
            ScenarioLabel::EstateSearch => "estate_search",
            ScenarioLabel::EstateNazotteSearch => "estate_nazotte_search",
            ScenarioLabel::Bot => "bot",
            ScenarioLabel::ChairDraftPost => "chair_draft_post",
            ScenarioLabel::EstateDraftPost => "estate_draft_post",
        };
        f.write_str(name)
    }
}

/// A failure observed while driving the target
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScenarioError {
    /// Failure carrying an explicit severity code
    #[error("{message}")]
    Coded { severity: Severity, message: String },

    /// A page transition took longer than a user would wait
    #[error("{step}: the user left the page after {elapsed:?}")]
    Abandoned { step: String, elapsed: Duration },

    /// The run context was cancelled; never a defect
    #[error("cancelled")]
    Cancelled,

    /// No severity code; always counted as critical
    #[error("{0}")]
    Unclassified(String),
}

impl ScenarioError {
    pub fn critical(message: impl Into<String>) -> Self {
        Self::Coded {
            severity: Severity::Critical,
            message: message.into(),
        }
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::Coded {
            severity: Severity::Application,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Coded {
            severity: Severity::Timeout,
            message: message.into(),
        }
    }

    pub fn temporary(message: impl Into<String>) -> Self {
        Self::Coded {
            severity: Severity::Temporary,
            message: message.into(),
        }
    }

    /// Classification used by callers to branch; `None` for cancellation
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Self::Coded { severity, .. } => Some(*severity),
            Self::Abandoned { .. } => Some(Severity::Timeout),
            Self::Cancelled => None,
            Self::Unclassified(_) => Some(Severity::Critical),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<BenchError> for ScenarioError {
    fn from(err: BenchError) -> Self {
        match err {
            BenchError::Cancelled => Self::Cancelled,
            other => Self::Unclassified(other.to_string()),
        }
    }
}

/// One deduplicated report line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub count: usize,
}

/// Point-in-time view of the aggregator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSnapshot {
    pub messages: Vec<String>,
    pub critical: usize,
    pub application: usize,
    pub trivial: usize,
}

#[derive(Debug, Default)]
struct AggregatorState {
    messages: Vec<String>,
    critical: usize,
    application: usize,
    trivial: usize,
    last_error_at: HashMap<ScenarioLabel, DateTime<Utc>>,
}

/// Thread-safe collector for every classified failure of a run
#[derive(Debug)]
pub struct ErrorAggregator {
    state: RwLock<AggregatorState>,
    failed: CancellationToken,
}

impl Default for ErrorAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(AggregatorState {
                messages: Vec::with_capacity(100),
                ..Default::default()
            }),
            failed: CancellationToken::new(),
        }
    }

    /// Record `err` under `label`. Cancellation is ignored.
    pub fn add(&self, err: &ScenarioError, label: ScenarioLabel) {
        let (message, severity) = match err {
            ScenarioError::Cancelled => return,
            ScenarioError::Coded { severity, message } => {
                let text = match severity {
                    Severity::Critical => format!("{message} (critical error)"),
                    Severity::Timeout => format!("{message} (timed out)"),
                    Severity::Temporary => format!("{message} (temporary error)"),
                    Severity::Application => message.clone(),
                };
                (text, *severity)
            }
            ScenarioError::Abandoned { .. } => (format!("{err} (timed out)"), Severity::Timeout),
            ScenarioError::Unclassified(_) => (CONTACT_ORGANIZERS.to_string(), Severity::Critical),
        };

        warn!(%label, %severity, error = %err, "Scenario error");

        let mut state = self.state.write();
        state.last_error_at.insert(label, Utc::now());
        match severity {
            Severity::Critical => state.critical += 1,
            Severity::Application => state.application += 1,
            Severity::Timeout | Severity::Temporary => state.trivial += 1,
        }
        state.messages.push(message);

        if state.critical > 0 || state.application >= APPLICATION_ERROR_LIMIT {
            self.failed.cancel();
        }
    }

    pub fn snapshot(&self) -> ErrorSnapshot {
        let state = self.state.read();
        ErrorSnapshot {
            messages: state.messages.clone(),
            critical: state.critical,
            application: state.application,
            trivial: state.trivial,
        }
    }

    /// When `label` last reported an error, if ever
    pub fn last_error_at(&self, label: ScenarioLabel) -> Option<DateTime<Utc>> {
        self.state.read().last_error_at.get(&label).copied()
    }

    /// Cancelled once the run can no longer pass
    pub fn fail_signal(&self) -> CancellationToken {
        self.failed.clone()
    }

    pub fn has_failed(&self) -> bool {
        self.failed.is_cancelled()
    }
}

/// Deduplicate messages into sorted `(text, count)` pairs
pub fn uniq_messages(messages: &[String]) -> Vec<Message> {
    let mut sorted: Vec<&str> = messages.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut uniq: Vec<Message> = Vec::new();
    for text in sorted {
        match uniq.last_mut() {
            Some(last) if last.text == text => last.count += 1,
            _ => uniq.push(Message {
                text: text.to_string(),
                count: 1,
            }),
        }
    }
    uniq
}
