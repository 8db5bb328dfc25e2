//! Final result of a run

use nestbench_core::fails::{uniq_messages, ErrorSnapshot, Message, APPLICATION_ERROR_LIMIT};
use nestbench_core::score::{deducted_score, APPLICATION_PENALTY};
use serde::{Deserialize, Serialize};

/// Result document written to stdout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchResult {
    pub pass: bool,
    /// Deducted score; zero whenever the run failed
    pub score: i64,
    pub raw_score: i64,
    pub deduction: i64,
    pub messages: Vec<Message>,
    pub language: String,
}

impl BenchResult {
    /// A run that stopped before the load phase
    pub fn aborted(errors: &ErrorSnapshot, language: impl Into<String>) -> Self {
        Self {
            pass: false,
            score: 0,
            raw_score: 0,
            deduction: 0,
            messages: uniq_messages(&errors.messages),
            language: language.into(),
        }
    }

    /// Score a completed load phase. The run fails on any critical error, on
    /// reaching the application error limit, or when nothing is left after
    /// the penalty.
    pub fn evaluate(raw_score: i64, errors: &ErrorSnapshot, language: impl Into<String>) -> Self {
        let deducted = deducted_score(raw_score, errors.application);
        let pass =
            errors.critical == 0 && errors.application < APPLICATION_ERROR_LIMIT && deducted > 0;
        Self {
            pass,
            score: if pass { deducted } else { 0 },
            raw_score,
            deduction: APPLICATION_PENALTY.saturating_mul(errors.application as i64),
            messages: uniq_messages(&errors.messages),
            language: language.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Human-readable summary on stderr
    pub fn print_summary(&self) {
        let verdict = if self.pass { "PASS" } else { "FAIL" };
        eprintln!("\n═══════════════════════════════════════════════════════════════");
        eprintln!("  RESULT: {verdict}");
        eprintln!("═══════════════════════════════════════════════════════════════");
        eprintln!("  Score:      {}", self.score);
        eprintln!("  Raw score:  {}", self.raw_score);
        eprintln!("  Deduction:  {}", self.deduction);
        if !self.language.is_empty() {
            eprintln!("  Language:   {}", self.language);
        }
        if !self.messages.is_empty() {
            eprintln!("\n  Messages:");
            for message in &self.messages {
                eprintln!("    {:>5} × {}", message.count, message.text);
            }
        }
        eprintln!("═══════════════════════════════════════════════════════════════\n");
    }
}
