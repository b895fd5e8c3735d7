use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the pipeline currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "ticker", rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Fetching(String),
    Computing(String),
    Persisting,
    Done,
}

/// Terminal state of one ticker within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum TickerOutcome {
    Recorded,
    Skipped(String),
}

/// A ticker that did not make it into the results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: String,
    /// Whether the failure happened before any data was fetched.
    pub fetch_failed: bool,
}

/// What one completed run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub recorded: Vec<String>,
    pub skipped: Vec<SkippedTicker>,
    pub alerts_sent: usize,
}

impl RunSummary {
    pub fn skipped_reason(&self, ticker: &str) -> Option<&SkippedTicker> {
        self.skipped
            .iter()
            .find(|s| s.ticker.eq_ignore_ascii_case(ticker))
    }
}
