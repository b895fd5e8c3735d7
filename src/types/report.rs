use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Human-facing metrics reported next to the score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SqueezeMetrics {
    pub short_interest: f64,
    pub days_to_cover: f64,
    pub volume_spike: f64,
    pub price_change: f64,
    pub rsi: f64,
}

/// The five normalized components of the composite score, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub short_interest: f64,
    pub volume_spike: f64,
    pub price_momentum: f64,
    pub rsi: f64,
    pub days_to_cover: f64,
}

/// One ticker's output for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub ticker: String,
    pub score: f64,
    pub sub_scores: SubScores,
    pub metrics: SqueezeMetrics,
    pub computed_at: DateTime<Utc>,
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub ticker: String,
    pub short_interest: f64,
    pub days_to_cover: f64,
    pub volume_spike: f64,
    pub price_change: f64,
    pub rsi: f64,
    pub score: f64,
}

impl From<&ScoreReport> for ResultRow {
    fn from(report: &ScoreReport) -> Self {
        Self {
            ticker: report.ticker.clone(),
            short_interest: report.metrics.short_interest,
            days_to_cover: report.metrics.days_to_cover,
            volume_spike: report.metrics.volume_spike,
            price_change: report.metrics.price_change,
            rsi: report.metrics.rsi,
            score: report.score,
        }
    }
}
