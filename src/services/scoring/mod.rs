//! Composite short squeeze score.
//!
//! Five sub-scores, each normalized to [0, 1] by a configurable threshold,
//! are combined with fixed weights that sum to 1.0:
//!
//! | component      | weight |
//! |----------------|--------|
//! | short interest | 0.30   |
//! | volume spike   | 0.20   |
//! | price momentum | 0.20   |
//! | RSI            | 0.15   |
//! | days to cover  | 0.15   |

pub mod metrics;

pub use metrics::extract_metrics;

use chrono::Utc;

use crate::config::ScoreThresholds;
use crate::error::PipelineError;
use crate::types::{EnrichedSeries, ScoreReport, ShortInterestSnapshot, SqueezeMetrics, SubScores};

/// Sub-score weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub short_interest: f64,
    pub volume_spike: f64,
    pub price_momentum: f64,
    pub rsi: f64,
    pub days_to_cover: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            short_interest: 0.30,
            volume_spike: 0.20,
            price_momentum: 0.20,
            rsi: 0.15,
            days_to_cover: 0.15,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.short_interest + self.volume_spike + self.price_momentum + self.rsi + self.days_to_cover
    }
}

fn unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// RSI component: 1.0 when oversold, 0.0 when overbought, linear in between.
pub fn rsi_score(rsi: f64, thresholds: &ScoreThresholds) -> f64 {
    if rsi < thresholds.rsi_oversold {
        1.0
    } else if rsi > thresholds.rsi_overbought {
        0.0
    } else {
        (thresholds.rsi_overbought - rsi) / (thresholds.rsi_overbought - thresholds.rsi_oversold)
    }
}

/// Computes sub-scores and the composite from an enriched series.
pub struct ScoreCalculator {
    thresholds: ScoreThresholds,
    weights: ScoreWeights,
}

impl ScoreCalculator {
    pub fn new(thresholds: ScoreThresholds) -> Self {
        Self {
            thresholds,
            weights: ScoreWeights::default(),
        }
    }

    pub fn thresholds(&self) -> &ScoreThresholds {
        &self.thresholds
    }

    /// Normalize each metric against its threshold.
    pub fn sub_scores(&self, metrics: &SqueezeMetrics) -> SubScores {
        let t = &self.thresholds;
        SubScores {
            short_interest: unit(metrics.short_interest / t.short_interest),
            volume_spike: unit(metrics.volume_spike / t.volume_spike),
            price_momentum: unit(metrics.price_change),
            rsi: unit(rsi_score(metrics.rsi, t)),
            days_to_cover: unit(metrics.days_to_cover / t.days_to_cover),
        }
    }

    /// Weighted sum of the sub-scores, capped at 1.0.
    pub fn composite(&self, sub: &SubScores) -> f64 {
        let w = &self.weights;
        let score = w.short_interest * sub.short_interest
            + w.volume_spike * sub.volume_spike
            + w.price_momentum * sub.price_momentum
            + w.rsi * sub.rsi
            + w.days_to_cover * sub.days_to_cover;
        score.clamp(0.0, 1.0)
    }

    /// Score one ticker. Fails with `DataInsufficient` instead of producing NaN.
    pub fn evaluate(
        &self,
        ticker: &str,
        series: &EnrichedSeries,
        snapshot: &ShortInterestSnapshot,
    ) -> Result<ScoreReport, PipelineError> {
        let metrics = extract_metrics(series, snapshot, self.thresholds.price_momentum_days)?;
        let sub_scores = self.sub_scores(&metrics);
        let score = self.composite(&sub_scores);

        if !score.is_finite() {
            return Err(PipelineError::DataInsufficient(format!(
                "non-finite score for {}",
                ticker
            )));
        }

        Ok(ScoreReport {
            ticker: ticker.to_string(),
            score,
            sub_scores,
            metrics,
            computed_at: Utc::now(),
        })
    }
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self::new(ScoreThresholds::default())
    }
}
