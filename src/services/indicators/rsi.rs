//! Relative Strength Index (RSI) indicator.

use super::Indicator;
use crate::types::PriceBar;

/// RSI (Relative Strength Index) indicator.
///
/// Compares the trailing simple average of close-to-close gains with the
/// trailing simple average of losses. Values range from 0-100:
/// - Below 30: Oversold
/// - Above 70: Overbought
///
/// A window with no losses reads 100, including a completely flat window.
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// RSI from average gain and loss over a window.
    pub fn from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return 100.0;
        }
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

impl Indicator for Rsi {
    fn id(&self) -> &str {
        "rsi"
    }

    /// The first value needs `period` deltas, so `period + 1` bars.
    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        let mut out = vec![None; bars.len()];
        if self.period == 0 || bars.len() < self.min_periods() {
            return out;
        }

        // gains[i] / losses[i] describe the move into bar i + 1
        let (gains, losses): (Vec<f64>, Vec<f64>) = bars
            .windows(2)
            .map(|w| {
                let change = w[1].close - w[0].close;
                if change > 0.0 {
                    (change, 0.0)
                } else {
                    (0.0, -change)
                }
            })
            .unzip();

        let period = self.period as f64;
        for end in self.period..=gains.len() {
            let start = end - self.period;
            let avg_gain = gains[start..end].iter().sum::<f64>() / period;
            let avg_loss = losses[start..end].iter().sum::<f64>() / period;
            out[end] = Some(Self::from_averages(avg_gain, avg_loss));
        }

        out
    }
}
