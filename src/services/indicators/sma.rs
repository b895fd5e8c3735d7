//! Simple Moving Average (SMA) indicators over close and volume.

use super::Indicator;
use crate::types::PriceBar;

/// Trailing simple mean over `window` values, `None` until the window fills.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for (offset, slice) in values.windows(window).enumerate() {
        out[offset + window - 1] = Some(slice.iter().sum::<f64>() / window as f64);
    }
    out
}

/// SMA (Simple Moving Average) of closing prices.
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for Sma {
    fn id(&self) -> &str {
        match self.period {
            5 => "ma5",
            20 => "ma20",
            _ => "ma",
        }
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        rolling_mean(&closes, self.period)
    }
}

/// Simple moving average of traded volume.
pub struct VolumeSma {
    period: usize,
}

impl VolumeSma {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for VolumeSma {
    fn id(&self) -> &str {
        "volume_ma"
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
        rolling_mean(&volumes, self.period)
    }
}
