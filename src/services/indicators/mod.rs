//! Technical indicator implementations and the engine that annotates a series.

pub mod rsi;
pub mod sma;

pub use rsi::Rsi;
pub use sma::{rolling_mean, Sma, VolumeSma};

use tracing::debug;

use crate::error::PipelineError;
use crate::types::{EnrichedSeries, Indicators, PriceBar};

/// A causal per-bar indicator.
///
/// `compute` returns one value per input bar. The value at index `i` may only
/// depend on `bars[..=i]`.
pub trait Indicator: Send + Sync {
    /// Unique identifier for this indicator.
    fn id(&self) -> &str;

    /// Bars needed before the first defined value.
    fn min_periods(&self) -> usize;

    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>>;
}

/// Annotates a raw series with RSI(14), MA5, MA20 and the 20 bar volume MA.
pub struct IndicatorEngine {
    rsi: Rsi,
    ma_short: Sma,
    ma_long: Sma,
    volume_ma: VolumeSma,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self {
            rsi: Rsi::default(),
            ma_short: Sma::new(5),
            ma_long: Sma::new(20),
            volume_ma: VolumeSma::new(20),
        }
    }
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Longest window any indicator needs.
    pub fn max_periods(&self) -> usize {
        [
            self.rsi.min_periods(),
            self.ma_short.min_periods(),
            self.ma_long.min_periods(),
            self.volume_ma.min_periods(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Compute every indicator. Previously derived values are replaced.
    pub fn enrich(&self, series: EnrichedSeries) -> Result<EnrichedSeries, PipelineError> {
        if series.is_empty() {
            return Err(PipelineError::NoData("empty series".to_string()));
        }

        let bars = series.price_bars();
        let rsi = self.rsi.compute(&bars);
        let ma5 = self.ma_short.compute(&bars);
        let ma20 = self.ma_long.compute(&bars);
        let volume_ma20 = self.volume_ma.compute(&bars);

        let columns: [(&dyn Indicator, &[Option<f64>]); 4] = [
            (&self.rsi as &dyn Indicator, rsi.as_slice()),
            (&self.ma_short as &dyn Indicator, ma5.as_slice()),
            (&self.ma_long as &dyn Indicator, ma20.as_slice()),
            (&self.volume_ma as &dyn Indicator, volume_ma20.as_slice()),
        ];
        for (indicator, values) in columns {
            if values.last().copied().flatten().is_none() {
                debug!(
                    "{} undefined at the last bar ({} bars, needs {})",
                    indicator.id(),
                    bars.len(),
                    indicator.min_periods()
                );
            }
        }

        let indicators = (0..bars.len())
            .map(|i| Indicators {
                rsi: rsi[i],
                ma5: ma5[i],
                ma20: ma20[i],
                volume_ma20: volume_ma20[i],
            })
            .collect();

        Ok(series.with_indicators(indicators))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    fn series(closes: &[f64], volumes: &[u64]) -> EnrichedSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&close, &volume))| PriceBar {
                date: start + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume,
            })
            .collect();
        EnrichedSeries::from_bars(bars).unwrap()
    }

    #[test]
    fn test_engine_rejects_empty_series() {
        let err = IndicatorEngine::new()
            .enrich(EnrichedSeries::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoData(_)));
    }

    #[test]
    fn test_engine_keeps_length_and_fills_windows() {
        let closes: Vec<f64> = (0..25).map(|i| 10.0 + i as f64).collect();
        let enriched = IndicatorEngine::new()
            .enrich(series(&closes, &[1_000; 25]))
            .unwrap();

        assert_eq!(enriched.len(), 25);
        let bars = enriched.bars();
        assert!(bars[3].indicators.ma5.is_none());
        assert!(bars[4].indicators.ma5.is_some());
        assert!(bars[13].indicators.rsi.is_none());
        assert!(bars[14].indicators.rsi.is_some());
        assert!(bars[18].indicators.ma20.is_none());
        assert_eq!(bars[19].indicators.volume_ma20, Some(1_000.0));
        assert_eq!(bars[24].indicators.ma20, Some(24.5));
    }

    #[test]
    fn test_engine_short_series_leaves_rsi_undefined() {
        let enriched = IndicatorEngine::new()
            .enrich(series(&[1.0; 10], &[5; 10]))
            .unwrap();
        assert!(enriched.bars().iter().all(|b| b.indicators.rsi.is_none()));
    }

    #[test]
    fn test_max_periods() {
        assert_eq!(IndicatorEngine::new().max_periods(), 20);
    }

    proptest! {
        #[test]
        fn indicators_do_not_look_ahead(
            closes in proptest::collection::vec(1.0f64..500.0, 2..60),
            volumes in proptest::collection::vec(0u64..10_000_000, 60),
            cut in 0usize..60,
            bump in 0.5f64..50.0,
        ) {
            let n = closes.len();
            let cut = cut % n;
            let engine = IndicatorEngine::new();
            let before = engine.enrich(series(&closes, &volumes[..n])).unwrap();

            // Mutate everything after `cut`
            let mut changed_closes = closes.clone();
            let mut changed_volumes = volumes[..n].to_vec();
            for i in cut + 1..n {
                changed_closes[i] += bump;
                changed_volumes[i] += 1_000;
            }
            let after = engine.enrich(series(&changed_closes, &changed_volumes)).unwrap();

            for i in 0..=cut {
                prop_assert_eq!(before.bars()[i].indicators, after.bars()[i].indicators);
            }
        }
    }
}
