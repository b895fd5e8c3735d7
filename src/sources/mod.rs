//! External market data providers.

pub mod throttle;
pub mod yahoo;

pub use throttle::Throttle;
pub use yahoo::YahooFinanceClient;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::PipelineError;
use crate::types::ShortInterestSnapshot;

/// One daily row as the provider returned it. Any field may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

/// Key statistics as returned by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawShortInterest {
    pub short_percent_of_float: Option<f64>,
    pub float_shares: Option<u64>,
}

impl RawShortInterest {
    /// Missing or nonsensical figures become zero.
    pub fn into_snapshot(self) -> ShortInterestSnapshot {
        let ratio = self
            .short_percent_of_float
            .filter(|r| r.is_finite() && *r >= 0.0)
            .unwrap_or(0.0);
        ShortInterestSnapshot::new(ratio, self.float_shares.unwrap_or(0))
    }
}

/// Source of daily history and short interest for a ticker.
///
/// Implementations classify their own failures: transport problems, timeouts
/// and rate limiting are `ProviderUnavailable`; an unknown symbol is `NoData`.
/// They never retry.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Daily bars with dates in `[start, end)`.
    async fn daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, PipelineError>;

    async fn short_interest(&self, ticker: &str) -> Result<RawShortInterest, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_short_interest_defaults_to_zero() {
        let snapshot = RawShortInterest::default().into_snapshot();
        assert_eq!(snapshot, ShortInterestSnapshot::default());
    }

    #[test]
    fn test_raw_short_interest_drops_invalid_ratio() {
        let raw = RawShortInterest {
            short_percent_of_float: Some(f64::NAN),
            float_shares: Some(42),
        };
        let snapshot = raw.into_snapshot();
        assert_eq!(snapshot.short_interest_ratio, 0.0);
        assert_eq!(snapshot.float_shares, 42);
    }

    #[test]
    fn test_raw_short_interest_passes_through() {
        let raw = RawShortInterest {
            short_percent_of_float: Some(0.2154),
            float_shares: Some(51_000_000),
        };
        assert_eq!(
            raw.into_snapshot(),
            ShortInterestSnapshot::new(0.2154, 51_000_000)
        );
    }
}
