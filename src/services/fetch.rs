//! Fetch adapter: one provider call per ticker, normalized into a valid series.

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::sources::{MarketDataProvider, RawBar, Throttle};
use crate::types::{EnrichedSeries, PriceBar, ShortInterestSnapshot, TickerData};

/// Wraps a provider with rate limiting, normalization and error classification.
pub struct FetchAdapter {
    provider: Arc<dyn MarketDataProvider>,
    throttle: Throttle,
    lookback_days: i64,
}

impl FetchAdapter {
    pub fn new(provider: Arc<dyn MarketDataProvider>, fetch_delay: Duration, lookback_days: i64) -> Self {
        Self {
            provider,
            throttle: Throttle::new(fetch_delay),
            lookback_days,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// History window for a given day: ends (exclusive) yesterday.
    pub fn window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let end = today - ChronoDuration::days(1);
        let start = end - ChronoDuration::days(self.lookback_days);
        (start, end)
    }

    /// Fetch one ticker. Returns a populated series or an error, never a
    /// partially malformed series. Does not retry.
    pub async fn fetch(&self, ticker: &str) -> Result<TickerData, PipelineError> {
        self.throttle.wait().await;

        let (start, end) = self.window(Utc::now().date_naive());
        debug!(
            "Fetching {} from {} ({} to {})",
            ticker,
            self.provider.name(),
            start,
            end
        );

        let raw = self.provider.daily_history(ticker, start, end).await?;
        let bars = normalize_bars(raw);
        if bars.is_empty() {
            return Err(PipelineError::NoData(ticker.to_string()));
        }

        let series = EnrichedSeries::from_bars(bars)
            .map_err(|e| PipelineError::NoData(format!("{}: {}", ticker, e)))?;

        let snapshot = match self.provider.short_interest(ticker).await {
            Ok(raw) => raw.into_snapshot(),
            Err(e) => {
                warn!("Could not fetch short interest for {}: {}", ticker, e);
                ShortInterestSnapshot::default()
            }
        };

        debug!(
            "Fetched {} bars for {} (short interest {:.2}%, float {})",
            series.len(),
            ticker,
            snapshot.short_interest_ratio * 100.0,
            snapshot.float_shares
        );

        Ok(TickerData {
            ticker: ticker.to_string(),
            series,
            snapshot,
        })
    }
}

/// Drop rows without a usable close, fill missing prices from the close,
/// sort by date and keep the last row for each date.
pub fn normalize_bars(raw: Vec<RawBar>) -> Vec<PriceBar> {
    let mut bars: Vec<PriceBar> = raw
        .into_iter()
        .filter_map(|r| {
            let close = r.close.filter(|c| c.is_finite() && *c > 0.0)?;
            let price = |v: Option<f64>| v.filter(|p| p.is_finite() && *p >= 0.0).unwrap_or(close);
            Some(PriceBar {
                date: r.date,
                open: price(r.open),
                high: price(r.high),
                low: price(r.low),
                close,
                volume: r.volume.unwrap_or(0),
            })
        })
        .collect();

    bars.sort_by_key(|b| b.date);

    let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match deduped.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => deduped.push(bar),
        }
    }
    deduped
}
