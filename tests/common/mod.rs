//! Shared fakes for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::Notify;

use squeeze_watch::config::Config;
use squeeze_watch::error::PipelineError;
use squeeze_watch::sources::{MarketDataProvider, RawBar, RawShortInterest};

/// How the fake answers for one ticker.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// 40 bars with closes rising by one each day and flat volume.
    Rising,
    /// Provider has no rows.
    Empty,
    /// Network failure.
    Unavailable,
    /// Rising bars, but no float reported.
    NoFloat,
}

pub struct FakeProvider {
    behaviors: HashMap<String, Behavior>,
    gate: Option<Arc<Notify>>,
}

impl FakeProvider {
    pub fn new(behaviors: &[(&str, Behavior)]) -> Self {
        Self {
            behaviors: behaviors
                .iter()
                .map(|(t, b)| (t.to_string(), *b))
                .collect(),
            gate: None,
        }
    }

    /// History requests block until the gate is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn behavior(&self, ticker: &str) -> Behavior {
        self.behaviors.get(ticker).copied().unwrap_or(Behavior::Rising)
    }
}

pub fn rising_bars(count: i64) -> Vec<RawBar> {
    let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..count)
        .map(|i| {
            let close = 10.0 + i as f64;
            RawBar {
                date: first + Duration::days(i),
                open: Some(close - 0.5),
                high: Some(close + 1.0),
                low: Some(close - 1.0),
                close: Some(close),
                volume: Some(500_000),
            }
        })
        .collect()
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn daily_history(
        &self,
        ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<RawBar>, PipelineError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.behavior(ticker) {
            Behavior::Rising | Behavior::NoFloat => Ok(rising_bars(40)),
            Behavior::Empty => Ok(Vec::new()),
            Behavior::Unavailable => Err(PipelineError::ProviderUnavailable(format!(
                "connection refused for {}",
                ticker
            ))),
        }
    }

    async fn short_interest(&self, ticker: &str) -> Result<RawShortInterest, PipelineError> {
        let float_shares = match self.behavior(ticker) {
            Behavior::NoFloat => 0,
            _ => 1_000_000,
        };
        Ok(RawShortInterest {
            short_percent_of_float: Some(0.25),
            float_shares: Some(float_shares),
        })
    }
}

/// Config rooted in `dir` with no fetch delay and the given tickers.
pub fn test_config(dir: &std::path::Path, tickers: &[&str]) -> Config {
    let mut config = Config::with_data_dir(dir);
    config.tickers = tickers.iter().map(|t| t.to_string()).collect();
    config.fetch_delay = StdDuration::ZERO;
    config.retry.initial_delay = StdDuration::ZERO;
    config.alerts.threshold = 0.4;
    config.alerts.email = None;
    config
}
