//! Pipeline orchestrator: fetch, enrich, score and persist every ticker.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::{Config, RetryPolicy};
use crate::error::PipelineError;
use crate::services::alerts::AlertService;
use crate::services::fetch::FetchAdapter;
use crate::services::indicators::IndicatorEngine;
use crate::services::scoring::ScoreCalculator;
use crate::services::store::{CacheMap, ResultStore};
use crate::sources::MarketDataProvider;
use crate::types::{
    CacheEntry, RunPhase, RunSummary, ScoreReport, SkippedTicker, TickerData, TickerOutcome,
};

/// Whether `lookback_days` calendar days should hold `bars_needed` daily bars,
/// assuming five trading days a week.
pub fn lookback_covers(lookback_days: i64, bars_needed: usize) -> bool {
    let trading_days = lookback_days.max(0) * 5 / 7;
    trading_days >= bars_needed as i64
}

/// What one run accumulates before it is persisted.
#[derive(Default)]
struct RunAccumulator {
    cache: CacheMap,
    reports: Vec<ScoreReport>,
    recorded: Vec<String>,
    skipped: Vec<SkippedTicker>,
}

impl RunAccumulator {
    fn skip(&mut self, ticker: &str, err: &PipelineError, fetch_failed: bool) -> TickerOutcome {
        warn!("Skipping {}: {}", ticker, err);
        self.skipped.push(SkippedTicker {
            ticker: ticker.to_string(),
            reason: err.to_string(),
            fetch_failed,
        });
        TickerOutcome::Skipped(err.kind().to_string())
    }
}

/// Drives one scoring run at a time over the configured ticker universe.
pub struct Pipeline {
    tickers: Vec<String>,
    adapter: FetchAdapter,
    retry: RetryPolicy,
    engine: IndicatorEngine,
    calculator: ScoreCalculator,
    store: Arc<ResultStore>,
    alerts: Option<Arc<AlertService>>,
    run_lock: Mutex<()>,
    phase: RwLock<RunPhase>,
    last_run: RwLock<Option<RunSummary>>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<ResultStore>,
        alerts: Option<Arc<AlertService>>,
    ) -> Self {
        let engine = IndicatorEngine::new();
        let calculator = ScoreCalculator::new(config.thresholds.clone());

        let bars_needed = engine
            .max_periods()
            .max(calculator.thresholds().price_momentum_days.saturating_add(1));
        if !lookback_covers(config.lookback_days, bars_needed) {
            warn!(
                "LOOKBACK_DAYS={} may not yield the {} bars scoring needs",
                config.lookback_days, bars_needed
            );
        }

        Self {
            tickers: config.tickers.clone(),
            adapter: FetchAdapter::new(provider, config.fetch_delay, config.lookback_days),
            retry: config.retry,
            engine,
            calculator,
            store,
            alerts,
            run_lock: Mutex::new(()),
            phase: RwLock::new(RunPhase::Idle),
            last_run: RwLock::new(None),
        }
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn provider_name(&self) -> &str {
        self.adapter.provider_name()
    }

    pub async fn phase(&self) -> RunPhase {
        self.phase.read().await.clone()
    }

    pub async fn last_run(&self) -> Option<RunSummary> {
        self.last_run.read().await.clone()
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    async fn set_phase(&self, phase: RunPhase) {
        *self.phase.write().await = phase;
    }

    /// Execute one run. Fails fast with `RunInProgress` if another run holds
    /// the lock. Per-ticker failures are recorded in the summary; only a
    /// persistence failure fails the run.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| PipelineError::RunInProgress)?;

        let started_at = Utc::now();
        info!("Starting pipeline run over {} tickers", self.tickers.len());

        let mut acc = RunAccumulator::default();
        for ticker in &self.tickers {
            let outcome = self.process_ticker(ticker, &mut acc).await;
            debug!("{} -> {:?}", ticker, outcome);
        }

        self.set_phase(RunPhase::Persisting).await;
        if let Err(e) = self.store.persist(&acc.cache, &acc.reports) {
            error!("Pipeline run failed to persist: {}", e);
            self.set_phase(RunPhase::Idle).await;
            return Err(e);
        }

        let alerts_sent = match &self.alerts {
            Some(alerts) => alerts.process(&acc.reports).await,
            None => 0,
        };

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            recorded: acc.recorded,
            skipped: acc.skipped,
            alerts_sent,
        };

        info!(
            "Pipeline run complete: {} recorded, {} skipped, {} alerts",
            summary.recorded.len(),
            summary.skipped.len(),
            summary.alerts_sent
        );

        *self.last_run.write().await = Some(summary.clone());
        self.set_phase(RunPhase::Done).await;
        Ok(summary)
    }

    /// Fetch one ticker, retrying transient provider failures with backoff.
    /// Every attempt still goes through the adapter's throttle.
    async fn fetch_with_retry(&self, ticker: &str) -> Result<TickerData, PipelineError> {
        let mut attempt = 1;
        loop {
            match self.adapter.fetch(ticker).await {
                Err(e) if e.is_retryable() && attempt < self.retry.attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Fetch attempt {}/{} for {} failed: {}; retrying in {}ms",
                        attempt,
                        self.retry.attempts,
                        ticker,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Fetching → Computing → Recorded, or Skipped on the first failure.
    async fn process_ticker(&self, ticker: &str, acc: &mut RunAccumulator) -> TickerOutcome {
        self.set_phase(RunPhase::Fetching(ticker.to_string())).await;
        let data = match self.fetch_with_retry(ticker).await {
            Ok(data) => data,
            Err(e) => return acc.skip(ticker, &e, true),
        };

        self.set_phase(RunPhase::Computing(ticker.to_string())).await;
        let series = match self.engine.enrich(data.series) {
            Ok(series) => series,
            Err(e) => return acc.skip(ticker, &e, true),
        };

        acc.cache.insert(
            ticker.to_string(),
            CacheEntry {
                ticker: ticker.to_string(),
                series: series.clone(),
                snapshot: data.snapshot,
                last_updated: Utc::now(),
            },
        );

        match self.calculator.evaluate(ticker, &series, &data.snapshot) {
            Ok(report) => {
                debug!("{} scored {:.3}", ticker, report.score);
                acc.reports.push(report);
                acc.recorded.push(ticker.to_string());
                TickerOutcome::Recorded
            }
            Err(e) => acc.skip(ticker, &e, false),
        }
    }
}
