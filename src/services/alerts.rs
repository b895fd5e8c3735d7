//! Best-effort squeeze alerts with 24 hour de-duplication.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::AlertConfig;
use crate::error::PipelineError;
use crate::services::store::write_atomic;
use crate::types::{AlertRecord, ScoreReport};

/// How long a ticker stays quiet after an alert.
pub const SUPPRESSION_WINDOW_HOURS: i64 = 24;

/// Errors from an alert transport.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Delivery channel for a formatted alert.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AlertError>;
    fn name(&self) -> &str;
}

/// Plain-text alert body.
pub fn format_alert_message(report: &ScoreReport) -> String {
    let m = &report.metrics;
    let mut message = format!("🚨 Short Squeeze Alert for {} 🚨\n\n", report.ticker);
    message.push_str(&format!("Short Squeeze Score: {:.2}\n", report.score));
    message.push_str(&format!("Short Interest: {:.2}%\n", m.short_interest * 100.0));
    message.push_str(&format!("Days to Cover: {:.1}\n", m.days_to_cover));
    message.push_str(&format!("Volume Spike: {:.1}x\n", m.volume_spike));
    message.push_str(&format!("Price Change (5d): {:.2}%\n", m.price_change * 100.0));
    message.push_str(&format!("RSI: {:.1}\n", m.rsi));
    message
}

/// Email delivery through an SMTP relay with STARTTLS.
pub struct SmtpAlertSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpAlertSink {
    pub fn new(config: &AlertConfig) -> Result<Self, AlertError> {
        let address = config
            .email
            .as_deref()
            .ok_or_else(|| AlertError::Config("ALERT_EMAIL not set".into()))?;
        let mailbox: Mailbox = address
            .parse()
            .map_err(|e| AlertError::Config(format!("Invalid address: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp.host)
            .map_err(|e| AlertError::Smtp(format!("SMTP transport error: {}", e)))?
            .port(config.smtp.port);

        if let (Some(user), Some(pass)) = (&config.smtp.username, &config.smtp.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: mailbox.clone(),
            to: mailbox,
        })
    }
}

#[async_trait]
impl AlertSink for SmtpAlertSink {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AlertError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AlertError::Smtp(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AlertError::Smtp(format!("Failed to send email: {}", e)))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

/// Whether `history` already holds an alert for `ticker` younger than 24 hours.
pub fn recently_alerted(history: &[AlertRecord], ticker: &str, now: DateTime<Utc>) -> bool {
    let window = ChronoDuration::hours(SUPPRESSION_WINDOW_HOURS);
    history
        .iter()
        .any(|a| a.ticker == ticker && now - a.timestamp < window)
}

/// Checks reports against the alert threshold and keeps the alert history.
pub struct AlertService {
    threshold: f64,
    sink: Option<Box<dyn AlertSink>>,
    history_file: PathBuf,
    history: Mutex<Vec<AlertRecord>>,
}

impl AlertService {
    /// Load any existing history from `history_file`.
    pub fn new(threshold: f64, sink: Option<Box<dyn AlertSink>>, history_file: impl Into<PathBuf>) -> Self {
        let history_file = history_file.into();
        let history = load_history(&history_file);
        Self {
            threshold,
            sink,
            history_file,
            history: Mutex::new(history),
        }
    }

    /// Build from configuration, with SMTP delivery when an address is set.
    pub fn from_config(config: &AlertConfig, history_file: impl Into<PathBuf>) -> Self {
        let sink: Option<Box<dyn AlertSink>> = match config.email {
            Some(_) => match SmtpAlertSink::new(config) {
                Ok(sink) => {
                    info!("Email alerts enabled");
                    Some(Box::new(sink))
                }
                Err(e) => {
                    warn!("Failed to initialize SMTP alerts: {}", e);
                    None
                }
            },
            None => {
                info!("No alert email configured (set ALERT_EMAIL)");
                None
            }
        };
        Self::new(config.threshold, sink, history_file)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Fire alerts for qualifying reports. Returns how many were recorded.
    ///
    /// Delivery failures are logged and the alert is still recorded, so a
    /// broken transport does not cause repeated attempts within the window.
    pub async fn process(&self, reports: &[ScoreReport]) -> usize {
        self.process_at(reports, Utc::now()).await
    }

    pub async fn process_at(&self, reports: &[ScoreReport], now: DateTime<Utc>) -> usize {
        // Record under the lock; save and deliver after releasing it.
        let (fired, snapshot) = {
            let mut history = self.history.lock().await;
            let mut fired: Vec<&ScoreReport> = Vec::new();

            for report in reports.iter().filter(|r| r.score >= self.threshold) {
                if recently_alerted(&history, &report.ticker, now) {
                    debug!("Suppressing repeat alert for {}", report.ticker);
                    continue;
                }
                info!("Squeeze alert: {} scored {:.2}", report.ticker, report.score);
                history.push(AlertRecord {
                    ticker: report.ticker.clone(),
                    score: report.score,
                    timestamp: now,
                });
                fired.push(report);
            }

            if fired.is_empty() {
                return 0;
            }
            (fired, history.clone())
        };

        if let Err(e) = save_history(&self.history_file, &snapshot) {
            warn!("Failed to save alert history: {}", e);
        }

        if let Some(sink) = &self.sink {
            for report in &fired {
                let subject = format!("🚨 Short Squeeze Alert: {}", report.ticker);
                match sink.send(&subject, &format_alert_message(report)).await {
                    Ok(()) => debug!("Sent alert for {} via {}", report.ticker, sink.name()),
                    Err(e) => warn!("Failed to send alert via {}: {}", sink.name(), e),
                }
            }
        }

        fired.len()
    }

    /// Newest alerts first.
    pub async fn recent(&self, limit: usize) -> Vec<AlertRecord> {
        let history = self.history.lock().await;
        let mut alerts = history.clone();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts.truncate(limit);
        alerts
    }
}

fn load_history(path: &Path) -> Vec<AlertRecord> {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring unreadable alert history {}: {}", path.display(), e);
            Vec::new()
        }),
        Err(_) => Vec::new(),
    }
}

fn save_history(path: &Path, history: &[AlertRecord]) -> Result<(), PipelineError> {
    let json = serde_json::to_vec(history).map_err(|e| PipelineError::persistence(path, e))?;
    write_atomic(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SqueezeMetrics, SubScores};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct CountingSink {
        sent: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl AlertSink for CountingSink {
        async fn send(&self, _subject: &str, _body: &str) -> Result<(), AlertError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AlertError::Smtp("connection refused".into()))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    /// Announces each send, then waits until released.
    struct GatedSink {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl AlertSink for GatedSink {
        async fn send(&self, _subject: &str, _body: &str) -> Result<(), AlertError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    fn report(ticker: &str, score: f64) -> ScoreReport {
        ScoreReport {
            ticker: ticker.to_string(),
            score,
            sub_scores: SubScores {
                short_interest: 1.0,
                volume_spike: 1.0,
                price_momentum: 1.0,
                rsi: 0.5,
                days_to_cover: 1.0,
            },
            metrics: SqueezeMetrics {
                short_interest: 0.2345,
                days_to_cover: 6.25,
                volume_spike: 3.04,
                price_change: 0.1234,
                rsi: 48.26,
            },
            computed_at: Utc::now(),
        }
    }

    fn service(dir: &tempfile::TempDir, fail: bool) -> (AlertService, Arc<AtomicUsize>) {
        let sent = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink {
            sent: sent.clone(),
            fail,
        };
        let service = AlertService::new(
            0.8,
            Some(Box::new(sink)),
            dir.path().join("alert_history.json"),
        );
        (service, sent)
    }

    // =========================================================================
    // Formatting Tests
    // =========================================================================

    #[test]
    fn test_format_alert_message() {
        let msg = format_alert_message(&report("GME", 0.8567));
        assert!(msg.contains("Short Squeeze Alert for GME"));
        assert!(msg.contains("Short Squeeze Score: 0.86"));
        assert!(msg.contains("Short Interest: 23.45%"));
        assert!(msg.contains("Days to Cover: 6.2") || msg.contains("Days to Cover: 6.3"));
        assert!(msg.contains("Volume Spike: 3.0x"));
        assert!(msg.contains("Price Change (5d): 12.34%"));
        assert!(msg.contains("RSI: 48.3"));
    }

    // =========================================================================
    // Suppression Tests
    // =========================================================================

    #[test]
    fn test_recently_alerted_window() {
        let now = Utc::now();
        let history = vec![AlertRecord {
            ticker: "AMC".into(),
            score: 0.9,
            timestamp: now - ChronoDuration::hours(23),
        }];
        assert!(recently_alerted(&history, "AMC", now));
        assert!(!recently_alerted(&history, "GME", now));
        assert!(!recently_alerted(&history, "AMC", now + ChronoDuration::hours(2)));
    }

    #[tokio::test]
    async fn test_repeat_alert_within_day_is_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        let (service, sent) = service(&dir, false);
        let now = Utc::now();

        assert_eq!(service.process_at(&[report("AMC", 0.9)], now).await, 1);
        assert_eq!(
            service
                .process_at(&[report("AMC", 0.95)], now + ChronoDuration::hours(3))
                .await,
            0
        );

        assert_eq!(sent.load(Ordering::SeqCst), 1);
        assert_eq!(service.recent(10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_alert_fires_again_after_a_day() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(&dir, false);
        let now = Utc::now();

        service.process_at(&[report("AMC", 0.9)], now).await;
        let fired = service
            .process_at(&[report("AMC", 0.9)], now + ChronoDuration::hours(25))
            .await;
        assert_eq!(fired, 1);
        assert_eq!(service.recent(10).await.len(), 2);
    }

    #[tokio::test]
    async fn test_below_threshold_does_not_alert() {
        let dir = tempfile::tempdir().unwrap();
        let (service, sent) = service(&dir, false);
        assert_eq!(service.process(&[report("NOK", 0.79)]).await, 0);
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let (service, sent) = service(&dir, true);
        assert_eq!(service.process(&[report("KOSS", 0.8)]).await, 1);
        assert_eq!(sent.load(Ordering::SeqCst), 1);
        assert_eq!(service.recent(5).await[0].ticker, "KOSS");
    }

    #[tokio::test]
    async fn test_slow_delivery_does_not_block_history_readers() {
        let dir = tempfile::tempdir().unwrap();
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let sink = GatedSink {
            entered: entered.clone(),
            release: release.clone(),
        };
        let service = Arc::new(AlertService::new(
            0.8,
            Some(Box::new(sink)),
            dir.path().join("alert_history.json"),
        ));

        let sending = {
            let service = service.clone();
            tokio::spawn(async move { service.process(&[report("AMC", 0.9)]).await })
        };
        entered.notified().await;

        let recent = tokio::time::timeout(Duration::from_secs(1), service.recent(5))
            .await
            .expect("history readable while an alert is being delivered");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].ticker, "AMC");
        assert!(dir.path().join("alert_history.json").exists());

        release.notify_one();
        assert_eq!(sending.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_history_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert_history.json");
        let now = Utc::now();

        let first = AlertService::new(0.8, None, &path);
        first.process_at(&[report("GME", 0.9)], now).await;

        let second = AlertService::new(0.8, None, &path);
        let fired = second
            .process_at(&[report("GME", 0.9)], now + ChronoDuration::hours(1))
            .await;
        assert_eq!(fired, 0);
    }

    #[tokio::test]
    async fn test_recent_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(&dir, false);
        let now = Utc::now();
        service.process_at(&[report("AMC", 0.9)], now).await;
        service
            .process_at(&[report("GME", 0.9)], now + ChronoDuration::minutes(5))
            .await;

        let recent = service.recent(1).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].ticker, "GME");
    }

    #[test]
    fn test_smtp_sink_requires_address() {
        let config = AlertConfig::default();
        assert!(matches!(
            SmtpAlertSink::new(&config),
            Err(AlertError::Config(_))
        ));
    }
}
