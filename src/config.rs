use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Tickers watched when `SQUEEZE_TICKERS` is not set.
pub const DEFAULT_TICKERS: [&str; 4] = ["AMC", "GME", "KOSS", "NOK"];

/// Longest accepted price momentum window, about one trading year.
pub const MAX_MOMENTUM_DAYS: usize = 250;

/// Thresholds that normalize each sub-score to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreThresholds {
    /// Short interest ratio at which the sub-score saturates (20% of float).
    pub short_interest: f64,
    /// Days to cover at which the sub-score saturates.
    pub days_to_cover: f64,
    /// Volume multiple of the mean at which the sub-score saturates.
    pub volume_spike: f64,
    /// Look back this many bars for the price change.
    pub price_momentum_days: usize,
    /// RSI below this scores 1.0.
    pub rsi_oversold: f64,
    /// RSI above this scores 0.0.
    pub rsi_overbought: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            short_interest: 0.20,
            days_to_cover: 5.0,
            volume_spike: 2.0,
            price_momentum_days: 5,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
        }
    }
}

impl ScoreThresholds {
    /// Check the thresholds can be divided by without producing NaN.
    pub fn validate(&self) -> Result<(), String> {
        if self.short_interest <= 0.0 || self.days_to_cover <= 0.0 || self.volume_spike <= 0.0 {
            return Err("ratio thresholds must be positive".to_string());
        }
        if self.price_momentum_days == 0 || self.price_momentum_days > MAX_MOMENTUM_DAYS {
            return Err(format!(
                "price momentum window must be between 1 and {} bars",
                MAX_MOMENTUM_DAYS
            ));
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(format!(
                "RSI oversold ({}) must be below overbought ({})",
                self.rsi_oversold, self.rsi_overbought
            ));
        }
        Ok(())
    }
}

/// SMTP settings for email alerts.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: None,
            password: None,
        }
    }
}

/// Alerting configuration.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Alert when a score reaches this value (0-1 scale).
    pub threshold: f64,
    /// Recipient (and sender) address. Email is disabled when unset.
    pub email: Option<String>,
    pub smtp: SmtpConfig,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            email: None,
            smtp: SmtpConfig::default(),
        }
    }
}

/// Retry policy for provider calls that fail with a transient error.
///
/// The delay doubles after each failed attempt, capped at four times the
/// initial delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per ticker, including the first. At least 1.
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(2);
        self.initial_delay.saturating_mul(factor)
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Ticker universe, upper-cased and deduplicated.
    pub tickers: Vec<String>,
    /// Interval between scheduled pipeline runs.
    pub update_interval: Duration,
    /// Calendar days of history requested per ticker.
    pub lookback_days: i64,
    /// Minimum delay between consecutive provider calls.
    pub fetch_delay: Duration,
    /// Per-request provider timeout.
    pub provider_timeout: Duration,
    /// Retries for transient provider failures.
    pub retry: RetryPolicy,
    pub thresholds: ScoreThresholds,
    pub alerts: AlertConfig,
    /// Root data directory.
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            tickers: DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
            update_interval: Duration::from_secs(300),
            lookback_days: 120,
            fetch_delay: Duration::from_millis(1000),
            provider_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            thresholds: ScoreThresholds::default(),
            alerts: AlertConfig::default(),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let tickers = env::var("SQUEEZE_TICKERS")
            .ok()
            .map(|s| parse_tickers(&s))
            .filter(|t| !t.is_empty())
            .unwrap_or(defaults.tickers);

        let thresholds = ScoreThresholds {
            short_interest: parse_env("SHORT_INTEREST_THRESHOLD", 0.20),
            days_to_cover: parse_env("DAYS_TO_COVER_THRESHOLD", 5.0),
            volume_spike: parse_env("VOLUME_SPIKE_THRESHOLD", 2.0),
            price_momentum_days: parse_env("PRICE_MOMENTUM_DAYS", 5),
            rsi_oversold: parse_env("RSI_OVERSOLD_THRESHOLD", 30.0),
            rsi_overbought: parse_env("RSI_OVERBOUGHT_THRESHOLD", 70.0),
        };
        let thresholds = match thresholds.validate() {
            Ok(()) => thresholds,
            Err(e) => {
                warn!("Invalid score thresholds ({}), using defaults", e);
                ScoreThresholds::default()
            }
        };

        let email = env::var("ALERT_EMAIL").ok().filter(|s| !s.is_empty());

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_env("PORT", defaults.port),
            tickers,
            update_interval: Duration::from_secs(
                parse_env("UPDATE_INTERVAL_SECS", 300u64).max(1),
            ),
            lookback_days: Some(parse_env("LOOKBACK_DAYS", defaults.lookback_days))
                .filter(|d| *d > 0)
                .unwrap_or(defaults.lookback_days),
            fetch_delay: Duration::from_millis(parse_env("FETCH_DELAY_MS", 1000)),
            provider_timeout: Duration::from_secs(parse_env("PROVIDER_TIMEOUT_SECS", 30)),
            retry: RetryPolicy {
                attempts: parse_env("FETCH_RETRY_ATTEMPTS", 3u32).max(1),
                initial_delay: Duration::from_millis(parse_env("FETCH_RETRY_DELAY_MS", 1000)),
            },
            thresholds,
            alerts: AlertConfig {
                threshold: parse_env("ALERT_THRESHOLD", 0.8),
                smtp: SmtpConfig {
                    host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                    port: parse_env("SMTP_PORT", 587),
                    username: env::var("SMTP_USERNAME")
                        .ok()
                        .filter(|s| !s.is_empty())
                        .or_else(|| email.clone()),
                    password: env::var("EMAIL_PASSWORD").ok().filter(|s| !s.is_empty()),
                },
                email,
            },
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }

    /// Per-ticker series cache.
    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir().join("stock_data.json")
    }

    /// Score table.
    pub fn results_file(&self) -> PathBuf {
        self.results_dir().join("short_squeeze_scores.csv")
    }

    pub fn alert_history_file(&self) -> PathBuf {
        self.results_dir().join("alert_history.json")
    }

    /// Create the cache and results directories.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [self.cache_dir(), self.results_dir()] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Configuration rooted at `dir`, otherwise default. Used by tests and tools.
    pub fn with_data_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Split a comma separated ticker list, normalizing case and dropping repeats.
pub fn parse_tickers(raw: &str) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for ticker in raw.split(',').map(|t| t.trim().to_uppercase()) {
        if !ticker.is_empty() && !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Ticker Parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_tickers_normalizes() {
        assert_eq!(parse_tickers(" amc, GME ,koss"), vec!["AMC", "GME", "KOSS"]);
    }

    #[test]
    fn test_parse_tickers_dedupes_and_skips_empty() {
        assert_eq!(parse_tickers("AMC,,amc, ,NOK"), vec!["AMC", "NOK"]);
    }

    #[test]
    fn test_parse_tickers_empty() {
        assert!(parse_tickers("").is_empty());
    }

    // =========================================================================
    // Threshold Tests
    // =========================================================================

    #[test]
    fn test_default_thresholds() {
        let t = ScoreThresholds::default();
        assert_eq!(t.short_interest, 0.20);
        assert_eq!(t.days_to_cover, 5.0);
        assert_eq!(t.volume_spike, 2.0);
        assert_eq!(t.price_momentum_days, 5);
        assert_eq!(t.rsi_oversold, 30.0);
        assert_eq!(t.rsi_overbought, 70.0);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_thresholds_reject_inverted_rsi_band() {
        let t = ScoreThresholds {
            rsi_oversold: 70.0,
            rsi_overbought: 30.0,
            ..ScoreThresholds::default()
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_thresholds_reject_zero_divisors() {
        let t = ScoreThresholds {
            volume_spike: 0.0,
            ..ScoreThresholds::default()
        };
        assert!(t.validate().is_err());

        let t = ScoreThresholds {
            price_momentum_days: 0,
            ..ScoreThresholds::default()
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_thresholds_cap_momentum_window() {
        let at_cap = ScoreThresholds {
            price_momentum_days: MAX_MOMENTUM_DAYS,
            ..ScoreThresholds::default()
        };
        assert!(at_cap.validate().is_ok());

        let huge = ScoreThresholds {
            price_momentum_days: usize::MAX,
            ..ScoreThresholds::default()
        };
        assert!(huge.validate().is_err());
    }

    // =========================================================================
    // Retry Policy Tests
    // =========================================================================

    #[test]
    fn test_retry_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            attempts: 5,
            initial_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(400));
    }

    #[test]
    fn test_retry_defaults() {
        let policy = Config::default().retry;
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
    }

    // =========================================================================
    // Config Tests
    // =========================================================================

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.tickers, vec!["AMC", "GME", "KOSS", "NOK"]);
        assert_eq!(config.update_interval, Duration::from_secs(300));
        assert_eq!(config.fetch_delay, Duration::from_secs(1));
        assert_eq!(config.alerts.threshold, 0.8);
        assert!(config.alerts.email.is_none());
    }

    #[test]
    fn test_config_file_layout() {
        let config = Config::with_data_dir("/tmp/squeeze");
        assert_eq!(
            config.cache_file(),
            PathBuf::from("/tmp/squeeze/cache/stock_data.json")
        );
        assert_eq!(
            config.results_file(),
            PathBuf::from("/tmp/squeeze/results/short_squeeze_scores.csv")
        );
        assert_eq!(
            config.alert_history_file(),
            PathBuf::from("/tmp/squeeze/results/alert_history.json")
        );
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path().join("data"));
        config.ensure_directories().unwrap();
        assert!(config.cache_dir().is_dir());
        assert!(config.results_dir().is_dir());
    }

    #[test]
    fn test_config_clone() {
        let config = Config::default();
        let cloned = config.clone();
        assert_eq!(cloned.host, config.host);
        assert_eq!(cloned.thresholds, config.thresholds);
    }
}
