//! Yahoo Finance API client for daily history and short interest.
//!
//! Uses the unofficial chart and quote-summary endpoints.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{MarketDataProvider, RawBar, RawShortInterest};
use crate::error::PipelineError;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Yahoo Finance chart response.
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    timestamp: Option<Vec<i64>>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<u64>>>,
}

/// Quote-summary response, `defaultKeyStatistics` module only.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    default_key_statistics: Option<KeyStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    short_percent_of_float: Option<RawValue>,
    float_shares: Option<RawValue>,
}

/// Yahoo wraps numbers as `{"raw": 0.21, "fmt": "21%"}`; empty objects mean unknown.
#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

/// Normalize symbol for Yahoo Finance API.
/// Yahoo uses hyphens instead of dots for share classes (e.g., BRK-B not BRK.B)
fn normalize_yahoo_symbol(symbol: &str) -> String {
    symbol.to_uppercase().replace('.', "-")
}

fn unix_seconds(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn classify_transport(err: reqwest::Error) -> PipelineError {
    PipelineError::ProviderUnavailable(format!("Request failed: {}", err))
}

fn classify_status(symbol: &str, status: StatusCode) -> PipelineError {
    if status == StatusCode::NOT_FOUND {
        PipelineError::NoData(symbol.to_string())
    } else {
        PipelineError::ProviderUnavailable(format!("API error: {}", status))
    }
}

/// Turn a chart payload into rows. Mismatched column lengths leave the
/// missing cells empty.
fn parse_chart(symbol: &str, data: YahooChartResponse) -> Result<Vec<RawBar>, PipelineError> {
    if let Some(error) = data.chart.error {
        return Err(if error.code.eq_ignore_ascii_case("Not Found") {
            PipelineError::NoData(symbol.to_string())
        } else {
            PipelineError::ProviderUnavailable(format!(
                "Yahoo API error: {} - {}",
                error.code, error.description
            ))
        });
    }

    let Some(result) = data.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(PipelineError::NoData(symbol.to_string()));
    };
    let timestamps = result.timestamp.unwrap_or_default();
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Err(PipelineError::NoData(symbol.to_string()));
    };

    let opens = quote.open.unwrap_or_default();
    let highs = quote.high.unwrap_or_default();
    let lows = quote.low.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();
    let volumes = quote.volume.unwrap_or_default();

    let bars = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let date = DateTime::from_timestamp(ts, 0)?.date_naive();
            Some(RawBar {
                date,
                open: opens.get(i).copied().flatten(),
                high: highs.get(i).copied().flatten(),
                low: lows.get(i).copied().flatten(),
                close: closes.get(i).copied().flatten(),
                volume: volumes.get(i).copied().flatten(),
            })
        })
        .collect();

    Ok(bars)
}

fn parse_key_statistics(data: QuoteSummaryResponse) -> Result<RawShortInterest, PipelineError> {
    if let Some(error) = data.quote_summary.error {
        return Err(PipelineError::ProviderUnavailable(format!(
            "Yahoo API error: {} - {}",
            error.code, error.description
        )));
    }

    let stats = data
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .and_then(|r| r.default_key_statistics);

    Ok(match stats {
        Some(stats) => RawShortInterest {
            short_percent_of_float: stats.short_percent_of_float.and_then(|v| v.raw),
            float_shares: stats
                .float_shares
                .and_then(|v| v.raw)
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64),
        },
        None => RawShortInterest::default(),
    })
}

/// Yahoo Finance API client.
pub struct YahooFinanceClient {
    client: Client,
}

impl YahooFinanceClient {
    /// Create a new Yahoo Finance client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceClient {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, PipelineError> {
        let yahoo_symbol = normalize_yahoo_symbol(ticker);
        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d&includePrePost=false",
            CHART_URL,
            yahoo_symbol,
            unix_seconds(start),
            unix_seconds(end)
        );

        debug!("Fetching Yahoo Finance data: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            return Err(classify_status(&yahoo_symbol, response.status()));
        }

        let data: YahooChartResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::ProviderUnavailable(format!("Parse error: {}", e)))?;

        parse_chart(&yahoo_symbol, data)
    }

    async fn short_interest(&self, ticker: &str) -> Result<RawShortInterest, PipelineError> {
        let yahoo_symbol = normalize_yahoo_symbol(ticker);
        let url = format!(
            "{}/{}?modules=defaultKeyStatistics",
            QUOTE_SUMMARY_URL, yahoo_symbol
        );

        debug!("Fetching Yahoo key statistics: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            return Err(classify_status(&yahoo_symbol, response.status()));
        }

        let data: QuoteSummaryResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::ProviderUnavailable(format!("Parse error: {}", e)))?;

        parse_key_statistics(data)
    }
}
