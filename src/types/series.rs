//! Daily price series and the frame layout used to persist it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Date format used for the frame index.
pub const INDEX_DATE_FORMAT: &str = "%Y-%m-%d";

/// Column names of the persisted frame, in record order.
pub const FRAME_COLUMNS: [&str; 9] = [
    "Open", "High", "Low", "Close", "Volume", "RSI", "MA5", "MA20", "Volume_MA",
];

/// One trading-day observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Derived per-bar values. `None` until the trailing window is satisfied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    pub rsi: Option<f64>,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub volume_ma20: Option<f64>,
}

/// A bar plus its derived indicator values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedBar {
    pub bar: PriceBar,
    pub indicators: Indicators,
}

impl EnrichedBar {
    pub fn raw(bar: PriceBar) -> Self {
        Self {
            bar,
            indicators: Indicators::default(),
        }
    }
}

/// Reasons a series fails validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("dates must be strictly ascending: {previous} is followed by {next}")]
    NotAscending { previous: NaiveDate, next: NaiveDate },

    #[error("bar {date} has a non-finite or negative {field}")]
    InvalidValue { date: NaiveDate, field: &'static str },

    #[error("frame columns do not match the expected layout")]
    ColumnMismatch,

    #[error("frame has {index} index entries but {data} records")]
    LengthMismatch { index: usize, data: usize },

    #[error("invalid index date {0:?}")]
    InvalidDate(String),
}

/// Chronologically ascending daily series with unique dates.
///
/// The constructor is the only way in, so every `EnrichedSeries` in memory
/// satisfies the ordering and value checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "SeriesFrame", try_from = "SeriesFrame")]
pub struct EnrichedSeries {
    bars: Vec<EnrichedBar>,
}

impl EnrichedSeries {
    /// Build a series of raw bars (no derived values).
    pub fn from_bars(bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        Self::from_enriched(bars.into_iter().map(EnrichedBar::raw).collect())
    }

    /// Build a series from bars that may already carry derived values.
    pub fn from_enriched(bars: Vec<EnrichedBar>) -> Result<Self, SeriesError> {
        for pair in bars.windows(2) {
            if pair[1].bar.date <= pair[0].bar.date {
                return Err(SeriesError::NotAscending {
                    previous: pair[0].bar.date,
                    next: pair[1].bar.date,
                });
            }
        }
        for b in &bars {
            validate_bar(&b.bar)?;
        }
        Ok(Self { bars })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[EnrichedBar] {
        &self.bars
    }

    pub fn last(&self) -> Option<&EnrichedBar> {
        self.bars.last()
    }

    /// The raw bars, without derived values.
    pub fn price_bars(&self) -> Vec<PriceBar> {
        self.bars.iter().map(|b| b.bar.clone()).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.bar.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.bar.volume as f64).collect()
    }

    /// Replace the derived values. `indicators` must be one entry per bar.
    pub(crate) fn with_indicators(mut self, indicators: Vec<Indicators>) -> Self {
        debug_assert_eq!(indicators.len(), self.bars.len());
        for (bar, values) in self.bars.iter_mut().zip(indicators) {
            bar.indicators = values;
        }
        self
    }
}

fn validate_bar(bar: &PriceBar) -> Result<(), SeriesError> {
    let fields = [
        ("open", bar.open),
        ("high", bar.high),
        ("low", bar.low),
        ("close", bar.close),
    ];
    for (field, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(SeriesError::InvalidValue {
                date: bar.date,
                field,
            });
        }
    }
    Ok(())
}

/// One record of the frame: a bar's values keyed by column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: u64,
    #[serde(rename = "RSI")]
    pub rsi: Option<f64>,
    #[serde(rename = "MA5")]
    pub ma5: Option<f64>,
    #[serde(rename = "MA20")]
    pub ma20: Option<f64>,
    #[serde(rename = "Volume_MA")]
    pub volume_ma: Option<f64>,
}

/// Column-oriented wire layout: `{data: [records], index: [dates], columns: [names]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesFrame {
    pub data: Vec<FrameRecord>,
    pub index: Vec<String>,
    pub columns: Vec<String>,
}

impl From<EnrichedSeries> for SeriesFrame {
    fn from(series: EnrichedSeries) -> Self {
        let mut data = Vec::with_capacity(series.len());
        let mut index = Vec::with_capacity(series.len());

        for EnrichedBar { bar, indicators } in series.bars {
            index.push(bar.date.format(INDEX_DATE_FORMAT).to_string());
            data.push(FrameRecord {
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                rsi: indicators.rsi,
                ma5: indicators.ma5,
                ma20: indicators.ma20,
                volume_ma: indicators.volume_ma20,
            });
        }

        Self {
            data,
            index,
            columns: FRAME_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl TryFrom<SeriesFrame> for EnrichedSeries {
    type Error = SeriesError;

    fn try_from(frame: SeriesFrame) -> Result<Self, Self::Error> {
        if frame.columns.len() != FRAME_COLUMNS.len()
            || frame.columns.iter().zip(FRAME_COLUMNS).any(|(a, b)| a != b)
        {
            return Err(SeriesError::ColumnMismatch);
        }
        if frame.index.len() != frame.data.len() {
            return Err(SeriesError::LengthMismatch {
                index: frame.index.len(),
                data: frame.data.len(),
            });
        }

        let bars = frame
            .index
            .iter()
            .zip(frame.data)
            .map(|(date, record)| {
                let date = NaiveDate::parse_from_str(date, INDEX_DATE_FORMAT)
                    .map_err(|_| SeriesError::InvalidDate(date.clone()))?;
                Ok(EnrichedBar {
                    bar: PriceBar {
                        date,
                        open: record.open,
                        high: record.high,
                        low: record.low,
                        close: record.close,
                        volume: record.volume,
                    },
                    indicators: Indicators {
                        rsi: record.rsi,
                        ma5: record.ma5,
                        ma20: record.ma20,
                        volume_ma20: record.volume_ma,
                    },
                })
            })
            .collect::<Result<Vec<_>, SeriesError>>()?;

        EnrichedSeries::from_enriched(bars)
    }
}
