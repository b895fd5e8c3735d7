use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EnrichedSeries, ShortInterestSnapshot};

/// One ticker's persisted series and snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "CacheRecord", from = "CacheRecord")]
pub struct CacheEntry {
    pub ticker: String,
    pub series: EnrichedSeries,
    pub snapshot: ShortInterestSnapshot,
    pub last_updated: DateTime<Utc>,
}

/// On-disk shape of a cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheRecord {
    ticker: String,
    data: EnrichedSeries,
    short_interest: f64,
    float_shares: u64,
    last_updated: DateTime<Utc>,
}

impl From<CacheEntry> for CacheRecord {
    fn from(entry: CacheEntry) -> Self {
        Self {
            ticker: entry.ticker,
            data: entry.series,
            short_interest: entry.snapshot.short_interest_ratio,
            float_shares: entry.snapshot.float_shares,
            last_updated: entry.last_updated,
        }
    }
}

impl From<CacheRecord> for CacheEntry {
    fn from(record: CacheRecord) -> Self {
        Self {
            ticker: record.ticker,
            series: record.data,
            snapshot: ShortInterestSnapshot::new(record.short_interest, record.float_shares),
            last_updated: record.last_updated,
        }
    }
}
