use serde::{Deserialize, Serialize};

use super::EnrichedSeries;

/// Point-in-time short interest facts for one ticker. Zeros mean "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShortInterestSnapshot {
    /// Fraction of the float currently sold short.
    pub short_interest_ratio: f64,
    /// Shares available for public trading.
    pub float_shares: u64,
}

impl ShortInterestSnapshot {
    pub fn new(short_interest_ratio: f64, float_shares: u64) -> Self {
        Self {
            short_interest_ratio,
            float_shares,
        }
    }

    /// Shares sold short, derived from the ratio and the float.
    pub fn shares_short(&self) -> f64 {
        self.short_interest_ratio * self.float_shares as f64
    }
}

/// A successful fetch: the raw series plus the short interest snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerData {
    pub ticker: String,
    pub series: EnrichedSeries,
    pub snapshot: ShortInterestSnapshot,
}
