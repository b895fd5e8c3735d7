use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the alert history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub ticker: String,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}
