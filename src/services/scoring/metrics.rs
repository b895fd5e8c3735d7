//! Human-facing squeeze metrics derived from an enriched series.

use crate::error::PipelineError;
use crate::types::{EnrichedSeries, ShortInterestSnapshot, SqueezeMetrics};

/// Derive days-to-cover, volume spike, price change and latest RSI.
///
/// The mean volume is taken over the whole fetched series. The price change
/// compares the last close with the close `momentum_days` bars from the end.
pub fn extract_metrics(
    series: &EnrichedSeries,
    snapshot: &ShortInterestSnapshot,
    momentum_days: usize,
) -> Result<SqueezeMetrics, PipelineError> {
    let len = series.len();
    if len <= momentum_days {
        return Err(PipelineError::DataInsufficient(format!(
            "{} bars, need more than {} for the price change",
            len, momentum_days
        )));
    }
    if snapshot.float_shares == 0 {
        return Err(PipelineError::DataInsufficient(
            "float shares unknown".to_string(),
        ));
    }

    let volumes = series.volumes();
    let mean_volume = volumes.iter().sum::<f64>() / len as f64;
    if mean_volume <= 0.0 {
        return Err(PipelineError::DataInsufficient(
            "mean volume is zero".to_string(),
        ));
    }

    let bars = series.bars();
    let last = &bars[len - 1];
    let reference_close = bars[len - momentum_days].bar.close;
    if reference_close <= 0.0 {
        return Err(PipelineError::DataInsufficient(
            "reference close is zero".to_string(),
        ));
    }

    let rsi = last.indicators.rsi.ok_or_else(|| {
        PipelineError::DataInsufficient("RSI undefined at the last bar".to_string())
    })?;

    Ok(SqueezeMetrics {
        short_interest: snapshot.short_interest_ratio,
        days_to_cover: snapshot.shares_short() / mean_volume,
        volume_spike: last.bar.volume as f64 / mean_volume,
        price_change: (last.bar.close - reference_close) / reference_close,
        rsi,
    })
}
