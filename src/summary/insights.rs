//! Per-item insight panel over the most recent observations.

use serde::Serialize;

use crate::config::{MEAN_WINDOW, TREND_NEUTRAL_BAND_PCT};

/// Where the current price sits relative to its recent mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendHint {
    /// Above the recent mean — possible moment to sell.
    Upward,
    /// Below the recent mean — possible buying opportunity.
    Downward,
    /// Within the neutral band around the mean.
    Flat,
}

impl std::fmt::Display for TrendHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrendHint::Upward => "upward",
            TrendHint::Downward => "downward",
            TrendHint::Flat => "flat",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryInsights {
    pub min_last5: i64,
    pub max_last5: i64,
    pub mean_last5: f64,
    /// (max - min) / mean, in percent. 0 when the mean is not positive.
    pub oscillation_pct: f64,
    /// Sample standard deviation of the window. 0 for a single observation.
    pub std_dev_last5: f64,
    /// Current price vs the window mean, in percent.
    pub vs_mean_pct: f64,
    pub trend: TrendHint,
}

/// Compute the insight panel from a chronologically ordered price series.
/// Only the trailing [`MEAN_WINDOW`] prices are considered. Returns `None`
/// for an empty series.
pub fn history_insights(prices: &[i64]) -> Option<HistoryInsights> {
    if prices.is_empty() {
        return None;
    }

    let window = &prices[prices.len().saturating_sub(MEAN_WINDOW)..];
    let n = window.len() as f64;

    let min = *window.iter().min().expect("non-empty window");
    let max = *window.iter().max().expect("non-empty window");
    let mean = window.iter().map(|&p| p as f64).sum::<f64>() / n;
    let current = window[window.len() - 1] as f64;

    let oscillation_pct = if mean > 0.0 {
        (max - min) as f64 / mean * 100.0
    } else {
        0.0
    };

    let std_dev = if window.len() > 1 {
        let variance = window
            .iter()
            .map(|&p| {
                let d = p as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / (n - 1.0);
        variance.sqrt()
    } else {
        0.0
    };

    let vs_mean_pct = if mean > 0.0 {
        (current - mean) / mean * 100.0
    } else {
        0.0
    };

    let trend = if vs_mean_pct > TREND_NEUTRAL_BAND_PCT {
        TrendHint::Upward
    } else if vs_mean_pct < -TREND_NEUTRAL_BAND_PCT {
        TrendHint::Downward
    } else {
        TrendHint::Flat
    };

    Some(HistoryInsights {
        min_last5: min,
        max_last5: max,
        mean_last5: mean,
        oscillation_pct,
        std_dev_last5: std_dev,
        vs_mean_pct,
        trend,
    })
}
