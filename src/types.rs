use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::recommendation_thresholds::{BUY_MAX, SELL_MIN};
use crate::variation::VariationKey;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Price observations
// ---------------------------------------------------------------------------

/// One current price fact for an (item, date, variation) triple, joined with
/// its item name and resolved display label at load time.
#[derive(Debug, Clone)]
pub struct PriceObservation {
    pub item_id: i64,
    pub item_name: String,
    pub date: NaiveDate,
    pub price_zeny: i64,
    pub refine: u32,
    pub attachment_ids: Vec<i64>,
    pub free_text: Option<String>,
    pub variation_key: VariationKey,
    pub display_label: String,
    /// Nanosecond UTC epoch of the write that produced this row. Breaks ties
    /// between same-date observations: the later write supersedes.
    pub recorded_at_ns: i64,
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Buy,
    Sell,
    Neutral,
}

impl Recommendation {
    /// Classify a deviation of the last price against the trailing mean.
    /// Boundaries are inclusive: exactly -5% is a Buy, exactly +10% a Sell.
    pub fn from_deviation(deviation_pct: f64) -> Self {
        if deviation_pct <= BUY_MAX {
            Recommendation::Buy
        } else if deviation_pct >= SELL_MIN {
            Recommendation::Sell
        } else {
            Recommendation::Neutral
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Recommendation::Buy => "buy",
            Recommendation::Sell => "sell",
            Recommendation::Neutral => "neutral",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Summary rows — recomputed on every read, never persisted
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub item_id: i64,
    pub variation_key: VariationKey,
    pub display_label: String,
    pub last_date: NaiveDate,
    pub last_price: i64,
    pub mean_last5: f64,
    pub deviation_pct: f64,
    pub recommendation: Recommendation,
}

// ---------------------------------------------------------------------------
// Change requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// A non-admin overwrite waiting for review. Approval writes the new price
/// and closes the request; rejection only closes it.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRequest {
    pub id: i64,
    pub item_id: i64,
    pub date: NaiveDate,
    pub variation_key: VariationKey,
    pub old_price_zeny: i64,
    pub new_price_zeny: i64,
    pub requested_by: String,
    pub reason: Option<String>,
    pub status: RequestStatus,
    pub reviewer: Option<String>,
    pub review_comment: Option<String>,
    pub created_at_ns: i64,
    pub reviewed_at_ns: Option<i64>,
}
