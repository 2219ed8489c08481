//! Database row types. Used by sqlx for typed queries; converted into the
//! domain types in `store.rs`.

use chrono::NaiveDate;

#[derive(Debug, sqlx::FromRow)]
pub struct ItemRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PriceRow {
    pub item_id: i64,
    pub item_name: String,
    pub date: NaiveDate,
    pub price_zeny: i64,
    pub refine: i64,
    /// JSON array of attachment ids, e.g. `[4001,4001,4044]`.
    pub attachment_ids: String,
    pub free_text: Option<String>,
    pub variation_key: String,
    pub created_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ChangeRequestRow {
    pub id: i64,
    pub item_id: i64,
    pub date: NaiveDate,
    pub variation_key: String,
    pub old_price_zeny: i64,
    pub new_price_zeny: i64,
    pub requested_by: String,
    pub reason: Option<String>,
    pub status: String,
    pub reviewer: Option<String>,
    pub review_comment: Option<String>,
    pub created_at: i64,
    pub reviewed_at: Option<i64>,
}
