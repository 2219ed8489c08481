//! SQLite-backed store for the item catalog, price observations, change
//! requests, and the audit trail.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::{ChangeRequestRow, ItemRow, PriceRow};
use crate::error::{AppError, Result};
use crate::now_ns;
use crate::state::ItemCatalog;
use crate::types::{ChangeRequest, Item, PriceObservation, RequestStatus};
use crate::variation::{derive_display_label, VariationKey};

#[derive(Clone)]
pub struct PriceStore {
    pool: SqlitePool,
}

impl PriceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    pub async fn items(&self) -> Result<Vec<Item>> {
        let rows: Vec<ItemRow> = sqlx::query_as("SELECT id, name FROM items ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| Item {
                id: r.id,
                name: r.name,
            })
            .collect())
    }

    pub async fn item(&self, id: i64) -> Result<Option<Item>> {
        let row: Option<ItemRow> = sqlx::query_as("SELECT id, name FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Item {
            id: r.id,
            name: r.name,
        }))
    }

    pub async fn upsert_item(&self, id: i64, name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO items (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Price observations
    // -----------------------------------------------------------------------

    /// Load every current observation, joined with item names. Display labels
    /// are resolved here so the aggregator receives fully-formed rows.
    pub async fn load_observations(&self, catalog: &ItemCatalog) -> Result<Vec<PriceObservation>> {
        let rows: Vec<PriceRow> = sqlx::query_as(
            r#"
            SELECT p.item_id, i.name AS item_name, p.date, p.price_zeny,
                   p.refine, p.attachment_ids, p.free_text, p.variation_key, p.created_at
            FROM prices p
            JOIN items i ON i.id = p.item_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| observation_from_row(r, catalog))
            .collect()
    }

    /// Observations for one item, chronological, optionally filtered to a
    /// single variation.
    pub async fn item_observations(
        &self,
        item_id: i64,
        variation: Option<&VariationKey>,
        catalog: &ItemCatalog,
    ) -> Result<Vec<PriceObservation>> {
        let rows: Vec<PriceRow> = match variation {
            Some(key) => {
                sqlx::query_as(
                    r#"
                    SELECT p.item_id, i.name AS item_name, p.date, p.price_zeny,
                           p.refine, p.attachment_ids, p.free_text, p.variation_key, p.created_at
                    FROM prices p
                    JOIN items i ON i.id = p.item_id
                    WHERE p.item_id = ? AND p.variation_key = ?
                    ORDER BY p.date ASC, p.created_at ASC
                    "#,
                )
                .bind(item_id)
                .bind(key.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT p.item_id, i.name AS item_name, p.date, p.price_zeny,
                           p.refine, p.attachment_ids, p.free_text, p.variation_key, p.created_at
                    FROM prices p
                    JOIN items i ON i.id = p.item_id
                    WHERE p.item_id = ?
                    ORDER BY p.date ASC, p.created_at ASC
                    "#,
                )
                .bind(item_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter()
            .map(|r| observation_from_row(r, catalog))
            .collect()
    }

    pub async fn existing_price(
        &self,
        item_id: i64,
        date: NaiveDate,
        key: &VariationKey,
    ) -> Result<Option<i64>> {
        let price: Option<i64> = sqlx::query_scalar(
            "SELECT price_zeny FROM prices WHERE item_id = ? AND date = ? AND variation_key = ?",
        )
        .bind(item_id)
        .bind(date)
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(price)
    }

    /// Write the current price for an (item, date, variation) triple.
    /// Last writer wins: a conflicting row is replaced, never duplicated.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_price(
        &self,
        item_id: i64,
        date: NaiveDate,
        price_zeny: i64,
        refine: u32,
        attachment_ids: &[i64],
        free_text: Option<&str>,
        key: &VariationKey,
    ) -> Result<()> {
        let attachments_json = serde_json::to_string(attachment_ids)?;
        sqlx::query(
            r#"
            INSERT INTO prices (item_id, date, price_zeny, refine, attachment_ids,
                                free_text, variation_key, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(item_id, date, variation_key) DO UPDATE SET
                price_zeny = excluded.price_zeny,
                refine = excluded.refine,
                attachment_ids = excluded.attachment_ids,
                free_text = excluded.free_text,
                created_at = excluded.created_at
            "#,
        )
        .bind(item_id)
        .bind(date)
        .bind(price_zeny)
        .bind(refine as i64)
        .bind(attachments_json)
        .bind(free_text)
        .bind(key.as_str())
        .bind(now_ns())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove one price row. Returns the deleted price, or `NotFound` if the
    /// (item, date, variation) triple has no row.
    pub async fn delete_price(
        &self,
        item_id: i64,
        date: NaiveDate,
        key: &VariationKey,
    ) -> Result<i64> {
        let old_price = self
            .existing_price(item_id, date, key)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "price for item {item_id} on {date} ({})",
                    key.as_str()
                ))
            })?;

        sqlx::query("DELETE FROM prices WHERE item_id = ? AND date = ? AND variation_key = ?")
            .bind(item_id)
            .bind(date)
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;

        info!(item_id, %date, key = key.as_str(), "price row deleted");
        Ok(old_price)
    }

    // -----------------------------------------------------------------------
    // Change requests
    // -----------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn create_change_request(
        &self,
        item_id: i64,
        date: NaiveDate,
        key: &VariationKey,
        old_price_zeny: i64,
        new_price_zeny: i64,
        requested_by: &str,
        reason: Option<&str>,
    ) -> Result<i64> {
        let res = sqlx::query(
            r#"
            INSERT INTO change_requests (item_id, date, variation_key, old_price_zeny,
                                         new_price_zeny, requested_by, reason, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item_id)
        .bind(date)
        .bind(key.as_str())
        .bind(old_price_zeny)
        .bind(new_price_zeny)
        .bind(requested_by)
        .bind(reason)
        .bind(RequestStatus::Pending.to_string())
        .bind(now_ns())
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn pending_requests(&self) -> Result<Vec<ChangeRequest>> {
        let rows: Vec<ChangeRequestRow> = sqlx::query_as(
            r#"
            SELECT id, item_id, date, variation_key, old_price_zeny, new_price_zeny,
                   requested_by, reason, status, reviewer, review_comment,
                   created_at, reviewed_at
            FROM change_requests
            WHERE status = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(RequestStatus::Pending.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(request_from_row).collect()
    }

    /// Approve a pending request: write the new price and close the request
    /// in one transaction. Fails if the request is not pending or the target
    /// price row no longer exists.
    pub async fn approve_request(
        &self,
        id: i64,
        reviewer: &str,
        comment: Option<&str>,
    ) -> Result<ChangeRequest> {
        let reviewed_at = now_ns();
        let mut tx = self.pool.begin().await?;

        let row = fetch_pending(&mut tx, id).await?;

        let updated = sqlx::query(
            "UPDATE prices SET price_zeny = ?, created_at = ?
             WHERE item_id = ? AND date = ? AND variation_key = ?",
        )
        .bind(row.new_price_zeny)
        .bind(reviewed_at)
        .bind(row.item_id)
        .bind(row.date)
        .bind(row.variation_key.as_str())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "price row for request {id} no longer exists"
            )));
        }

        sqlx::query(
            "UPDATE change_requests SET status = ?, reviewer = ?, review_comment = ?, reviewed_at = ?
             WHERE id = ?",
        )
        .bind(RequestStatus::Approved.to_string())
        .bind(reviewer)
        .bind(comment)
        .bind(reviewed_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            request_id = id,
            reviewer, "change request approved, price updated"
        );

        request_from_row(ChangeRequestRow {
            status: RequestStatus::Approved.to_string(),
            reviewer: Some(reviewer.to_string()),
            review_comment: comment.map(str::to_string),
            reviewed_at: Some(reviewed_at),
            ..row
        })
    }

    /// Reject a pending request. No price is written.
    pub async fn reject_request(
        &self,
        id: i64,
        reviewer: &str,
        comment: Option<&str>,
    ) -> Result<ChangeRequest> {
        let reviewed_at = now_ns();
        let mut tx = self.pool.begin().await?;

        let row = fetch_pending(&mut tx, id).await?;

        sqlx::query(
            "UPDATE change_requests SET status = ?, reviewer = ?, review_comment = ?, reviewed_at = ?
             WHERE id = ?",
        )
        .bind(RequestStatus::Rejected.to_string())
        .bind(reviewer)
        .bind(comment)
        .bind(reviewed_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(request_id = id, reviewer, "change request rejected");

        request_from_row(ChangeRequestRow {
            status: RequestStatus::Rejected.to_string(),
            reviewer: Some(reviewer.to_string()),
            review_comment: comment.map(str::to_string),
            reviewed_at: Some(reviewed_at),
            ..row
        })
    }

    // -----------------------------------------------------------------------
    // Audit trail
    // -----------------------------------------------------------------------

    /// Record a price action. Callers treat failures as non-fatal.
    /// `new_price_zeny` is `None` for deletions.
    #[allow(clippy::too_many_arguments)]
    pub async fn audit(
        &self,
        item_id: i64,
        date: NaiveDate,
        key: &VariationKey,
        action: &str,
        actor: &str,
        old_price_zeny: Option<i64>,
        new_price_zeny: Option<i64>,
        request_id: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_audit_log (item_id, date, variation_key, action, actor,
                                         old_price_zeny, new_price_zeny, request_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item_id)
        .bind(date)
        .bind(key.as_str())
        .bind(action)
        .bind(actor)
        .bind(old_price_zeny)
        .bind(new_price_zeny)
        .bind(request_id)
        .bind(now_ns())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn fetch_pending(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: i64,
) -> Result<ChangeRequestRow> {
    let row: Option<ChangeRequestRow> = sqlx::query_as(
        r#"
        SELECT id, item_id, date, variation_key, old_price_zeny, new_price_zeny,
               requested_by, reason, status, reviewer, review_comment,
               created_at, reviewed_at
        FROM change_requests
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    let row = row.ok_or_else(|| AppError::NotFound(format!("change request {id}")))?;
    if row.status != RequestStatus::Pending.to_string() {
        return Err(AppError::Validation(format!(
            "change request {id} is already {}",
            row.status
        )));
    }
    Ok(row)
}

fn observation_from_row(row: PriceRow, catalog: &ItemCatalog) -> Result<PriceObservation> {
    let attachment_ids: Vec<i64> = serde_json::from_str(&row.attachment_ids)?;
    let refine = u32::try_from(row.refine)
        .map_err(|_| AppError::Decode(format!("negative refine level {}", row.refine)))?;

    let display_label = derive_display_label(
        &row.item_name,
        refine,
        &attachment_ids,
        row.free_text.as_deref(),
        |id| catalog.resolve(id),
    );

    Ok(PriceObservation {
        item_id: row.item_id,
        item_name: row.item_name,
        date: row.date,
        price_zeny: row.price_zeny,
        refine,
        attachment_ids,
        free_text: row.free_text,
        variation_key: VariationKey::from_stored(row.variation_key),
        display_label,
        recorded_at_ns: row.created_at,
    })
}

fn request_from_row(row: ChangeRequestRow) -> Result<ChangeRequest> {
    let status = RequestStatus::parse(&row.status)
        .ok_or_else(|| AppError::Decode(format!("unknown request status '{}'", row.status)))?;

    Ok(ChangeRequest {
        id: row.id,
        item_id: row.item_id,
        date: row.date,
        variation_key: VariationKey::from_stored(row.variation_key),
        old_price_zeny: row.old_price_zeny,
        new_price_zeny: row.new_price_zeny,
        requested_by: row.requested_by,
        reason: row.reason,
        status,
        reviewer: row.reviewer,
        review_comment: row.review_comment,
        created_at_ns: row.created_at,
        reviewed_at_ns: row.reviewed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variation::derive_key;
    use sqlx::sqlite::SqlitePoolOptions;

    // Single connection: every handle on an in-memory database must share it.
    async fn test_store() -> PriceStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        PriceStore::new(pool)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    async fn seed_price(store: &PriceStore, key: &VariationKey, price: i64) {
        store.upsert_item(1101, "Espada").await.unwrap();
        store
            .upsert_price(1101, day(1), price, 0, &[], None, key)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn approve_writes_price_and_closes_request() {
        let store = test_store().await;
        let key = derive_key(0, &[], None);
        seed_price(&store, &key, 100).await;

        let id = store
            .create_change_request(1101, day(1), &key, 100, 130, "jogador", Some("typo"))
            .await
            .unwrap();

        let approved = store.approve_request(id, "gm", None).await.unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(approved.reviewer.as_deref(), Some("gm"));
        assert_eq!(
            store.existing_price(1101, day(1), &key).await.unwrap(),
            Some(130)
        );
        assert!(store.pending_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reject_leaves_price_untouched() {
        let store = test_store().await;
        let key = derive_key(0, &[], None);
        seed_price(&store, &key, 100).await;

        let id = store
            .create_change_request(1101, day(1), &key, 100, 130, "jogador", None)
            .await
            .unwrap();

        let rejected = store.reject_request(id, "gm", Some("no evidence")).await.unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.review_comment.as_deref(), Some("no evidence"));
        assert_eq!(
            store.existing_price(1101, day(1), &key).await.unwrap(),
            Some(100)
        );
        assert!(store.pending_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reviewing_a_closed_request_is_refused() {
        let store = test_store().await;
        let key = derive_key(0, &[], None);
        seed_price(&store, &key, 100).await;

        let id = store
            .create_change_request(1101, day(1), &key, 100, 130, "jogador", None)
            .await
            .unwrap();
        store.approve_request(id, "gm", None).await.unwrap();

        let again = store.approve_request(id, "gm", None).await;
        assert!(matches!(again, Err(AppError::Validation(_))));
        let reject = store.reject_request(id, "gm", None).await;
        assert!(matches!(reject, Err(AppError::Validation(_))));
        // The first review stands.
        assert_eq!(
            store.existing_price(1101, day(1), &key).await.unwrap(),
            Some(130)
        );
    }

    #[tokio::test]
    async fn approve_fails_when_price_row_is_gone() {
        let store = test_store().await;
        let key = derive_key(0, &[], None);
        seed_price(&store, &key, 100).await;

        let id = store
            .create_change_request(1101, day(1), &key, 100, 130, "jogador", None)
            .await
            .unwrap();
        store.delete_price(1101, day(1), &key).await.unwrap();

        let res = store.approve_request(id, "gm", None).await;
        assert!(matches!(res, Err(AppError::NotFound(_))));

        // Transaction rolled back: the request is still reviewable.
        let pending = store.pending_requests().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn delete_removes_row_and_reports_missing() {
        let store = test_store().await;
        let key = derive_key(9, &[], None);
        store.upsert_item(1101, "Espada").await.unwrap();
        store
            .upsert_price(1101, day(1), 250, 9, &[], None, &key)
            .await
            .unwrap();

        let old = store.delete_price(1101, day(1), &key).await.unwrap();
        assert_eq!(old, 250);
        assert_eq!(store.existing_price(1101, day(1), &key).await.unwrap(), None);

        let again = store.delete_price(1101, day(1), &key).await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }
}
