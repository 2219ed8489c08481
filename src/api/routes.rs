use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::health::HealthState;
use crate::config::Config;
use crate::db::store::PriceStore;
use crate::error::AppError;
use crate::now_ns;
use crate::state::ItemCatalog;
use crate::summary::{compute_summary, history_insights, top_movers, HistoryInsights};
use crate::types::{ChangeRequest, Item, SummaryRow};
use crate::validation::validate_submission;
use crate::variation::{derive_display_label, derive_key, VariationKey};

#[derive(Clone)]
pub struct ApiState {
    pub store: PriceStore,
    pub catalog: Arc<ItemCatalog>,
    pub config: Arc<Config>,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/items", get(get_items).post(post_item))
        .route("/items/:id/history", get(get_item_history))
        .route("/variations/preview", post(preview_variation))
        .route("/prices", post(post_price).delete(delete_price))
        .route("/summary", get(get_summary))
        .route("/summary/top", get(get_top_movers))
        .route("/requests/pending", get(get_pending_requests))
        .route("/requests/:id/approve", post(approve_request))
        .route("/requests/:id/reject", post(reject_request))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request/response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct NewItem {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize)]
pub struct VariationSpec {
    pub item_id: i64,
    #[serde(default)]
    pub refine: u32,
    #[serde(default)]
    pub attachment_ids: Vec<i64>,
    pub free_text: Option<String>,
}

#[derive(Serialize)]
pub struct VariationPreview {
    pub variation_key: VariationKey,
    pub display_label: String,
}

#[derive(Deserialize)]
pub struct PriceSubmission {
    pub item_id: i64,
    pub date: NaiveDate,
    pub price_zeny: i64,
    #[serde(default)]
    pub refine: u32,
    #[serde(default)]
    pub attachment_ids: Vec<i64>,
    pub free_text: Option<String>,
    pub submitted_by: String,
    pub reason: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// First price for this (item, date, variation) — written directly.
    Created,
    /// Existing price overwritten by an admin.
    Updated,
    /// Existing price, non-admin submitter — queued for review.
    RequestCreated,
}

#[derive(Serialize)]
pub struct PriceSubmissionOutcome {
    pub status: SubmissionStatus,
    pub variation_key: VariationKey,
    pub old_price_zeny: Option<i64>,
    pub request_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct PriceDeletion {
    pub item_id: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub refine: u32,
    #[serde(default)]
    pub attachment_ids: Vec<i64>,
    pub free_text: Option<String>,
    pub deleted_by: String,
}

#[derive(Serialize)]
pub struct PriceDeletionOutcome {
    pub variation_key: VariationKey,
    pub old_price_zeny: i64,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub refine: Option<u32>,
    /// Comma-separated attachment ids.
    pub attachment_ids: Option<String>,
    pub free_text: Option<String>,
}

#[derive(Serialize)]
pub struct ObservationResponse {
    pub date: NaiveDate,
    pub price_zeny: i64,
    pub variation_key: VariationKey,
    pub display_label: String,
    pub recorded_at_ns: i64,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub item: Item,
    pub observations: Vec<ObservationResponse>,
    pub insights: Option<HistoryInsights>,
}

#[derive(Deserialize)]
pub struct TopQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct TopMoversResponse {
    pub gainers: Vec<SummaryRow>,
    pub losers: Vec<SummaryRow>,
}

#[derive(Deserialize)]
pub struct ReviewAction {
    pub reviewer: String,
    pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "items": state.catalog.len(),
        "started_at_ns": state.health.started_at_ns(),
        "last_price_write_ns": state.health.last_price_write_ns(),
        "summary_reads": state.health.summary_reads(),
    }))
}

async fn get_items(State(state): State<ApiState>) -> Result<Json<Vec<Item>>, AppError> {
    Ok(Json(state.store.items().await?))
}

async fn post_item(
    State(state): State<ApiState>,
    Json(req): Json<NewItem>,
) -> Result<Json<Item>, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("item name must not be empty".to_string()));
    }
    state.store.upsert_item(req.id, name).await?;
    state.catalog.insert(req.id, name);
    Ok(Json(Item {
        id: req.id,
        name: name.to_string(),
    }))
}

/// Resolve a configuration to its key and label without writing anything.
/// Called by the form while the user is editing, so the eventual submission
/// carries a correct variation key.
async fn preview_variation(
    State(state): State<ApiState>,
    Json(req): Json<VariationSpec>,
) -> Result<Json<VariationPreview>, AppError> {
    let item = state
        .store
        .item(req.item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("item {}", req.item_id)))?;

    let variation_key = derive_key(req.refine, &req.attachment_ids, req.free_text.as_deref());
    let display_label = derive_display_label(
        &item.name,
        req.refine,
        &req.attachment_ids,
        req.free_text.as_deref(),
        |id| state.catalog.resolve(id),
    );

    Ok(Json(VariationPreview {
        variation_key,
        display_label,
    }))
}

async fn post_price(
    State(state): State<ApiState>,
    Json(req): Json<PriceSubmission>,
) -> Result<Json<PriceSubmissionOutcome>, AppError> {
    let today = Local::now().date_naive();
    validate_submission(
        req.price_zeny,
        req.refine,
        &req.attachment_ids,
        req.date,
        today,
    )?;

    if !state.catalog.contains(req.item_id) {
        return Err(AppError::NotFound(format!("item {}", req.item_id)));
    }

    let key = derive_key(req.refine, &req.attachment_ids, req.free_text.as_deref());
    let existing = state.store.existing_price(req.item_id, req.date, &key).await?;

    match existing {
        None => {
            state
                .store
                .upsert_price(
                    req.item_id,
                    req.date,
                    req.price_zeny,
                    req.refine,
                    &req.attachment_ids,
                    req.free_text.as_deref(),
                    &key,
                )
                .await?;
            state.health.mark_price_write(now_ns());
            audit_best_effort(
                &state, req.item_id, req.date, &key, "insert", &req.submitted_by, None,
                Some(req.price_zeny), None,
            )
            .await;

            Ok(Json(PriceSubmissionOutcome {
                status: SubmissionStatus::Created,
                variation_key: key,
                old_price_zeny: None,
                request_id: None,
            }))
        }
        Some(old_price) if state.config.is_admin(&req.submitted_by) => {
            state
                .store
                .upsert_price(
                    req.item_id,
                    req.date,
                    req.price_zeny,
                    req.refine,
                    &req.attachment_ids,
                    req.free_text.as_deref(),
                    &key,
                )
                .await?;
            state.health.mark_price_write(now_ns());
            audit_best_effort(
                &state, req.item_id, req.date, &key, "update", &req.submitted_by,
                Some(old_price), Some(req.price_zeny), None,
            )
            .await;

            Ok(Json(PriceSubmissionOutcome {
                status: SubmissionStatus::Updated,
                variation_key: key,
                old_price_zeny: Some(old_price),
                request_id: None,
            }))
        }
        Some(old_price) => {
            let request_id = state
                .store
                .create_change_request(
                    req.item_id,
                    req.date,
                    &key,
                    old_price,
                    req.price_zeny,
                    &req.submitted_by,
                    req.reason.as_deref(),
                )
                .await?;
            audit_best_effort(
                &state, req.item_id, req.date, &key, "request", &req.submitted_by,
                Some(old_price), Some(req.price_zeny), Some(request_id),
            )
            .await;

            Ok(Json(PriceSubmissionOutcome {
                status: SubmissionStatus::RequestCreated,
                variation_key: key,
                old_price_zeny: Some(old_price),
                request_id: Some(request_id),
            }))
        }
    }
}

/// Permanently remove one price row. Admin-only; the deletion itself is
/// permanent but leaves an audit row behind.
async fn delete_price(
    State(state): State<ApiState>,
    Json(req): Json<PriceDeletion>,
) -> Result<Json<PriceDeletionOutcome>, AppError> {
    require_admin(&state, &req.deleted_by)?;

    let key = derive_key(req.refine, &req.attachment_ids, req.free_text.as_deref());
    let old_price = state.store.delete_price(req.item_id, req.date, &key).await?;
    state.health.mark_price_write(now_ns());
    audit_best_effort(
        &state,
        req.item_id,
        req.date,
        &key,
        "delete",
        &req.deleted_by,
        Some(old_price),
        None,
        None,
    )
    .await;

    Ok(Json(PriceDeletionOutcome {
        variation_key: key,
        old_price_zeny: old_price,
    }))
}

async fn get_item_history(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let item = state
        .store
        .item(item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("item {item_id}")))?;

    // Any variation parameter narrows the series to that exact configuration;
    // with none given, the item's full history is returned.
    let variation = if params.refine.is_some()
        || params.attachment_ids.is_some()
        || params.free_text.is_some()
    {
        let attachments = match params.attachment_ids.as_deref() {
            Some(raw) => parse_attachment_list(raw)?,
            None => Vec::new(),
        };
        Some(derive_key(
            params.refine.unwrap_or(0),
            &attachments,
            params.free_text.as_deref(),
        ))
    } else {
        None
    };

    let observations = state
        .store
        .item_observations(item_id, variation.as_ref(), &state.catalog)
        .await?;

    let prices: Vec<i64> = observations.iter().map(|o| o.price_zeny).collect();
    let insights = history_insights(&prices);

    let observations = observations
        .into_iter()
        .map(|o| ObservationResponse {
            date: o.date,
            price_zeny: o.price_zeny,
            variation_key: o.variation_key,
            display_label: o.display_label,
            recorded_at_ns: o.recorded_at_ns,
        })
        .collect();

    Ok(Json(HistoryResponse {
        item,
        observations,
        insights,
    }))
}

async fn get_summary(State(state): State<ApiState>) -> Result<Json<Vec<SummaryRow>>, AppError> {
    let observations = state.store.load_observations(&state.catalog).await?;
    state.health.inc_summary_reads();
    Ok(Json(compute_summary(&observations)))
}

async fn get_top_movers(
    State(state): State<ApiState>,
    Query(params): Query<TopQuery>,
) -> Result<Json<TopMoversResponse>, AppError> {
    let limit = params.limit.unwrap_or(5);
    let observations = state.store.load_observations(&state.catalog).await?;
    state.health.inc_summary_reads();
    let rows = compute_summary(&observations);
    let (gainers, losers) = top_movers(&rows, limit);
    Ok(Json(TopMoversResponse { gainers, losers }))
}

async fn get_pending_requests(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ChangeRequest>>, AppError> {
    Ok(Json(state.store.pending_requests().await?))
}

async fn approve_request(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(action): Json<ReviewAction>,
) -> Result<Json<ChangeRequest>, AppError> {
    require_admin(&state, &action.reviewer)?;
    let request = state
        .store
        .approve_request(id, &action.reviewer, action.comment.as_deref())
        .await?;
    state.health.mark_price_write(now_ns());
    audit_best_effort(
        &state,
        request.item_id,
        request.date,
        &request.variation_key,
        "approve",
        &action.reviewer,
        Some(request.old_price_zeny),
        Some(request.new_price_zeny),
        Some(request.id),
    )
    .await;
    Ok(Json(request))
}

async fn reject_request(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(action): Json<ReviewAction>,
) -> Result<Json<ChangeRequest>, AppError> {
    require_admin(&state, &action.reviewer)?;
    let request = state
        .store
        .reject_request(id, &action.reviewer, action.comment.as_deref())
        .await?;
    audit_best_effort(
        &state,
        request.item_id,
        request.date,
        &request.variation_key,
        "reject",
        &action.reviewer,
        Some(request.old_price_zeny),
        Some(request.new_price_zeny),
        Some(request.id),
    )
    .await;
    Ok(Json(request))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_admin(state: &ApiState, user: &str) -> Result<(), AppError> {
    if state.config.is_admin(user) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{user} is not allowed to perform admin actions"
        )))
    }
}

fn parse_attachment_list(raw: &str) -> Result<Vec<i64>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AppError::Validation(format!("invalid attachment id '{s}'")))
        })
        .collect()
}

/// Audit writes never fail the action that triggered them.
#[allow(clippy::too_many_arguments)]
async fn audit_best_effort(
    state: &ApiState,
    item_id: i64,
    date: NaiveDate,
    key: &VariationKey,
    action: &str,
    actor: &str,
    old_price_zeny: Option<i64>,
    new_price_zeny: Option<i64>,
    request_id: Option<i64>,
) {
    if let Err(e) = state
        .store
        .audit(
            item_id,
            date,
            key,
            action,
            actor,
            old_price_zeny,
            new_price_zeny,
            request_id,
        )
        .await
    {
        warn!("Failed to write price audit log: {e}");
    }
}
