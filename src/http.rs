//! REST surface for the inventory service.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;
use validator::Validate;

use crate::domain::stock::{StockMovement, StockRecord, StockStats};
use crate::domain::sync::SyncIntent;
use crate::error::InventoryError;
use crate::service::dto::{
    AdjustStockDto, CreateInventoryDto, ReserveStockDto, TransferStockDto, UpdateInventoryDto,
};
use crate::service::ledger::InventoryView;
use crate::service::transfer::TransferOutcome;
use crate::service::{InventoryService, SyncBridge};

#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<InventoryService>,
    pub bridge: Arc<SyncBridge>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/inventory", get(list_inventory).post(create_inventory))
        .route("/api/v1/inventory/low-stock", get(low_stock))
        .route("/api/v1/inventory/out-of-stock", get(out_of_stock))
        .route("/api/v1/inventory/stats", get(stats))
        .route("/api/v1/inventory/product/:product_id", get(by_product))
        .route(
            "/api/v1/inventory/:id",
            get(get_inventory).put(update_inventory).delete(delete_inventory),
        )
        .route("/api/v1/inventory/:id/adjust", post(adjust_stock))
        .route("/api/v1/inventory/:id/transfer", post(transfer_stock))
        .route("/api/v1/inventory/:id/reserve", post(reserve_stock))
        .route("/api/v1/inventory/:id/movements", get(movements))
        .route("/api/v1/sync/product/:product_id", post(sync_product))
        .route("/api/v1/sync/flush", post(flush_sync))
        .route("/api/v1/sync/pending", get(pending_sync))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "stockroom"}))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: i64,
}

type HandlerResult<T> = std::result::Result<T, InventoryError>;

fn validated<T: Validate>(dto: T) -> HandlerResult<T> {
    dto.validate()
        .map_err(|e| InventoryError::Validation(e.to_string()))?;
    Ok(dto)
}

async fn list_inventory(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> HandlerResult<Json<PaginatedResponse<InventoryView>>> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).clamp(1, 100);
    let (data, total) = state.inventory.list(page, per_page).await?;
    Ok(Json(PaginatedResponse {
        data,
        total,
        page,
        per_page,
        total_pages: (total + per_page as i64 - 1) / per_page as i64,
    }))
}

async fn create_inventory(
    State(state): State<AppState>,
    Json(dto): Json<CreateInventoryDto>,
) -> HandlerResult<(StatusCode, Json<StockRecord>)> {
    let dto = validated(dto)?;
    let record = state.inventory.create_inventory(dto).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_inventory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<StockRecord>> {
    Ok(Json(state.inventory.get(id).await?))
}

async fn update_inventory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(dto): Json<UpdateInventoryDto>,
) -> HandlerResult<Json<StockRecord>> {
    let dto = validated(dto)?;
    Ok(Json(state.inventory.update_inventory(id, dto).await?))
}

async fn delete_inventory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HandlerResult<StatusCode> {
    state.inventory.delete_inventory(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn by_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(params): Query<ByProductParams>,
) -> HandlerResult<Json<Vec<StockRecord>>> {
    Ok(Json(
        state
            .inventory
            .find_by_product(product_id, params.size.as_deref())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ByProductParams {
    pub size: Option<String>,
}

async fn low_stock(State(state): State<AppState>) -> HandlerResult<Json<Vec<InventoryView>>> {
    Ok(Json(state.inventory.low_stock().await?))
}

async fn out_of_stock(State(state): State<AppState>) -> HandlerResult<Json<Vec<InventoryView>>> {
    Ok(Json(state.inventory.out_of_stock().await?))
}

async fn stats(State(state): State<AppState>) -> HandlerResult<Json<StockStats>> {
    Ok(Json(state.inventory.stats().await?))
}

async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(dto): Json<AdjustStockDto>,
) -> HandlerResult<Json<StockRecord>> {
    let dto = validated(dto)?;
    Ok(Json(state.inventory.adjust_stock(id, dto).await?))
}

async fn transfer_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(dto): Json<TransferStockDto>,
) -> HandlerResult<Json<TransferOutcome>> {
    let dto = validated(dto)?;
    Ok(Json(state.inventory.transfer_stock(id, dto).await?))
}

async fn reserve_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(dto): Json<ReserveStockDto>,
) -> HandlerResult<Json<StockRecord>> {
    let dto = validated(dto)?;
    Ok(Json(
        state.inventory.set_reserved(id, dto.reserved_stock).await?,
    ))
}

async fn movements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<Vec<StockMovement>>> {
    Ok(Json(state.inventory.movements(id).await?))
}

async fn sync_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> HandlerResult<StatusCode> {
    state.bridge.sync_product_by_id(product_id).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn flush_sync(State(state): State<AppState>) -> HandlerResult<Json<serde_json::Value>> {
    let applied = state.bridge.flush_pending().await?;
    Ok(Json(serde_json::json!({ "applied": applied })))
}

async fn pending_sync(State(state): State<AppState>) -> HandlerResult<Json<Vec<SyncIntent>>> {
    Ok(Json(state.bridge.pending_intents().await?))
}
