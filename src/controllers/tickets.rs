use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::services::reservation::{
    Acknowledgement, ModifySeatRequest, PurchaseRequest, ReceiptResponse,
};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets", post(purchase))
        .route("/tickets/seat", patch(modify_seat))
        .route("/tickets/{user_id}", get(get_receipt))
}

// POST /api/tickets
async fn purchase(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<ReceiptResponse>, ApiError> {
    state.service.purchase(req).map(Json)
}

// PATCH /api/tickets/seat
// Не найденный билет - это success=false в теле, а не ошибка HTTP
async fn modify_seat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ModifySeatRequest>,
) -> Result<Json<Acknowledgement>, ApiError> {
    state.service.modify_seat(req).map(Json)
}

// GET /api/tickets/{user_id}
async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ReceiptResponse>, ApiError> {
    state.service.get_receipt(&user_id).map(Json)
}
