use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};
use std::sync::Arc;

use crate::models::User;
use crate::services::reservation::Acknowledgement;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(add_user))
        .route("/users/{user_id}", delete(remove_user))
}

// POST /api/users
async fn add_user(
    State(state): State<Arc<AppState>>,
    Json(user): Json<User>,
) -> Json<Acknowledgement> {
    Json(state.service.add_user(user))
}

// DELETE /api/users/{user_id}
async fn remove_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<Acknowledgement> {
    Json(state.service.remove_user(&user_id))
}
