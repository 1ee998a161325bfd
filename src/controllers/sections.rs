use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::services::reservation::SectionResponse;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sections", get(view_users_by_section))
}

#[derive(Debug, Deserialize)]
pub struct SectionQuery {
    pub section: Option<String>,
}

// GET /api/sections?section=A
async fn view_users_by_section(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SectionQuery>,
) -> Json<SectionResponse> {
    Json(state.service.view_users_by_section(params.section.as_deref()))
}
