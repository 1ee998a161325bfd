pub mod users;
pub mod tickets;
pub mod sections;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(users::routes())
        .merge(tickets::routes())
        .merge(sections::routes())
}
