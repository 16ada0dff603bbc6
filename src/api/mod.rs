/// API routes and handlers
pub mod auth;
pub mod extract;
pub mod groups;
pub mod health;
pub mod middleware;
pub mod posts;
pub mod response;
pub mod users;

use crate::context::AppContext;
use axum::Router;

/// Build the `/api` routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(posts::routes())
        .merge(groups::routes())
}
