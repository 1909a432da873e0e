use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get},
};

/// Admin Router Module
///
/// Account moderation endpoints, nested under `/admin`. The router is wrapped
/// in the same bearer-token gate as the authenticated routes.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users/buyers
        .route("/users/buyers", get(handlers::list_buyers))
        // DELETE /admin/users/buyers/{id}
        .route("/users/buyers/{id}", delete(handlers::delete_user))
        // GET /admin/users/sellers
        .route("/users/sellers", get(handlers::list_sellers))
        // DELETE /admin/users/sellers/{id}
        .route("/users/sellers/{id}", delete(handlers::delete_user))
}
