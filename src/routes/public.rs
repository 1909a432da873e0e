use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

/// Public Router Module
///
/// Endpoints reachable without a credential: liveness, token issuance,
/// catalogue browsing, listing management and first sign-in.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Static acknowledgement that the process is serving.
        .route("/", get(handlers::root))
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /jwt?email=...
        // Issues an access token for a registered email; `{"accessToken": ""}` otherwise.
        .route("/jwt", get(handlers::issue_jwt))
        // --- Catalogue ---
        .route("/categories", get(handlers::get_categories))
        // GET /categories/{brand}
        // Listings filed under one brand.
        .route("/categories/{brand}", get(handlers::get_category_phones))
        // --- Listings ---
        .route(
            "/phones",
            get(handlers::get_phones).post(handlers::create_phone),
        )
        .route("/phones/{id}", delete(handlers::delete_phone))
        // GET /phones/announce
        // Advertised listings that are not sold yet.
        .route("/phones/announce", get(handlers::get_advertised_phones))
        .route("/phones/announce/{id}", patch(handlers::advertise_phone))
        // GET /product/reported
        // Listings flagged to the admins.
        .route("/product/reported", get(handlers::get_reported_phones))
        // --- Accounts ---
        // POST /users
        // First sign-in; idempotent per email.
        .route("/users", post(handlers::create_user))
        // The misspelt path is what deployed clients call; the corrected one is an alias.
        .route("/users/isVerfied/{email}", get(handlers::get_account))
        .route("/users/isVerified/{email}", get(handlers::get_account))
}
