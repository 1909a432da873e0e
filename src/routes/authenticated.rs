use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the gate installed by `create_router`, so
/// handlers can rely on a verified `AuthUser` being present.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Role Resolution ---
        // GET /users/admin/{email} -> {isAdmin}
        .route("/users/admin/{email}", get(handlers::get_admin_status))
        // GET /users/{email} -> {isSeller: true} | {isBuyer}
        .route("/users/{email}", get(handlers::get_seller_buyer_status))
        // PUT /users/seller/{email}
        // Verifies the seller account (upsert) and all of its listings.
        .route("/users/seller/{email}", put(handlers::verify_seller))
        // --- Orders ---
        .route(
            "/myorders",
            get(handlers::get_my_orders).post(handlers::create_order),
        )
        .route("/myorders/{id}", delete(handlers::delete_order))
        // --- Reports ---
        // PUT flags a listing as reported; DELETE removes it.
        .route(
            "/product/reported/{id}",
            put(handlers::report_phone).delete(handlers::delete_reported_phone),
        )
}
