use crate::{
    AppState, accounts,
    auth::{self, AuthUser},
    error::AppError,
    models::{
        DeleteOutcome, Document, EmailQuery, InsertOutcome, RecordId, Registration,
        SellerVerification, TokenResponse, UpdateOutcome, document_from, is_flag_set,
    },
    repository::{Collection, Filter, Patch},
    roles::{self, AdminCheck, Role, SellerBuyerCheck},
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::Value;

fn require_email(query: EmailQuery) -> Result<String, AppError> {
    query
        .email
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| AppError::InvalidArgument("the email query parameter is required".into()))
}

// --- Liveness ---

/// root
///
/// [Public Route] Static acknowledgement that the process is serving.
#[utoipa::path(get, path = "/", responses((status = 200, description = "Running", body = String)))]
pub async fn root() -> &'static str {
    "Server is running"
}

// --- Credentials ---

/// issue_jwt
///
/// [Public Route] Issues a 24-hour access token for a registered email.
///
/// *Soft fail*: an unknown (or missing) email is answered with status 403 and
/// `{"accessToken": ""}` rather than an error body.
#[utoipa::path(
    get,
    path = "/jwt",
    params(EmailQuery),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 403, description = "No such account; empty token", body = TokenResponse)
    )
)]
pub async fn issue_jwt(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<TokenResponse>, AppError> {
    let email = query
        .email
        .ok_or_else(|| AppError::AccountNotFound(String::new()))?;
    let access_token =
        auth::issue_for_account(state.repo.as_ref(), &email, &state.config.jwt_secret).await?;
    Ok(Json(TokenResponse { access_token }))
}

// --- Categories ---

/// get_categories
///
/// [Public Route] Lists every phone category.
#[utoipa::path(get, path = "/categories", responses((status = 200, description = "Categories", body = [Object])))]
pub async fn get_categories(State(state): State<AppState>) -> Result<Json<Vec<Document>>, AppError> {
    let categories = state
        .repo
        .find(Collection::Categories, &Filter::all())
        .await?;
    Ok(Json(categories))
}

/// get_category_phones
///
/// [Public Route] Lists the listings filed under a brand.
#[utoipa::path(
    get,
    path = "/categories/{brand}",
    params(("brand" = String, Path, description = "Category (brand) name")),
    responses((status = 200, description = "Listings in the category", body = [Object]))
)]
pub async fn get_category_phones(
    State(state): State<AppState>,
    Path(brand): Path<String>,
) -> Result<Json<Vec<Document>>, AppError> {
    let phones = state
        .repo
        .find(Collection::Phones, &Filter::all().eq("category", brand))
        .await?;
    Ok(Json(phones))
}

// --- Listings ---

/// create_phone
///
/// [Public Route] Stores a new listing exactly as submitted.
#[utoipa::path(
    post,
    path = "/phones",
    request_body = Object,
    responses(
        (status = 200, description = "Inserted", body = InsertOutcome),
        (status = 400, description = "Body is not a JSON object")
    )
)]
pub async fn create_phone(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<InsertOutcome>, AppError> {
    let outcome = state
        .repo
        .insert_one(Collection::Phones, document_from(body)?)
        .await?;
    Ok(Json(outcome))
}

/// get_phones
///
/// [Public Route] Lists the listings owned by `?email=`.
#[utoipa::path(
    get,
    path = "/phones",
    params(EmailQuery),
    responses((status = 200, description = "Owned listings", body = [Object]))
)]
pub async fn get_phones(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let email = require_email(query)?;
    let phones = state
        .repo
        .find(Collection::Phones, &Filter::all().eq("email", email))
        .await?;
    Ok(Json(phones))
}

/// delete_phone
///
/// [Public Route] Removes a listing by id.
#[utoipa::path(
    delete,
    path = "/phones/{id}",
    params(("id" = String, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Delete outcome", body = DeleteOutcome),
        (status = 400, description = "Malformed id")
    )
)]
pub async fn delete_phone(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let id = RecordId::parse(&id)?;
    let outcome = state
        .repo
        .delete_one(Collection::Phones, &Filter::by_id(id))
        .await?;
    Ok(Json(outcome))
}

/// advertise_phone
///
/// [Public Route] Flags a listing as advertised. Upserts: an unknown id
/// creates a document holding only the flag.
#[utoipa::path(
    patch,
    path = "/phones/announce/{id}",
    params(("id" = String, Path, description = "Listing id")),
    responses((status = 200, description = "Update outcome", body = UpdateOutcome))
)]
pub async fn advertise_phone(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UpdateOutcome>, AppError> {
    let id = RecordId::parse(&id)?;
    let outcome = state
        .repo
        .upsert_one(
            Collection::Phones,
            &Filter::by_id(id),
            &Patch::set("advertise", true),
        )
        .await?;
    Ok(Json(outcome))
}

/// get_advertised_phones
///
/// [Public Route] Lists advertised listings that are not sold yet.
#[utoipa::path(
    get,
    path = "/phones/announce",
    responses((status = 200, description = "Advertised, unsold listings", body = [Object]))
)]
pub async fn get_advertised_phones(
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, AppError> {
    let advertised = state
        .repo
        .find(Collection::Phones, &Filter::all())
        .await?
        .into_iter()
        .filter(|phone| is_flag_set(phone, "advertise") && !is_flag_set(phone, "sold"))
        .collect();
    Ok(Json(advertised))
}

// --- Accounts ---

/// create_user
///
/// [Public Route] Registers an account on first sign-in. Re-submitting a
/// known email returns the stored account instead of inserting a duplicate.
#[utoipa::path(
    post,
    path = "/users",
    request_body = Object,
    responses(
        (status = 200, description = "Inserted outcome or the existing account", body = Object),
        (status = 400, description = "Missing email")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Registration>, AppError> {
    let registration = accounts::register_account(state.repo.as_ref(), document_from(body)?).await?;
    Ok(Json(registration))
}

/// get_admin_status
///
/// [Authenticated Route] Reports whether `email` belongs to an admin.
#[utoipa::path(
    get,
    path = "/users/admin/{email}",
    params(("email" = String, Path, description = "Account email")),
    responses(
        (status = 200, description = "Admin check", body = AdminCheck),
        (status = 401, description = "No credential"),
        (status = 403, description = "Invalid credential")
    ),
    security(("bearer" = []))
)]
pub async fn get_admin_status(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<AdminCheck>, AppError> {
    let role = roles::resolve_role(state.repo.as_ref(), &email).await?;
    Ok(Json(role.admin_check()))
}

/// get_seller_buyer_status
///
/// [Authenticated Route] Reports `{isSeller: true}` for sellers and
/// `{isBuyer: ...}` for everyone else.
#[utoipa::path(
    get,
    path = "/users/{email}",
    params(("email" = String, Path, description = "Account email")),
    responses(
        (status = 200, description = "Seller/buyer check", body = SellerBuyerCheck),
        (status = 401, description = "No credential"),
        (status = 403, description = "Invalid credential")
    ),
    security(("bearer" = []))
)]
pub async fn get_seller_buyer_status(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<SellerBuyerCheck>, AppError> {
    let role = roles::resolve_role(state.repo.as_ref(), &email).await?;
    Ok(Json(role.seller_buyer_check()))
}

/// verify_seller
///
/// [Authenticated Route] Marks a seller account and all of its listings verified.
#[utoipa::path(
    put,
    path = "/users/seller/{email}",
    params(("email" = String, Path, description = "Seller email")),
    responses((status = 200, description = "Verification outcome", body = SellerVerification)),
    security(("bearer" = []))
)]
pub async fn verify_seller(
    AuthUser { email: verified_by, .. }: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<SellerVerification>, AppError> {
    tracing::debug!(%email, %verified_by, "seller verification requested");
    let outcome = accounts::verify_seller(state.repo.as_ref(), &email).await?;
    Ok(Json(outcome))
}

/// get_account
///
/// [Public Route] Returns the stored account for `email`, or `null`.
#[utoipa::path(
    get,
    path = "/users/isVerfied/{email}",
    params(("email" = String, Path, description = "Account email")),
    responses((status = 200, description = "Account or null", body = Object))
)]
pub async fn get_account(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Option<Document>>, AppError> {
    let account = accounts::find_account(state.repo.as_ref(), &email).await?;
    Ok(Json(account))
}

// --- Admin ---

/// list_buyers
///
/// [Admin Route] Lists every buyer account.
#[utoipa::path(
    get,
    path = "/admin/users/buyers",
    responses((status = 200, description = "Buyer accounts", body = [Object])),
    security(("bearer" = []))
)]
pub async fn list_buyers(State(state): State<AppState>) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(
        accounts::list_by_role(state.repo.as_ref(), Role::Buyer).await?,
    ))
}

/// list_sellers
///
/// [Admin Route] Lists every seller account.
#[utoipa::path(
    get,
    path = "/admin/users/sellers",
    responses((status = 200, description = "Seller accounts", body = [Object])),
    security(("bearer" = []))
)]
pub async fn list_sellers(State(state): State<AppState>) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(
        accounts::list_by_role(state.repo.as_ref(), Role::Seller).await?,
    ))
}

/// delete_user
///
/// [Admin Route] Deletes an account by id. Mounted under both
/// `/admin/users/buyers/{id}` and `/admin/users/sellers/{id}`.
#[utoipa::path(
    delete,
    path = "/admin/users/buyers/{id}",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Delete outcome", body = DeleteOutcome),
        (status = 400, description = "Malformed id")
    ),
    security(("bearer" = []))
)]
pub async fn delete_user(
    AuthUser { email: admin, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let id = RecordId::parse(&id)?;
    let outcome = state
        .repo
        .delete_one(Collection::Users, &Filter::by_id(id))
        .await?;
    tracing::info!(%admin, id = %id.as_uuid(), deleted = outcome.deleted_count, "account deletion");
    Ok(Json(outcome))
}

// --- Orders ---

/// create_order
///
/// [Authenticated Route] Stores a booking exactly as submitted.
#[utoipa::path(
    post,
    path = "/myorders",
    request_body = Object,
    responses((status = 200, description = "Inserted", body = InsertOutcome)),
    security(("bearer" = []))
)]
pub async fn create_order(
    AuthUser { email, .. }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<InsertOutcome>, AppError> {
    let outcome = state
        .repo
        .insert_one(Collection::Orders, document_from(body)?)
        .await?;
    tracing::info!(placed_by = %email, id = %outcome.inserted_id, "order placed");
    Ok(Json(outcome))
}

/// get_my_orders
///
/// [Authenticated Route] Lists the orders of `?email=`, defaulting to the
/// email the access token was issued for.
#[utoipa::path(
    get,
    path = "/myorders",
    params(EmailQuery),
    responses((status = 200, description = "Orders", body = [Object])),
    security(("bearer" = []))
)]
pub async fn get_my_orders(
    AuthUser { email: token_email, .. }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let email = query.email.unwrap_or(token_email);
    let orders = state
        .repo
        .find(Collection::Orders, &Filter::all().eq("email", email))
        .await?;
    Ok(Json(orders))
}

/// delete_order
///
/// [Authenticated Route] Cancels an order by id.
#[utoipa::path(
    delete,
    path = "/myorders/{id}",
    params(("id" = String, Path, description = "Order id")),
    responses(
        (status = 200, description = "Delete outcome", body = DeleteOutcome),
        (status = 400, description = "Malformed id")
    ),
    security(("bearer" = []))
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let id = RecordId::parse(&id)?;
    let outcome = state
        .repo
        .delete_one(Collection::Orders, &Filter::by_id(id))
        .await?;
    Ok(Json(outcome))
}

// --- Reports ---

/// report_phone
///
/// [Authenticated Route] Flags a listing as reported to the admins. Upserts
/// like `advertise_phone`.
#[utoipa::path(
    put,
    path = "/product/reported/{id}",
    params(("id" = String, Path, description = "Listing id")),
    responses((status = 200, description = "Update outcome", body = UpdateOutcome)),
    security(("bearer" = []))
)]
pub async fn report_phone(
    AuthUser { email, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UpdateOutcome>, AppError> {
    let id = RecordId::parse(&id)?;
    let outcome = state
        .repo
        .upsert_one(
            Collection::Phones,
            &Filter::by_id(id),
            &Patch::set("reported", true),
        )
        .await?;
    tracing::info!(reported_by = %email, id = %id.as_uuid(), "listing reported");
    Ok(Json(outcome))
}

/// get_reported_phones
///
/// [Public Route] Lists every reported listing.
#[utoipa::path(
    get,
    path = "/product/reported",
    responses((status = 200, description = "Reported listings", body = [Object]))
)]
pub async fn get_reported_phones(
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, AppError> {
    let reported = state
        .repo
        .find(Collection::Phones, &Filter::all().eq("reported", true))
        .await?;
    Ok(Json(reported))
}

/// delete_reported_phone
///
/// [Authenticated Route] Removes a reported listing by id.
#[utoipa::path(
    delete,
    path = "/product/reported/{id}",
    params(("id" = String, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Delete outcome", body = DeleteOutcome),
        (status = 400, description = "Malformed id")
    ),
    security(("bearer" = []))
)]
pub async fn delete_reported_phone(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let id = RecordId::parse(&id)?;
    let outcome = state
        .repo
        .delete_one(Collection::Phones, &Filter::by_id(id))
        .await?;
    Ok(Json(outcome))
}
