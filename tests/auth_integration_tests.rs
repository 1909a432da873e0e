use axum::{
    extract::FromRequestParts,
    http::{Method, Request, Uri, header, request::Parts},
};
use chrono::{Duration, Utc};
use oldie_mobile_api::{
    AppError, AppState, AuthError,
    auth::{self, AuthUser, TOKEN_LIFETIME_HOURS},
    config::AppConfig,
    repository::{Collection, MemoryRepository, Repository},
};
use serde_json::json;
use std::sync::Arc;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_EMAIL: &str = "seller@oldie.com";

fn create_app_state(repo: MemoryRepository) -> AppState {
    let mut config = AppConfig::default();
    config.jwt_secret = TEST_JWT_SECRET.to_string();

    AppState {
        repo: Arc::new(repo),
        config,
    }
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn parts_with_authorization(value: &str) -> Parts {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(value).unwrap(),
    );
    parts
}

async fn repo_with_account(email: &str) -> MemoryRepository {
    let repo = MemoryRepository::new();
    repo.insert_one(
        Collection::Users,
        json!({"email": email, "role": "seller"})
            .as_object()
            .cloned()
            .unwrap(),
    )
    .await
    .unwrap();
    repo
}

// --- Gate Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let token = auth::issue_token(TEST_EMAIL, TEST_JWT_SECRET).unwrap();
    let app_state = create_app_state(MemoryRepository::new());

    let mut parts = parts_with_authorization(&format!("Bearer {}", token));
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    let user = auth_user.unwrap();
    assert_eq!(user.email, TEST_EMAIL);
    assert_eq!(user.expires_at - user.issued_at, TOKEN_LIFETIME_HOURS * 3600);
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(MemoryRepository::new());
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), AuthError::Unauthorized);
}

#[tokio::test]
async fn test_auth_failure_with_malformed_header() {
    let app_state = create_app_state(MemoryRepository::new());
    let token = auth::issue_token(TEST_EMAIL, TEST_JWT_SECRET).unwrap();

    // Token without the scheme, wrong scheme, and garbage after the scheme.
    for value in [token.clone(), format!("Token {}", token), "Bearer not-a-jwt".to_string()] {
        let mut parts = parts_with_authorization(&value);
        let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
        assert_eq!(auth_user.unwrap_err(), AuthError::Forbidden, "{value}");
    }
}

#[tokio::test]
async fn test_auth_failure_with_foreign_signature() {
    let app_state = create_app_state(MemoryRepository::new());
    let token = auth::issue_token(TEST_EMAIL, "some-other-secret").unwrap();

    let mut parts = parts_with_authorization(&format!("Bearer {}", token));
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), AuthError::Forbidden);
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let app_state = create_app_state(MemoryRepository::new());
    let issued_at = Utc::now() - Duration::hours(TOKEN_LIFETIME_HOURS) - Duration::minutes(1);
    let token = auth::issue_token_at(TEST_EMAIL, TEST_JWT_SECRET, issued_at).unwrap();

    let mut parts = parts_with_authorization(&format!("Bearer {}", token));
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), AuthError::Forbidden);
}

#[tokio::test]
async fn test_auth_failure_at_expiry_second() {
    let app_state = create_app_state(MemoryRepository::new());
    // exp lands on the current second, which is already outside the window.
    let issued_at = Utc::now() - Duration::hours(TOKEN_LIFETIME_HOURS);
    let token = auth::issue_token_at(TEST_EMAIL, TEST_JWT_SECRET, issued_at).unwrap();

    let mut parts = parts_with_authorization(&format!("Bearer {}", token));
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), AuthError::Forbidden);
}

#[tokio::test]
async fn test_auth_failure_with_empty_header_is_unauthorized() {
    let app_state = create_app_state(MemoryRepository::new());
    let mut parts = parts_with_authorization("");

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), AuthError::Unauthorized);
}

#[tokio::test]
async fn test_token_valid_until_end_of_lifetime() {
    // Issued 23 hours ago: still inside the 24 hour window.
    let issued_at = Utc::now() - Duration::hours(TOKEN_LIFETIME_HOURS - 1);
    let token = auth::issue_token_at(TEST_EMAIL, TEST_JWT_SECRET, issued_at).unwrap();

    let claims = auth::verify_token(&token, TEST_JWT_SECRET).unwrap();
    assert_eq!(claims.email, TEST_EMAIL);
}

#[tokio::test]
async fn test_identity_attached_by_gate_is_reused() {
    let app_state = create_app_state(MemoryRepository::new());
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    let attached = AuthUser {
        email: TEST_EMAIL.to_string(),
        issued_at: 0,
        expires_at: 1,
    };
    parts.extensions.insert(attached.clone());

    // No Authorization header: the extension alone satisfies the extractor.
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(auth_user.unwrap(), attached);
}

// --- Issuer Tests ---

#[tokio::test]
async fn test_issue_for_unknown_account_is_account_not_found() {
    let repo = MemoryRepository::new();

    let result = auth::issue_for_account(&repo, "nobody@oldie.com", TEST_JWT_SECRET).await;

    assert!(matches!(result, Err(AppError::AccountNotFound(email)) if email == "nobody@oldie.com"));
}

#[tokio::test]
async fn test_issue_for_known_account_signs_email() {
    let repo = repo_with_account(TEST_EMAIL).await;

    let token = auth::issue_for_account(&repo, TEST_EMAIL, TEST_JWT_SECRET)
        .await
        .unwrap();

    assert!(!token.is_empty());
    let claims = auth::verify_token(&token, TEST_JWT_SECRET).unwrap();
    assert_eq!(claims.email, TEST_EMAIL);
    assert_eq!(claims.exp - claims.iat, TOKEN_LIFETIME_HOURS * 3600);
}

#[tokio::test]
async fn test_issue_surfaces_store_failure() {
    let repo = MemoryRepository::failing();

    let result = auth::issue_for_account(&repo, TEST_EMAIL, TEST_JWT_SECRET).await;

    assert!(matches!(result, Err(AppError::Store(_))));
}
