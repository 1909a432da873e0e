use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{models::TokenResponse, repository::Collection};

/// MessageResponse
///
/// The JSON body used for every non-2xx answer that carries a message.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// AuthError
///
/// Rejections produced by the bearer-token gate. The two variants must stay
/// distinguishable because they map to different status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `Authorization` header was presented.
    #[error("unauthorized access")]
    Unauthorized,
    /// A header was presented but it is malformed, badly signed or expired.
    #[error("forbidden access")]
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()).into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(MessageResponse::new(self.to_string())),
            )
                .into_response(),
        }
    }
}

/// StoreError
///
/// Failures raised by a `Repository` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored row whose payload is not a JSON object.
    #[error("document {id} in {collection} is not a JSON object")]
    NotAnObject { collection: Collection, id: Uuid },

    /// An insert collided with an existing account email.
    #[error("duplicate email in {0}")]
    DuplicateEmail(Collection),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// AppError
///
/// The error type returned by every handler. Converting it into a response is
/// the single place where failures become status codes.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The token issuer found no account for the email. Answered with an
    /// empty credential instead of an error body.
    #[error("no account registered for {0:?}")]
    AccountNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Auth(err) => err.into_response(),
            Self::AccountNotFound(email) => {
                tracing::debug!(%email, "token requested for unknown account");
                (StatusCode::FORBIDDEN, Json(TokenResponse::empty())).into_response()
            }
            Self::InvalidArgument(reason) => (
                StatusCode::BAD_REQUEST,
                Json(MessageResponse::new(reason)),
            )
                .into_response(),
            Self::Store(err) => {
                tracing::error!(error = %err, "store operation failed");
                internal_error()
            }
            Self::Token(err) => {
                tracing::error!(error = %err, "failed to sign access token");
                internal_error()
            }
        }
    }
}

// Internal details stay in the logs.
fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(MessageResponse::new("internal server error")),
    )
        .into_response()
}
