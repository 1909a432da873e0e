use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderValue, header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    error::{AppError, AuthError},
    repository::{Collection, Filter, Repository},
};

/// How long an issued access token stays valid.
pub const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Claims
///
/// The payload signed into every access token. Tokens are stateless: their
/// validity depends only on the signature and `exp`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// The account email the token was issued for.
    pub email: String,
    /// Issued At (iat), seconds since the Unix epoch.
    pub iat: i64,
    /// Expiration Time (exp), `iat` plus the token lifetime.
    pub exp: i64,
}

impl Claims {
    pub fn new(email: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            email: email.into(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
        }
    }
}

/// Signs a token for `email` that expires 24 hours from now.
pub fn issue_token(email: &str, secret: &str) -> Result<String, AppError> {
    issue_token_at(email, secret, Utc::now())
}

/// Signs a token for `email` as if it had been issued at `issued_at`.
pub fn issue_token_at(
    email: &str,
    secret: &str,
    issued_at: DateTime<Utc>,
) -> Result<String, AppError> {
    let claims = Claims::new(email, issued_at);
    let key = EncodingKey::from_secret(secret.as_bytes());
    Ok(encode(&Header::new(Algorithm::HS256), &claims, &key)?)
}

/// verify_token
///
/// Checks the signature and expiry of `token`. No clock leeway is granted:
/// a token is accepted only while the current second is before its `exp`.
/// Every failure collapses into `AuthError::Forbidden`.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    // Rejects `exp <= now`; the default only rejects `exp < now`.
    validation.reject_tokens_expiring_in_less_than = 1;

    match decode::<Claims>(token, &key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired access token"),
                _ => tracing::warn!(error = %e, "rejected invalid access token"),
            }
            Err(AuthError::Forbidden)
        }
    }
}

/// issue_for_account
///
/// Issues a token only when an account with `email` exists. An unknown email
/// yields `AppError::AccountNotFound`, which answers with an empty credential.
pub async fn issue_for_account(
    repo: &dyn Repository,
    email: &str,
    secret: &str,
) -> Result<String, AppError> {
    let account = repo
        .find_one(Collection::Users, &Filter::all().eq("email", email))
        .await?;
    if account.is_none() {
        return Err(AppError::AccountNotFound(email.to_string()));
    }

    let token = issue_token(email, secret)?;
    tracing::info!(%email, "issued access token");
    Ok(token)
}

/// Extracts `<token>` from a `Bearer <token>` header value.
fn bearer_token(value: &HeaderValue) -> Result<&str, AuthError> {
    let token = value
        .to_str()
        .ok()
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AuthError::Forbidden)?;

    if token.is_empty() {
        return Err(AuthError::Forbidden);
    }
    Ok(token)
}

/// AuthUser
///
/// The verified identity of a request on a gated route, built from the
/// token's claims.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub email: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            email: claims.email,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Reuses an identity already attached to the request by the gate middleware.
/// 2. Otherwise reads the `Authorization` header: absent or empty → 401.
/// 3. Requires the `Bearer <token>` form and a valid, unexpired token → else 403.
///
/// No store lookup happens here.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let config = AppConfig::from_ref(state);

        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::Unauthorized)?;
        let token = bearer_token(value)?;
        let claims = verify_token(token, &config.jwt_secret)?;

        Ok(AuthUser::from(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn test_claims_expire_after_lifetime() {
        let issued_at = Utc::now();
        let claims = Claims::new("a@b.com", issued_at);
        assert_eq!(claims.exp - claims.iat, TOKEN_LIFETIME_HOURS * 3600);
    }

    #[test]
    fn test_round_trip_preserves_email() {
        let token = issue_token("seller@shop.com", SECRET).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.email, "seller@shop.com");
    }

    #[test]
    fn test_wrong_secret_is_forbidden() {
        let token = issue_token("seller@shop.com", SECRET).unwrap();
        assert_eq!(
            verify_token(&token, "another-secret"),
            Err(AuthError::Forbidden)
        );
    }

    #[test]
    fn test_token_rejected_at_exact_expiry() {
        let issued_at = Utc::now() - Duration::hours(TOKEN_LIFETIME_HOURS);
        let token = issue_token_at("seller@shop.com", SECRET, issued_at).unwrap();
        assert_eq!(verify_token(&token, SECRET), Err(AuthError::Forbidden));
    }

    #[test]
    fn test_bearer_token_requires_scheme() {
        let ok = HeaderValue::from_static("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&ok), Ok("abc.def.ghi"));

        for bad in ["abc.def.ghi", "Basic abc", "Bearer ", "Bearer    "] {
            let value = HeaderValue::from_static(bad);
            assert_eq!(bearer_token(&value), Err(AuthError::Forbidden), "{bad}");
        }
    }
}
