use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{error::AppError, roles::Role};

/// Document
///
/// A schemaless record as stored in one of the four collections. Listings,
/// orders and categories are kept in this raw form end to end; only accounts
/// are read through a typed view (`Account`).
pub type Document = Map<String, Value>;

/// The key under which a document's identifier is exposed in JSON.
pub const ID_FIELD: &str = "_id";

// --- Typed Views ---

/// Account
///
/// The typed view over a `users` document. Unknown fields (name, photo, ...)
/// stay in the stored document and are ignored here. Reading is total:
/// `POST /users` stores any JSON object, so every field falls back to a
/// default instead of failing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Account {
    pub id: Option<Uuid>,
    pub email: String,
    pub role: Role,
    pub verified: bool,
}

impl Account {
    pub fn from_document(document: &Document) -> Self {
        let text = |field: &str| document.get(field).and_then(Value::as_str);
        Self {
            id: text(ID_FIELD).and_then(|raw| Uuid::parse_str(raw).ok()),
            email: text("email").unwrap_or_default().to_string(),
            role: text("role").map(Role::from_stored).unwrap_or_default(),
            verified: is_flag_set(document, "verified"),
        }
    }
}

/// RecordId
///
/// A validated document identifier taken from a path segment. Malformed
/// identifiers are rejected up front instead of silently matching nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| AppError::InvalidArgument(format!("malformed record id: {raw:?}")))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for RecordId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Converts a JSON request body into a storable document.
pub fn document_from(body: Value) -> Result<Document, AppError> {
    match body {
        Value::Object(document) => Ok(document),
        other => Err(AppError::InvalidArgument(format!(
            "request body must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Reads a document field the way a loosely typed client treats flags:
/// missing, `null`, `false`, `0` and `""` are unset, everything else is set.
pub fn is_flag_set(document: &Document, field: &str) -> bool {
    match document.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// --- Query Parameters ---

/// EmailQuery
///
/// The `?email=` query parameter shared by the token, listing and order endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct EmailQuery {
    /// Owner or account email to filter by.
    pub email: Option<String>,
}

// --- Response Payloads ---

/// TokenResponse
///
/// Output of `GET /jwt`. An empty `accessToken` means no account matched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
}

impl TokenResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// InsertOutcome
///
/// Acknowledgement returned after a document is inserted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InsertOutcome {
    pub acknowledged: bool,
    pub inserted_id: Uuid,
}

impl InsertOutcome {
    pub fn new(inserted_id: Uuid) -> Self {
        Self {
            acknowledged: true,
            inserted_id,
        }
    }
}

/// UpdateOutcome
///
/// Acknowledgement returned by update and upsert operations. `modifiedCount`
/// only counts documents whose content actually changed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateOutcome {
    pub acknowledged: bool,
    #[ts(type = "number")]
    pub matched_count: u64,
    #[ts(type = "number")]
    pub modified_count: u64,
    #[ts(type = "number")]
    pub upserted_count: u64,
    pub upserted_id: Option<Uuid>,
}

impl UpdateOutcome {
    pub fn matched(matched_count: u64, modified_count: u64) -> Self {
        Self {
            acknowledged: true,
            matched_count,
            modified_count,
            upserted_count: 0,
            upserted_id: None,
        }
    }

    pub fn upserted(id: Uuid) -> Self {
        Self {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_count: 1,
            upserted_id: Some(id),
        }
    }
}

/// DeleteOutcome
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeleteOutcome {
    pub acknowledged: bool,
    #[ts(type = "number")]
    pub deleted_count: u64,
}

impl DeleteOutcome {
    pub fn new(deleted_count: u64) -> Self {
        Self {
            acknowledged: true,
            deleted_count,
        }
    }
}

/// SellerVerification
///
/// Output of `PUT /users/seller/{email}`: the account upsert and the bulk
/// listing update, reported side by side.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SellerVerification {
    pub existing_user: UpdateOutcome,
    pub existing_products: UpdateOutcome,
}

/// Registration
///
/// Output of `POST /users`: either the account already on file or the
/// acknowledgement of the freshly inserted one.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Registration {
    Existing(Document),
    Created(InsertOutcome),
}
