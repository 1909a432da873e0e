use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    PgConnection, PgPool, Postgres, postgres::PgPoolOptions, query_builder::QueryBuilder,
};
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{DeleteOutcome, Document, ID_FIELD, InsertOutcome, RecordId, UpdateOutcome},
};

/// Collection
///
/// The four document collections of the marketplace. Each maps to its own
/// table with an identical `(id, doc, created_at)` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Categories,
    Phones,
    Users,
    Orders,
}

impl Collection {
    /// The backing table name. Only ever interpolated from this fixed set.
    pub fn table(self) -> &'static str {
        match self {
            Collection::Categories => "categories",
            Collection::Phones => "phones",
            Collection::Users => "users",
            Collection::Orders => "orders",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Filter
///
/// A conjunction of top-level field equalities, optionally narrowed to a
/// single document identifier. `Filter::all()` matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    id: Option<Uuid>,
    fields: Document,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: RecordId) -> Self {
        Self {
            id: Some(id.as_uuid()),
            fields: Document::new(),
        }
    }

    /// Adds an equality condition on a top-level field.
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn fields(&self) -> &Document {
        &self.fields
    }

    pub fn matches(&self, id: Uuid, document: &Document) -> bool {
        self.id.is_none_or(|wanted| wanted == id)
            && self
                .fields
                .iter()
                .all(|(field, value)| document.get(field) == Some(value))
    }

    // The equality fields become the starting content of an upserted document.
    fn seed(&self) -> Document {
        self.fields.clone()
    }
}

/// Patch
///
/// A set of top-level fields to write. Applying a patch replaces each named
/// field in full and leaves every other field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch(Document);

impl Patch {
    pub fn set(field: &str, value: impl Into<Value>) -> Self {
        let mut fields = Document::new();
        fields.insert(field.to_string(), value.into());
        Self(fields)
    }

    /// Applies the patch in place, returning whether anything changed.
    pub fn apply(&self, document: &mut Document) -> bool {
        let mut changed = false;
        for (field, value) in &self.0 {
            if document.get(field) != Some(value) {
                document.insert(field.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }

    fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Repository Trait
///
/// The document-store contract every handler talks to. Implementations are
/// constructed explicitly at startup and injected through `AppState`; nothing
/// holds a process-wide connection.
///
/// No guarantee spans two calls. `upsert_one` is the only compound operation
/// and is atomic on its own.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError>;

    async fn find(&self, collection: Collection, filter: &Filter)
    -> Result<Vec<Document>, StoreError>;

    /// Stores a new document under a freshly generated identifier. Any `_id`
    /// supplied by the caller is discarded. A `users` document whose string
    /// `email` is already on file fails with `StoreError::DuplicateEmail`.
    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<InsertOutcome, StoreError>;

    /// Patches the first matching document. Matching nothing is not an error.
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Patches every matching document.
    async fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Insert-or-update: patches the first matching document, or inserts the
    /// filter's equality fields merged with the patch when nothing matches.
    /// An `_id` in the filter becomes the identifier of the inserted document.
    async fn upsert_one(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Deletes the first matching document.
    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<DeleteOutcome, StoreError>;

    /// Releases the underlying connections. Called once during shutdown.
    async fn close(&self);
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- PostgreSQL Implementation ---

/// PostgresRepository
///
/// Stores each collection as a table of JSONB documents. Filters compile to
/// JSONB containment (`doc @> filter`), which is exact equality for the
/// scalar fields the handlers filter on.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool against `db_url`.
    pub async fn connect(db_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Creates the collection tables if they are missing.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    builder.push(" WHERE doc @> ");
    builder.push_bind(Value::Object(filter.fields().clone()));
    if let Some(id) = filter.id() {
        builder.push(" AND id = ");
        builder.push_bind(id);
    }
}

fn into_document(
    collection: Collection,
    id: Uuid,
    payload: Value,
) -> Result<Document, StoreError> {
    match payload {
        Value::Object(mut document) => {
            document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            Ok(document)
        }
        _ => Err(StoreError::NotAnObject { collection, id }),
    }
}

fn strip_id(mut document: Document) -> Document {
    document.remove(ID_FIELD);
    document
}

async fn first_match(
    conn: &mut PgConnection,
    collection: Collection,
    filter: &Filter,
) -> Result<Option<Uuid>, StoreError> {
    let mut builder = QueryBuilder::new(format!("SELECT id FROM {}", collection.table()));
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY created_at LIMIT 1 FOR UPDATE");
    Ok(builder
        .build_query_scalar::<Uuid>()
        .fetch_optional(&mut *conn)
        .await?)
}

async fn count_matches(
    conn: &mut PgConnection,
    collection: Collection,
    filter: &Filter,
) -> Result<u64, StoreError> {
    let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", collection.table()));
    push_filter(&mut builder, filter);
    let count = builder
        .build_query_scalar::<i64>()
        .fetch_one(&mut *conn)
        .await?;
    Ok(u64::try_from(count).unwrap_or_default())
}

// Rows that already hold every patched value are left alone so that the
// returned count only covers real modifications.
async fn patch_matches(
    conn: &mut PgConnection,
    collection: Collection,
    filter: &Filter,
    patch: &Patch,
) -> Result<u64, StoreError> {
    let mut builder = QueryBuilder::new(format!("UPDATE {} SET doc = doc || ", collection.table()));
    builder.push_bind(patch.to_value());
    push_filter(&mut builder, filter);
    builder.push(" AND NOT doc @> ");
    builder.push_bind(patch.to_value());
    Ok(builder.build().execute(&mut *conn).await?.rows_affected())
}

async fn insert_with_id(
    conn: &mut PgConnection,
    collection: Collection,
    id: Uuid,
    document: Document,
) -> Result<(), StoreError> {
    let inserted = sqlx::query(&format!(
        "INSERT INTO {} (id, doc) VALUES ($1, $2)",
        collection.table()
    ))
    .bind(id)
    .bind(Value::Object(strip_id(document)))
    .execute(&mut *conn)
    .await;

    match inserted {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(StoreError::DuplicateEmail(collection))
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let mut builder =
            QueryBuilder::new(format!("SELECT id, doc FROM {}", collection.table()));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at LIMIT 1");

        let row = builder
            .build_query_as::<(Uuid, Value)>()
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(id, payload)| into_document(collection, id, payload))
            .transpose()
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError> {
        let mut builder =
            QueryBuilder::new(format!("SELECT id, doc FROM {}", collection.table()));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at");

        builder
            .build_query_as::<(Uuid, Value)>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(id, payload)| into_document(collection, id, payload))
            .collect()
    }

    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<InsertOutcome, StoreError> {
        let id = Uuid::new_v4();
        let mut conn = self.pool.acquire().await?;
        insert_with_id(&mut conn, collection, id, document).await?;
        Ok(InsertOutcome::new(id))
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let outcome = match first_match(&mut tx, collection, filter).await? {
            Some(id) => {
                let target = Filter::by_id(id.into());
                let modified = patch_matches(&mut tx, collection, &target, patch).await?;
                UpdateOutcome::matched(1, modified)
            }
            None => UpdateOutcome::matched(0, 0),
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let matched = count_matches(&mut tx, collection, filter).await?;
        let modified = patch_matches(&mut tx, collection, filter, patch).await?;
        tx.commit().await?;
        Ok(UpdateOutcome::matched(matched, modified))
    }

    async fn upsert_one(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let outcome = match first_match(&mut tx, collection, filter).await? {
            Some(id) => {
                let target = Filter::by_id(id.into());
                let modified = patch_matches(&mut tx, collection, &target, patch).await?;
                UpdateOutcome::matched(1, modified)
            }
            None => {
                let id = filter.id().unwrap_or_else(Uuid::new_v4);
                let mut document = filter.seed();
                patch.apply(&mut document);
                insert_with_id(&mut tx, collection, id, document).await?;
                UpdateOutcome::upserted(id)
            }
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<DeleteOutcome, StoreError> {
        let table = collection.table();
        let mut builder = QueryBuilder::new(format!(
            "DELETE FROM {table} WHERE id = (SELECT id FROM {table}"
        ));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at LIMIT 1)");

        let result = builder.build().execute(&self.pool).await?;
        Ok(DeleteOutcome::new(result.rows_affected()))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// --- In-Memory Implementation (Tests and Local Experiments) ---

/// MemoryRepository
///
/// A `Repository` held entirely in process memory, with the same matching
/// and patching semantics as the Postgres implementation. Documents keep
/// insertion order.
#[derive(Default)]
pub struct MemoryRepository {
    collections: RwLock<HashMap<Collection, Vec<(Uuid, Document)>>>,
    /// When true, every operation fails with `StoreError::Unavailable`.
    pub should_fail: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.should_fail {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        Ok(())
    }
}

// Mirrors the unique index on `users (doc->>'email')`.
fn email_taken(collection: Collection, docs: &[(Uuid, Document)], document: &Document) -> bool {
    let Some(email) = document.get("email").and_then(Value::as_str) else {
        return false;
    };
    collection == Collection::Users
        && docs
            .iter()
            .any(|(_, doc)| doc.get("email").and_then(Value::as_str) == Some(email))
}

fn with_id(id: Uuid, document: &Document) -> Document {
    let mut document = document.clone();
    document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    document
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        self.check()?;
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).and_then(|docs| {
            docs.iter()
                .find(|(id, doc)| filter.matches(*id, doc))
                .map(|(id, doc)| with_id(*id, doc))
        }))
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError> {
        self.check()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(id, doc)| filter.matches(*id, doc))
                    .map(|(id, doc)| with_id(*id, doc))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<InsertOutcome, StoreError> {
        self.check()?;
        let id = Uuid::new_v4();
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if email_taken(collection, docs, &document) {
            return Err(StoreError::DuplicateEmail(collection));
        }
        docs.push((id, strip_id(document)));
        Ok(InsertOutcome::new(id))
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> Result<UpdateOutcome, StoreError> {
        self.check()?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        Ok(match docs.iter_mut().find(|(id, doc)| filter.matches(*id, doc)) {
            Some((_, doc)) => UpdateOutcome::matched(1, u64::from(patch.apply(doc))),
            None => UpdateOutcome::matched(0, 0),
        })
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> Result<UpdateOutcome, StoreError> {
        self.check()?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        let (mut matched, mut modified) = (0, 0);
        for (id, doc) in docs.iter_mut() {
            if filter.matches(*id, doc) {
                matched += 1;
                if patch.apply(doc) {
                    modified += 1;
                }
            }
        }
        Ok(UpdateOutcome::matched(matched, modified))
    }

    async fn upsert_one(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
    ) -> Result<UpdateOutcome, StoreError> {
        self.check()?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if let Some((_, doc)) = docs.iter_mut().find(|(id, doc)| filter.matches(*id, doc)) {
            return Ok(UpdateOutcome::matched(1, u64::from(patch.apply(doc))));
        }

        let id = filter.id().unwrap_or_else(Uuid::new_v4);
        let mut document = filter.seed();
        patch.apply(&mut document);
        docs.push((id, document));
        Ok(UpdateOutcome::upserted(id))
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<DeleteOutcome, StoreError> {
        self.check()?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        match docs.iter().position(|(id, doc)| filter.matches(*id, doc)) {
            Some(index) => {
                docs.remove(index);
                Ok(DeleteOutcome::new(1))
            }
            None => Ok(DeleteOutcome::new(0)),
        }
    }

    async fn close(&self) {}
}
