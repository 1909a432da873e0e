use serde_json::Value;

use crate::{
    error::{AppError, StoreError},
    models::{Document, Registration, SellerVerification},
    repository::{Collection, Filter, Patch, Repository},
    roles::Role,
};

fn by_email(email: &str) -> Filter {
    Filter::all().eq("email", email)
}

/// Returns the stored account document for `email`, if any.
pub async fn find_account(repo: &dyn Repository, email: &str) -> Result<Option<Document>, AppError> {
    Ok(repo.find_one(Collection::Users, &by_email(email)).await?)
}

/// register_account
///
/// First sign-in creates the account; submitting an email that is already on
/// file returns the stored document unchanged. The submitted body must carry
/// a string `email`. When a concurrent sign-in wins the insert, the account it
/// stored is returned.
pub async fn register_account(
    repo: &dyn Repository,
    account: Document,
) -> Result<Registration, AppError> {
    let email = match account.get("email") {
        Some(Value::String(email)) if !email.trim().is_empty() => email.clone(),
        _ => {
            return Err(AppError::InvalidArgument(
                "account must carry a non-empty string email".into(),
            ));
        }
    };

    if let Some(existing) = find_account(repo, &email).await? {
        tracing::debug!(%email, "account already registered");
        return Ok(Registration::Existing(existing));
    }

    match repo.insert_one(Collection::Users, account).await {
        Ok(outcome) => {
            tracing::info!(%email, id = %outcome.inserted_id, "registered account");
            Ok(Registration::Created(outcome))
        }
        Err(StoreError::DuplicateEmail(_)) => {
            tracing::debug!(%email, "account registered concurrently");
            find_account(repo, &email)
                .await?
                .map(Registration::Existing)
                .ok_or_else(|| StoreError::DuplicateEmail(Collection::Users).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// verify_seller
///
/// Marks the account for `email` verified, creating `{email, verified: true}`
/// when no account exists, then marks every listing owned by `email` verified.
/// The two writes are independent; the second runs even if it matches nothing.
pub async fn verify_seller(
    repo: &dyn Repository,
    email: &str,
) -> Result<SellerVerification, AppError> {
    let filter = by_email(email);
    let verified = Patch::set("verified", true);

    // A concurrent first insert of the same email loses on the unique index;
    // the retry then matches the winner's document.
    let existing_user = match repo.upsert_one(Collection::Users, &filter, &verified).await {
        Err(StoreError::DuplicateEmail(_)) => {
            repo.upsert_one(Collection::Users, &filter, &verified).await?
        }
        outcome => outcome?,
    };
    let existing_products = repo
        .update_many(Collection::Phones, &filter, &verified)
        .await?;

    tracing::info!(
        %email,
        account_created = existing_user.upserted_count > 0,
        listings = existing_products.matched_count,
        "verified seller"
    );
    Ok(SellerVerification {
        existing_user,
        existing_products,
    })
}

/// Lists every account holding `role`.
pub async fn list_by_role(repo: &dyn Repository, role: Role) -> Result<Vec<Document>, AppError> {
    Ok(repo
        .find(Collection::Users, &Filter::all().eq("role", role.as_str()))
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{DeleteOutcome, InsertOutcome, UpdateOutcome},
        repository::MemoryRepository,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Answers the first account lookup with "absent", as a sign-in racing
    /// another one for the same email would observe.
    struct StaleFirstLookup {
        inner: MemoryRepository,
        missed: AtomicBool,
    }

    #[async_trait]
    impl Repository for StaleFirstLookup {
        async fn find_one(
            &self,
            collection: Collection,
            filter: &Filter,
        ) -> Result<Option<Document>, StoreError> {
            if !self.missed.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_one(collection, filter).await
        }

        async fn find(
            &self,
            collection: Collection,
            filter: &Filter,
        ) -> Result<Vec<Document>, StoreError> {
            self.inner.find(collection, filter).await
        }

        async fn insert_one(
            &self,
            collection: Collection,
            document: Document,
        ) -> Result<InsertOutcome, StoreError> {
            self.inner.insert_one(collection, document).await
        }

        async fn update_one(
            &self,
            collection: Collection,
            filter: &Filter,
            patch: &Patch,
        ) -> Result<UpdateOutcome, StoreError> {
            self.inner.update_one(collection, filter, patch).await
        }

        async fn update_many(
            &self,
            collection: Collection,
            filter: &Filter,
            patch: &Patch,
        ) -> Result<UpdateOutcome, StoreError> {
            self.inner.update_many(collection, filter, patch).await
        }

        async fn upsert_one(
            &self,
            collection: Collection,
            filter: &Filter,
            patch: &Patch,
        ) -> Result<UpdateOutcome, StoreError> {
            self.inner.upsert_one(collection, filter, patch).await
        }

        async fn delete_one(
            &self,
            collection: Collection,
            filter: &Filter,
        ) -> Result<DeleteOutcome, StoreError> {
            self.inner.delete_one(collection, filter).await
        }

        async fn close(&self) {}
    }

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_register_returns_winner_of_concurrent_sign_in() {
        let inner = MemoryRepository::new();
        inner
            .insert_one(
                Collection::Users,
                doc(json!({"email": "race@shop.com", "name": "First"})),
            )
            .await
            .unwrap();
        let repo = StaleFirstLookup {
            inner,
            missed: AtomicBool::new(false),
        };

        let registration = register_account(
            &repo,
            doc(json!({"email": "race@shop.com", "name": "Second"})),
        )
        .await
        .unwrap();

        match registration {
            Registration::Existing(account) => assert_eq!(account["name"], json!("First")),
            other => panic!("expected the stored account, got {other:?}"),
        }
        let users = repo.find(Collection::Users, &Filter::all()).await.unwrap();
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_missing_email() {
        let repo = MemoryRepository::new();
        let result = register_account(&repo, doc(json!({"email": 42}))).await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }
}
