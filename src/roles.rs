use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::Account,
    repository::{Collection, Filter, Repository},
};

/// Role
///
/// The marketplace role recorded on an account. Accounts created by a plain
/// sign-in carry no role and resolve to `Unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Seller,
    Buyer,
    #[default]
    #[serde(other)]
    Unset,
}

impl Role {
    /// Maps a stored role string. Anything other than the three known
    /// roles reads as `Unset`.
    pub fn from_stored(raw: &str) -> Self {
        match raw {
            "admin" => Role::Admin,
            "seller" => Role::Seller,
            "buyer" => Role::Buyer,
            _ => Role::Unset,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Seller => "seller",
            Role::Buyer => "buyer",
            Role::Unset => "unset",
        }
    }

    /// The seller/buyer check. Sellers and buyers report their own flag;
    /// every other role reports `isBuyer: false`.
    pub fn seller_buyer_check(self) -> SellerBuyerCheck {
        match self {
            Role::Seller => SellerBuyerCheck::Seller { is_seller: true },
            Role::Buyer => SellerBuyerCheck::Buyer { is_buyer: true },
            Role::Admin | Role::Unset => SellerBuyerCheck::Buyer { is_buyer: false },
        }
    }

    /// The admin check, independent of the seller/buyer check.
    pub fn admin_check(self) -> AdminCheck {
        AdminCheck {
            is_admin: matches!(self, Role::Admin),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SellerBuyerCheck
///
/// Output of `GET /users/{email}`. Serializes to exactly one of
/// `{"isSeller": true}` or `{"isBuyer": <bool>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum SellerBuyerCheck {
    Seller {
        #[serde(rename = "isSeller")]
        is_seller: bool,
    },
    Buyer {
        #[serde(rename = "isBuyer")]
        is_buyer: bool,
    },
}

/// AdminCheck
///
/// Output of `GET /users/admin/{email}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminCheck {
    pub is_admin: bool,
}

/// resolve_role
///
/// Looks up the account for `email` and returns its role. An email with no
/// account resolves to `Role::Unset`, so both checks answer `false` for it.
pub async fn resolve_role(repo: &dyn Repository, email: &str) -> Result<Role, AppError> {
    let document = repo
        .find_one(Collection::Users, &Filter::all().eq("email", email))
        .await?;

    let role = match document {
        Some(document) => Account::from_document(&document).role,
        None => Role::Unset,
    };
    tracing::debug!(%email, %role, "resolved account role");
    Ok(role)
}
