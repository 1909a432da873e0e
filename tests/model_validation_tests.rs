use oldie_mobile_api::{
    error::MessageResponse,
    models::{
        Account, DeleteOutcome, Document, InsertOutcome, Registration, SellerVerification,
        TokenResponse, UpdateOutcome,
    },
    roles::{AdminCheck, Role, SellerBuyerCheck},
};
use serde_json::{Value, json};
use uuid::Uuid;

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

// --- Response Shapes ---

#[test]
fn test_token_response_uses_camel_case() {
    let issued = TokenResponse {
        access_token: "a.b.c".into(),
    };
    assert_eq!(serde_json::to_value(&issued).unwrap(), json!({"accessToken": "a.b.c"}));
    assert_eq!(
        serde_json::to_value(TokenResponse::empty()).unwrap(),
        json!({"accessToken": ""})
    );
}

#[test]
fn test_write_outcomes_use_driver_field_names() {
    let id = Uuid::new_v4();

    assert_eq!(
        serde_json::to_value(InsertOutcome::new(id)).unwrap(),
        json!({"acknowledged": true, "insertedId": id})
    );
    assert_eq!(
        serde_json::to_value(UpdateOutcome::matched(3, 2)).unwrap(),
        json!({
            "acknowledged": true,
            "matchedCount": 3,
            "modifiedCount": 2,
            "upsertedCount": 0,
            "upsertedId": null
        })
    );
    assert_eq!(
        serde_json::to_value(DeleteOutcome::new(1)).unwrap(),
        json!({"acknowledged": true, "deletedCount": 1})
    );
}

#[test]
fn test_seller_verification_reports_both_updates() {
    let id = Uuid::new_v4();
    let outcome = SellerVerification {
        existing_user: UpdateOutcome::upserted(id),
        existing_products: UpdateOutcome::matched(0, 0),
    };

    let value = serde_json::to_value(&outcome).unwrap();

    assert_eq!(value["existingUser"]["upsertedCount"], json!(1));
    assert_eq!(value["existingUser"]["upsertedId"], json!(id));
    assert_eq!(value["existingProducts"]["matchedCount"], json!(0));
}

#[test]
fn test_registration_is_untagged() {
    let id = Uuid::new_v4();
    let created = Registration::Created(InsertOutcome::new(id));
    assert_eq!(
        serde_json::to_value(&created).unwrap(),
        json!({"acknowledged": true, "insertedId": id})
    );

    let stored = doc(json!({"_id": id, "email": "a@oldie.com", "name": "A"}));
    let existing = Registration::Existing(stored.clone());
    assert_eq!(serde_json::to_value(&existing).unwrap(), Value::Object(stored));
}

#[test]
fn test_role_checks_serialize_to_a_single_flag() {
    assert_eq!(
        serde_json::to_value(SellerBuyerCheck::Seller { is_seller: true }).unwrap(),
        json!({"isSeller": true})
    );
    assert_eq!(
        serde_json::to_value(SellerBuyerCheck::Buyer { is_buyer: false }).unwrap(),
        json!({"isBuyer": false})
    );
    assert_eq!(
        serde_json::to_value(AdminCheck { is_admin: true }).unwrap(),
        json!({"isAdmin": true})
    );
}

#[test]
fn test_message_response_shape() {
    assert_eq!(
        serde_json::to_value(MessageResponse::new("forbidden access")).unwrap(),
        json!({"message": "forbidden access"})
    );
}

// --- Account Parsing ---

#[test]
fn test_account_role_parsing() {
    let cases = [
        (json!("admin"), Role::Admin),
        (json!("seller"), Role::Seller),
        (json!("buyer"), Role::Buyer),
        (json!("moderator"), Role::Unset),
        (json!(""), Role::Unset),
        (Value::Null, Role::Unset),
        (json!(1), Role::Unset),
        (json!(["seller"]), Role::Unset),
    ];

    for (raw, expected) in cases {
        let account =
            Account::from_document(&doc(json!({"email": "x@oldie.com", "role": raw.clone()})));
        assert_eq!(account.role, expected, "{raw}");
    }
}

#[test]
fn test_account_reads_stored_identifier() {
    let id = Uuid::new_v4();
    let account = Account::from_document(&doc(json!({
        "_id": id.to_string(),
        "email": "seller@oldie.com",
        "role": "seller",
        "verified": true,
        "photoURL": "https://img.example/seller.png"
    })));

    assert_eq!(account.id, Some(id));
    assert_eq!(account.email, "seller@oldie.com");
    assert!(account.verified);
}

#[test]
fn test_role_display_matches_stored_value() {
    assert_eq!(Role::Seller.to_string(), "seller");
    assert_eq!(Role::Buyer.as_str(), "buyer");
    assert_eq!(Role::default(), Role::Unset);
}

#[test]
fn test_account_verified_follows_flag_truthiness() {
    for (raw, expected) in [
        (Value::Null, false),
        (json!("yes"), true),
        (json!(""), false),
        (json!(0), false),
        (json!(true), true),
    ] {
        let account =
            Account::from_document(&doc(json!({"email": "x@oldie.com", "verified": raw.clone()})));
        assert_eq!(account.verified, expected, "{raw}");
    }
}
