//! Storefront API tests over the complete router.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::http::{StatusCode, header};
use serde_json::json;

use digitalhub_core::PaymentMethod;
use digitalhub_integration_tests::{PASSWORD, TestClient};
use digitalhub_storefront::checkout::CheckoutSettings;

#[tokio::test]
async fn test_health() {
    let client = TestClient::new();

    let response = client.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!("ok"));

    // No database configured: ready by definition.
    let response = client.get("/health/ready").await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_catalog_lists_products() {
    let client = TestClient::new();

    let response = client.get("/api/catalog").await;
    assert_eq!(response.status, StatusCode::OK);
    let products = response.body.as_array().unwrap();
    assert!(!products.is_empty());
    assert!(products.iter().any(|p| p["id"] == "netflix"));
}

#[tokio::test]
async fn test_purchase_journey() {
    let client = TestClient::new();
    client.sign_up("ada@example.com").await;

    let response = client
        .post("/api/home/purchase", &json!({ "product": "netflix" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.redirect_path(), Some("/checkout"));

    let response = client.get("/api/checkout").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["product"]["id"], "netflix");
    assert_eq!(response.data()["can_confirm"], false);
    assert_eq!(response.data()["state"], "idle");

    // Confirming without a payment method is refused.
    let response = client.post("/api/checkout/confirm", &json!({})).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = client
        .post(
            "/api/checkout/payment-method",
            &json!({ "method": PaymentMethod::Bitcoin }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["selected_method"], "bitcoin");
    assert_eq!(response.data()["can_confirm"], true);

    let response = client.post("/api/checkout/confirm", &json!({})).await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.data()["state"], "succeeded");
    let order_id = response.data()["confirmation"]["order_id"].clone();
    assert!(order_id.is_string());

    // The same checkout cannot be confirmed twice.
    let response = client.post("/api/checkout/confirm", &json!({})).await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = client.get("/api/profile").await;
    assert_eq!(response.status, StatusCode::OK);
    let history = &response.data()["history"];
    assert_eq!(history["count"], 1);
    assert_eq!(history["purchases"][0]["order_id"], order_id);
    assert_eq!(history["purchases"][0]["payment_method"], "bitcoin");
}

#[tokio::test]
async fn test_checkout_requires_sign_in() {
    let client = TestClient::new();

    let response = client.get("/api/checkout").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.redirect_path(), Some("/login"));
    assert_eq!(response.body["redirect"]["after_ms"], 2000);
    assert!(
        response
            .messages()
            .contains(&"Please login to complete purchase")
    );
}

#[tokio::test]
async fn test_purchase_requires_sign_in() {
    let client = TestClient::new();

    let response = client
        .post("/api/home/purchase", &json!({ "product": "netflix" }))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_product_is_rejected() {
    let client = TestClient::new();
    client.sign_up("ada@example.com").await;

    let response = client
        .post("/api/home/purchase", &json!({ "product": "no-such-thing" }))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_leaving_checkout_discards_it() {
    let client = TestClient::new();
    client.sign_up("ada@example.com").await;
    client
        .post("/api/home/purchase", &json!({ "product": "spotify" }))
        .await;
    client.get("/api/checkout").await;

    let response = client.delete("/api/checkout").await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = client
        .post(
            "/api/checkout/payment-method",
            &json!({ "method": PaymentMethod::Usdt }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_sign_up_conflicts() {
    let client = TestClient::new();
    let response = client.sign_up("ada@example.com").await;
    assert_eq!(response.data()["email"], "ada@example.com");

    let response = client
        .post(
            "/api/auth/signup",
            &json!({
                "name": "Ada",
                "email": "ada@example.com",
                "password": PASSWORD,
                "accept_terms": true,
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_export_is_an_attachment() {
    let client = TestClient::new();
    client.sign_up("ada@example.com").await;

    let response = client.get("/api/profile/export").await;
    assert_eq!(response.status, StatusCode::OK);
    let disposition = response
        .headers
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.starts_with("attachment; filename=\"digitalhub-data-"));
}

#[tokio::test]
async fn test_sign_out_ends_the_session() {
    let client = TestClient::new();
    client.sign_up("ada@example.com").await;
    assert_eq!(client.get("/api/profile").await.status, StatusCode::OK);

    let response = client.post("/api/auth/signout", &json!({})).await;
    assert_eq!(response.status, StatusCode::OK);

    assert_eq!(
        client.get("/api/profile").await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_hidden_checkout_survives_past_its_idle_window() {
    let client = TestClient::with_checkout(CheckoutSettings {
        duration: Duration::from_secs(2),
        idle_margin: Duration::from_millis(50),
        ..CheckoutSettings::default()
    });
    client.sign_up("ada@example.com").await;
    client
        .post("/api/home/purchase", &json!({ "product": "netflix" }))
        .await;
    let response = client.get("/api/checkout").await;
    assert_eq!(response.data()["remaining_secs"], 2);

    let response = client
        .post("/api/checkout/visibility", &json!({ "visible": false }))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    // Well past countdown plus idle margin; a visible checkout would be gone.
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let response = client
        .post("/api/checkout/visibility", &json!({ "visible": true }))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.data()["remaining_secs"], 2);
    assert_eq!(response.data()["expired"], false);

    let response = client.get("/api/checkout").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["product"]["id"], "netflix");
}

#[tokio::test]
async fn test_failed_sign_in_signs_out() {
    let client = TestClient::new();
    client.sign_up("ada@example.com").await;
    let response = client.get("/api/auth/state").await;
    assert_eq!(response.data()["user"]["email"], "ada@example.com");

    let response = client
        .post(
            "/api/auth/signin",
            &json!({ "email": "ada@example.com", "password": "not-the-password" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = client.get("/api/auth/state").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.data()["user"].is_null(), "{:?}", response.body);
    assert_eq!(
        client.get("/api/profile").await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_switching_accounts_drops_the_open_checkout() {
    let client = TestClient::new();
    client.sign_up("ada@example.com").await;
    client
        .post("/api/home/purchase", &json!({ "product": "netflix" }))
        .await;
    client.get("/api/checkout").await;
    client
        .post(
            "/api/checkout/payment-method",
            &json!({ "method": PaymentMethod::Bitcoin }),
        )
        .await;

    client.sign_up("grace@example.com").await;

    let response = client.post("/api/checkout/confirm", &json!({})).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let response = client.get("/api/profile").await;
    assert_eq!(response.data()["history"]["count"], 0);

    // Nothing was recorded against the account that opened the checkout.
    let response = client
        .post(
            "/api/auth/signin",
            &json!({ "email": "ada@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let response = client.get("/api/profile").await;
    assert_eq!(response.data()["history"]["count"], 0);
}
