//! Order lifecycle integration tests: checkout, payment settlement with
//! exactly-once stock decrement, fulfilment transitions and cancellation.

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;

use sandpiper_server::db::OrderRepository;
use sandpiper_server::models::PaymentConfirmation;

use sandpiper_integration_tests::{
    ADMIN_TOKEN, CUSTOMER_TOKEN, OTHER_CUSTOMER_TOKEN, TestApp, sign, signed_confirmation,
};

#[tokio::test]
async fn create_order_and_fetch_it() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request("POST", "/api/orders", Some(CUSTOMER_TOKEN), Some(app.order_payload(2)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["is_paid"], false);
    assert_eq!(body["items_price"], "400");
    assert_eq!(body["shipping_price"], "50");
    assert_eq!(body["total_price"], "450");

    let id = body["id"].as_str().unwrap();
    let (status, fetched) = app
        .request("GET", &format!("/api/orders/{id}"), Some(CUSTOMER_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], body["id"]);
    assert_eq!(fetched["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn empty_order_is_rejected() {
    let app = TestApp::new().await;
    let mut payload = app.order_payload(1);
    payload["items"] = json!([]);

    let (status, body) = app
        .request("POST", "/api/orders", Some(CUSTOMER_TOKEN), Some(payload))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("at least one item"));
}

#[tokio::test]
async fn create_order_requires_authentication() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request("POST", "/api/orders", None, Some(app.order_payload(1)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn shipping_rate_is_free_above_threshold() {
    let app = TestApp::new().await;
    let quote_items = |quantity: i64| {
        json!({"items": [{
            "product_id": app.product.id,
            "name": app.product.name,
            "price": "200",
            "quantity": quantity,
        }]})
    };

    // The subtotal is summed server-side from the posted line items.
    let (status, body) = app
        .request(
            "POST",
            "/api/orders/shipping-rate",
            Some(CUSTOMER_TOKEN),
            Some(quote_items(2)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shipping_price"], "50");

    let (_, body) = app
        .request(
            "POST",
            "/api/orders/shipping-rate",
            Some(CUSTOMER_TOKEN),
            Some(quote_items(5)),
        )
        .await;
    assert_eq!(body["shipping_price"], "0");
}

#[tokio::test]
async fn payment_settles_once_and_decrements_stock_once() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 2).await;
    assert_eq!(app.stock().await, 10);

    let (status, body) = app.pay_order(CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::OK, "payment failed: {body}");
    assert_eq!(body["is_paid"], true);
    assert_eq!(body["status"], "processing");
    assert_eq!(app.stock().await, 8);

    // Replayed confirmation: accepted, but no second decrement.
    let (status, body) = app.pay_order(CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_paid"], true);
    assert_eq!(app.stock().await, 8);
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 1).await;

    let mut confirmation = signed_confirmation("gw_order_1", "gw_pay_1");
    confirmation["gateway_payment_id"] = json!("gw_pay_2");

    let (status, body) = app
        .request(
            "PUT",
            &format!("/api/orders/{order_id}/pay"),
            Some(CUSTOMER_TOKEN),
            Some(confirmation),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("signature"));
    assert_eq!(app.stock().await, 10);

    let order = app.get_order(order_id).await;
    assert_eq!(order["is_paid"], false);
}

#[tokio::test]
async fn only_the_owner_or_staff_can_pay() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 1).await;

    let (status, _) = app.pay_order(OTHER_CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stock_may_go_negative_on_oversell() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 15).await;

    let (status, _) = app.pay_order(CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.stock().await, -5);
}

#[tokio::test]
async fn fulfilment_transitions_are_staff_only() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 1).await;

    for action in ["ship", "deliver"] {
        let (status, _) = app
            .request(
                "PUT",
                &format!("/api/orders/{order_id}/{action}"),
                Some(CUSTOMER_TOKEN),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{action} should be staff-only");
    }
}

#[tokio::test]
async fn delivery_requires_payment() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 1).await;

    let (status, body) = app
        .request(
            "PUT",
            &format!("/api/orders/{order_id}/deliver"),
            Some(ADMIN_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("unpaid"));
}

#[tokio::test]
async fn paid_order_ships_and_delivers() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 1).await;
    app.pay_order(CUSTOMER_TOKEN, order_id).await;

    let (status, body) = app
        .request(
            "PUT",
            &format!("/api/orders/{order_id}/ship"),
            Some(ADMIN_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "shipped");

    let (status, body) = app
        .request(
            "PUT",
            &format!("/api/orders/{order_id}/deliver"),
            Some(ADMIN_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "delivered");
    assert_eq!(body["is_delivered"], true);
    let delivered_at = body["delivered_at"].clone();

    // Re-delivering is a no-op, not an error.
    let (status, body) = app
        .request(
            "PUT",
            &format!("/api/orders/{order_id}/deliver"),
            Some(ADMIN_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivered_at"], delivered_at);
}

#[tokio::test]
async fn cancelling_a_paid_order_restores_stock() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 2).await;
    app.pay_order(CUSTOMER_TOKEN, order_id).await;
    assert_eq!(app.stock().await, 8);

    let (status, body) = app
        .request(
            "PUT",
            &format!("/api/orders/{order_id}/cancel"),
            Some(CUSTOMER_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(app.stock().await, 10);

    // Re-cancelling is a no-op; paying a cancelled order is a conflict.
    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/orders/{order_id}/cancel"),
            Some(CUSTOMER_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.stock().await, 10);

    let (status, _) = app.pay_order(CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn late_settlement_cannot_resurrect_a_cancelled_order() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 2).await;

    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/orders/{order_id}/cancel"),
            Some(CUSTOMER_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // A settlement whose authorization read predated the cancel reaches
    // the conditional update last; the update itself must refuse it
    // rather than flip the order back to processing.
    let confirmation = PaymentConfirmation {
        gateway_order_id: "gw_order_1".to_owned(),
        gateway_payment_id: "gw_pay_1".to_owned(),
        signature: sign("gw_order_1", "gw_pay_1"),
    };
    let won = OrderRepository::new(&app.pool)
        .mark_paid(order_id, &confirmation, Utc::now())
        .await
        .unwrap();
    assert!(!won, "mark_paid must lose against a committed cancel");

    let order = app.get_order(order_id).await;
    assert_eq!(order["status"], "cancelled");
    assert_eq!(order["is_paid"], false);
    assert_eq!(app.stock().await, 10);
}

#[tokio::test]
async fn delivered_orders_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 1).await;
    app.force_delivered(order_id, 1).await;

    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/orders/{order_id}/cancel"),
            Some(CUSTOMER_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn order_listings_respect_roles() {
    let app = TestApp::new().await;
    app.create_order(CUSTOMER_TOKEN, 1).await;
    app.create_order(OTHER_CUSTOMER_TOKEN, 1).await;

    let (status, body) = app
        .request("GET", "/api/orders/mine", Some(CUSTOMER_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = app
        .request("GET", "/api/orders", Some(CUSTOMER_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.request("GET", "/api/orders", Some(ADMIN_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    let all = body.as_array().unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|o| o["owner"]["email"] == "wren@example.com"));
}

#[tokio::test]
async fn other_users_cannot_read_an_order() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 1).await;

    let (status, _) = app
        .request(
            "GET",
            &format!("/api/orders/{order_id}"),
            Some(OTHER_CUSTOMER_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request("GET", &format!("/api/orders/{order_id}"), Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}
