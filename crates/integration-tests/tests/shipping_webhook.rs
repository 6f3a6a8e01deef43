//! Shipment webhook integration tests: reference resolution, verbatim
//! status mirroring, the delivered/shipped sentinels and idempotency.

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use sandpiper_core::OrderId;
use sandpiper_integration_tests::{CUSTOMER_TOKEN, TestApp};

const PROVIDER_REF: &str = "SR-482913";

async fn paid_order_with_provider_ref(app: &TestApp) -> OrderId {
    let order_id = app.create_order(CUSTOMER_TOKEN, 1).await;
    app.pay_order(CUSTOMER_TOKEN, order_id).await;
    app.set_provider_ref(order_id, PROVIDER_REF).await;
    order_id
}

async fn post_event(app: &TestApp, event: Value) -> (StatusCode, Value) {
    // Webhook is unauthenticated: the provider has no signing scheme.
    app.request("POST", "/api/webhooks/shipping", None, Some(event)).await
}

#[tokio::test]
async fn delivered_event_delivers_the_order() {
    let app = TestApp::new().await;
    let order_id = paid_order_with_provider_ref(&app).await;

    let (status, _) = post_event(
        &app,
        json!({
            "order_id": PROVIDER_REF,
            "current_status": "Delivered",
            "awb": "AWB-111",
            "courier_name": "Swiftline",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let order = app.get_order(order_id).await;
    assert_eq!(order["is_delivered"], true);
    assert_eq!(order["status"], "delivered");
    // Courier text is mirrored verbatim, original casing included.
    assert_eq!(order["shipment"]["shipment_status"], "Delivered");
    assert_eq!(order["shipment"]["awb_code"], "AWB-111");
    assert_eq!(order["shipment"]["courier_name"], "Swiftline");
}

#[tokio::test]
async fn sentinel_match_is_case_insensitive() {
    let app = TestApp::new().await;
    let order_id = paid_order_with_provider_ref(&app).await;

    post_event(&app, json!({"order_id": PROVIDER_REF, "current_status": "DELIVERED"})).await;

    let order = app.get_order(order_id).await;
    assert_eq!(order["is_delivered"], true);
    assert_eq!(order["shipment"]["shipment_status"], "DELIVERED");
}

#[tokio::test]
async fn replayed_delivery_restamps_the_mirror_only() {
    let app = TestApp::new().await;
    let order_id = paid_order_with_provider_ref(&app).await;

    let first = Utc::now() - Duration::hours(2);
    post_event(
        &app,
        json!({
            "order_id": PROVIDER_REF,
            "current_status": "Delivered",
            "current_timestamp": first.to_rfc3339(),
        }),
    )
    .await;
    let order = app.get_order(order_id).await;
    let delivered_at = order["delivered_at"].clone();
    let first_stamp = order["shipment"]["last_updated"].clone();

    let (status, _) = post_event(
        &app,
        json!({
            "order_id": PROVIDER_REF,
            "current_status": "Delivered",
            "current_timestamp": Utc::now().to_rfc3339(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let order = app.get_order(order_id).await;
    // Delivery time is fixed by the first event; the mirror moves.
    assert_eq!(order["delivered_at"], delivered_at);
    assert_ne!(order["shipment"]["last_updated"], first_stamp);
}

#[tokio::test]
async fn late_shipped_event_never_regresses_delivery() {
    let app = TestApp::new().await;
    let order_id = paid_order_with_provider_ref(&app).await;

    post_event(&app, json!({"order_id": PROVIDER_REF, "current_status": "Delivered"})).await;
    let (status, _) =
        post_event(&app, json!({"order_id": PROVIDER_REF, "current_status": "Shipped"})).await;
    assert_eq!(status, StatusCode::OK);

    let order = app.get_order(order_id).await;
    assert_eq!(order["status"], "delivered");
    assert_eq!(order["is_delivered"], true);
    // The courier text still mirrors the latest event.
    assert_eq!(order["shipment"]["shipment_status"], "Shipped");
}

#[tokio::test]
async fn shipped_event_moves_the_order_to_shipped() {
    let app = TestApp::new().await;
    let order_id = paid_order_with_provider_ref(&app).await;

    post_event(&app, json!({"order_id": PROVIDER_REF, "current_status": "shipped"})).await;

    let order = app.get_order(order_id).await;
    assert_eq!(order["status"], "shipped");
    assert_eq!(order["is_delivered"], false);
}

#[tokio::test]
async fn non_sentinel_statuses_are_mirror_only() {
    let app = TestApp::new().await;
    let order_id = paid_order_with_provider_ref(&app).await;

    let (status, _) = post_event(
        &app,
        json!({"order_id": PROVIDER_REF, "current_status": "Out For Delivery"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let order = app.get_order(order_id).await;
    assert_eq!(order["shipment"]["shipment_status"], "Out For Delivery");
    // The order's own lifecycle is untouched.
    assert_eq!(order["status"], "processing");
}

#[tokio::test]
async fn blank_awb_does_not_clobber_a_known_one() {
    let app = TestApp::new().await;
    let order_id = paid_order_with_provider_ref(&app).await;

    post_event(
        &app,
        json!({"order_id": PROVIDER_REF, "current_status": "In Transit", "awb": "AWB-222"}),
    )
    .await;
    post_event(
        &app,
        json!({"order_id": PROVIDER_REF, "current_status": "In Transit", "awb": ""}),
    )
    .await;

    let order = app.get_order(order_id).await;
    assert_eq!(order["shipment"]["awb_code"], "AWB-222");
}

#[tokio::test]
async fn internal_id_works_as_fallback_reference() {
    let app = TestApp::new().await;
    // No provider reference recorded; the provider echoes our own id.
    let order_id = app.create_order(CUSTOMER_TOKEN, 1).await;
    app.pay_order(CUSTOMER_TOKEN, order_id).await;

    let (status, _) = post_event(
        &app,
        json!({"order_id": order_id.to_string(), "current_status": "Delivered"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let order = app.get_order(order_id).await;
    assert_eq!(order["is_delivered"], true);
}

#[tokio::test]
async fn unknown_reference_is_not_found() {
    let app = TestApp::new().await;
    let (status, _) =
        post_event(&app, json!({"order_id": "SR-000000", "current_status": "Delivered"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blank_status_is_rejected() {
    let app = TestApp::new().await;
    paid_order_with_provider_ref(&app).await;

    let (status, _) =
        post_event(&app, json!({"order_id": PROVIDER_REF, "current_status": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unpaid_orders_still_record_delivery() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 1).await;
    app.set_provider_ref(order_id, PROVIDER_REF).await;

    let (status, _) =
        post_event(&app, json!({"order_id": PROVIDER_REF, "current_status": "Delivered"})).await;
    assert_eq!(status, StatusCode::OK);

    let order = app.get_order(order_id).await;
    assert_eq!(order["is_delivered"], true);
    assert_eq!(order["is_paid"], false);
}
