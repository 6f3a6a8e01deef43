//! Return lifecycle integration tests: eligibility, the request state
//! machine and the denormalized mirror on the order.

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use sandpiper_core::OrderId;
use sandpiper_integration_tests::{ADMIN_TOKEN, CUSTOMER_TOKEN, OTHER_CUSTOMER_TOKEN, TestApp};

async fn delivered_order(app: &TestApp, token: &str, days_ago: i64) -> OrderId {
    let order_id = app.create_order(token, 2).await;
    app.force_delivered(order_id, days_ago).await;
    order_id
}

fn return_payload(order_id: OrderId) -> Value {
    json!({
        "order_id": order_id,
        "return_type": "return",
        "reason": "arrived damaged",
    })
}

async fn file_return(app: &TestApp, token: &str, order_id: OrderId) -> (StatusCode, Value) {
    app.request("POST", "/api/returns", Some(token), Some(return_payload(order_id)))
        .await
}

async fn advance(app: &TestApp, return_id: &str, status: &str) -> (StatusCode, Value) {
    app.request(
        "PUT",
        &format!("/api/returns/{return_id}"),
        Some(ADMIN_TOKEN),
        Some(json!({"status": status})),
    )
    .await
}

#[tokio::test]
async fn return_within_window_starts_requested() {
    let app = TestApp::new().await;
    let order_id = delivered_order(&app, CUSTOMER_TOKEN, 2).await;

    let (status, body) = file_return(&app, CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::CREATED, "return failed: {body}");
    assert_eq!(body["status"], "requested");
    assert_eq!(body["is_processed"], false);

    // Mirror on the order is written in the same transaction.
    let order = app.get_order(order_id).await;
    assert_eq!(order["return_request"]["status"], "requested");
    assert_eq!(order["return_request"]["reason"], "arrived damaged");
}

#[tokio::test]
async fn return_window_is_seven_days() {
    let app = TestApp::new().await;
    let order_id = delivered_order(&app, CUSTOMER_TOKEN, 8).await;

    let (status, body) = file_return(&app, CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("within 7 days"));
}

#[tokio::test]
async fn undelivered_order_is_not_returnable() {
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 1).await;

    let (status, _) = file_return(&app, CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn future_dated_delivery_is_still_eligible() {
    // Clock skew between the courier's webhook and this server can stamp
    // delivery slightly in the future; that must not lock out the return.
    let app = TestApp::new().await;
    let order_id = app.create_order(CUSTOMER_TOKEN, 1).await;
    app.force_delivered_at(order_id, Utc::now() + Duration::hours(3))
        .await;

    let (status, _) = file_return(&app, CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn one_return_per_order() {
    let app = TestApp::new().await;
    let order_id = delivered_order(&app, CUSTOMER_TOKEN, 1).await;

    let (status, _) = file_return(&app, CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = file_return(&app, CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn only_the_owner_can_request_a_return() {
    let app = TestApp::new().await;
    let order_id = delivered_order(&app, CUSTOMER_TOKEN, 1).await;

    let (status, _) = file_return(&app, OTHER_CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn staff_owned_orders_are_not_returnable() {
    let app = TestApp::new().await;
    let order_id = delivered_order(&app, ADMIN_TOKEN, 1).await;

    let (status, body) = file_return(&app, ADMIN_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("staff"));
}

#[tokio::test]
async fn full_return_flow_with_pickup_stage() {
    let app = TestApp::new().await;
    let order_id = delivered_order(&app, CUSTOMER_TOKEN, 1).await;
    let (_, body) = file_return(&app, CUSTOMER_TOKEN, order_id).await;
    let return_id = body["id"].as_str().unwrap().to_owned();

    let (status, body) = advance(&app, &return_id, "approved").await;
    assert_eq!(status, StatusCode::OK, "approve failed: {body}");
    assert_eq!(body["status"], "approved");
    assert_eq!(body["is_processed"], false);

    let (status, body) = advance(&app, &return_id, "picked_up").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "picked_up");

    let (status, body) = advance(&app, &return_id, "completed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["is_processed"], true);
    assert!(body["processed_at"].is_string());

    let order = app.get_order(order_id).await;
    assert_eq!(order["return_request"]["status"], "completed");
}

#[tokio::test]
async fn pickup_stage_may_be_skipped() {
    let app = TestApp::new().await;
    let order_id = delivered_order(&app, CUSTOMER_TOKEN, 1).await;
    let (_, body) = file_return(&app, CUSTOMER_TOKEN, order_id).await;
    let return_id = body["id"].as_str().unwrap().to_owned();

    advance(&app, &return_id, "approved").await;
    let (status, body) = advance(&app, &return_id, "completed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["is_processed"], true);
}

#[tokio::test]
async fn illegal_transitions_are_conflicts() {
    let app = TestApp::new().await;
    let order_id = delivered_order(&app, CUSTOMER_TOKEN, 1).await;
    let (_, body) = file_return(&app, CUSTOMER_TOKEN, order_id).await;
    let return_id = body["id"].as_str().unwrap().to_owned();

    // Completion requires approval first.
    let (status, _) = advance(&app, &return_id, "completed").await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Rejection is terminal.
    let (status, _) = advance(&app, &return_id, "rejected").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = advance(&app, &return_id, "approved").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let order = app.get_order(order_id).await;
    assert_eq!(order["return_request"]["status"], "rejected");
}

#[tokio::test]
async fn customers_cannot_advance_returns() {
    let app = TestApp::new().await;
    let order_id = delivered_order(&app, CUSTOMER_TOKEN, 1).await;
    let (_, body) = file_return(&app, CUSTOMER_TOKEN, order_id).await;
    let return_id = body["id"].as_str().unwrap().to_owned();

    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/returns/{return_id}"),
            Some(CUSTOMER_TOKEN),
            Some(json!({"status": "approved"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn return_listings_respect_roles() {
    let app = TestApp::new().await;
    let order_id = delivered_order(&app, CUSTOMER_TOKEN, 1).await;
    file_return(&app, CUSTOMER_TOKEN, order_id).await;

    let (status, body) = app
        .request("GET", "/api/returns/mine", Some(CUSTOMER_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let mine = body.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    // Listing carries the parent order's total for display.
    assert_eq!(mine[0]["order_total"], "450");

    let (status, _) = app
        .request("GET", "/api/returns", Some(CUSTOMER_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.request("GET", "/api/returns", Some(ADMIN_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn free_shipping_replacement_flow_end_to_end() {
    let app = TestApp::new().await;

    // 50 units at 200 = 10000: over the free-shipping threshold.
    let order_id = app.create_order(CUSTOMER_TOKEN, 50).await;
    let order = app.get_order(order_id).await;
    assert_eq!(order["shipping_price"], "0");
    assert_eq!(order["total_price"], "10000");

    let (status, _) = app.pay_order(CUSTOMER_TOKEN, order_id).await;
    assert_eq!(status, StatusCode::OK);
    app.force_delivered(order_id, 3).await;

    let (status, body) = app
        .request(
            "POST",
            "/api/returns",
            Some(CUSTOMER_TOKEN),
            Some(json!({
                "order_id": order_id,
                "return_type": "replace",
                "reason": "colour does not match the listing",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "return failed: {body}");
    let return_id = body["id"].as_str().unwrap().to_owned();

    advance(&app, &return_id, "approved").await;
    let (status, body) = advance(&app, &return_id, "completed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["return_type"], "replace");
    assert_eq!(body["is_processed"], true);

    let order = app.get_order(order_id).await;
    assert_eq!(order["return_request"]["status"], "completed");
    assert_eq!(order["return_request"]["return_type"], "replace");
}

#[tokio::test]
async fn replacement_requests_carry_their_type() {
    let app = TestApp::new().await;
    let order_id = delivered_order(&app, CUSTOMER_TOKEN, 1).await;

    let (status, body) = app
        .request(
            "POST",
            "/api/returns",
            Some(CUSTOMER_TOKEN),
            Some(json!({
                "order_id": order_id,
                "return_type": "replace",
                "reason": "wrong size",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["return_type"], "replace");

    let order = app.get_order(order_id).await;
    assert_eq!(order["return_request"]["return_type"], "replace");
}
