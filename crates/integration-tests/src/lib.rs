//! Integration test harness for Sandpiper Commerce.
//!
//! Builds the full router against an in-memory `SQLite` database and
//! drives it in-process with `tower::ServiceExt::oneshot`, so the suite
//! needs no running server and no external services. The payment
//! gateway's signature verification is exercised for real by signing
//! confirmations with the same test secret the server is configured
//! with; only outbound network calls (intent creation, pickup booking)
//! are out of scope here.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::net::{IpAddr, Ipv4Addr};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use sha2::Sha256;
use sqlx::SqlitePool;
use tower::ServiceExt;

use sandpiper_core::{CurrencyCode, OrderId, ProductId, UserId};
use sandpiper_server::config::{GatewayConfig, ServerConfig};
use sandpiper_server::db::{self, ProductRepository, UserRepository};
use sandpiper_server::models::{Product, User};
use sandpiper_server::state::AppState;

/// Gateway signing secret the test server is configured with.
pub const GATEWAY_SECRET: &str = "integration-gateway-secret-7f3a91";

pub const CUSTOMER_TOKEN: &str = "tok-customer";
pub const OTHER_CUSTOMER_TOKEN: &str = "tok-other";
pub const ADMIN_TOKEN: &str = "tok-admin";

/// An application instance over a fresh in-memory database, with one
/// customer, a second customer, one staff user and one product seeded.
pub struct TestApp {
    pub pool: SqlitePool,
    pub router: Router,
    pub customer: User,
    pub other_customer: User,
    pub admin: User,
    pub product: Product,
}

fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("sqlite::memory:"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        gateway: GatewayConfig {
            base_url: "https://api.gateway.invalid".to_owned(),
            key_id: "key_test_integration".to_owned(),
            key_secret: SecretString::from(GATEWAY_SECRET),
            currency: CurrencyCode::USD,
        },
        shipping: None,
    }
}

impl TestApp {
    /// Spin up a fresh application over an empty in-memory database.
    pub async fn new() -> Self {
        let config = test_config();
        let pool = db::create_pool(&config.database_url)
            .await
            .expect("failed to open in-memory database");
        db::MIGRATOR
            .run(&pool)
            .await
            .expect("failed to run migrations");

        let users = UserRepository::new(&pool);
        let customer = users
            .insert("Wren Fielding", "wren@example.com", false, CUSTOMER_TOKEN)
            .await
            .unwrap();
        let other_customer = users
            .insert("Sorrel Quist", "sorrel@example.com", false, OTHER_CUSTOMER_TOKEN)
            .await
            .unwrap();
        let admin = users
            .insert("Marta Voss", "marta@example.com", true, ADMIN_TOKEN)
            .await
            .unwrap();

        let product = ProductRepository::new(&pool)
            .insert("Field Jacket", "/img/field-jacket.png", Decimal::from(200), 10)
            .await
            .unwrap();

        let state = AppState::new(config, pool.clone());
        let router = sandpiper_server::app(state);

        Self {
            pool,
            router,
            customer,
            other_customer,
            admin,
            product,
        }
    }

    /// Send one request through the router and decode the JSON body (or
    /// `Value::Null` for an empty body).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Checkout payload for `quantity` units of the seeded product, with
    /// the flat shipping fee already applied client-side.
    #[must_use]
    pub fn order_payload(&self, quantity: i64) -> Value {
        let items_price = Decimal::from(200) * Decimal::from(quantity);
        let shipping_price = if items_price >= Decimal::from(1000) {
            Decimal::ZERO
        } else {
            Decimal::from(50)
        };
        serde_json::json!({
            "items": [{
                "product_id": self.product.id,
                "name": self.product.name,
                "image": self.product.image,
                "price": "200",
                "quantity": quantity,
            }],
            "shipping_address": {
                "address": "12 Harbour Lane",
                "city": "Portree",
                "postal_code": "IV51 9AB",
                "country": "GB",
            },
            "payment_method": "card",
            "items_price": items_price.to_string(),
            "tax_price": "0",
            "shipping_price": shipping_price.to_string(),
            "total_price": (items_price + shipping_price).to_string(),
        })
    }

    /// Create an order via the API and return its id.
    pub async fn create_order(&self, token: &str, quantity: i64) -> OrderId {
        let (status, body) = self
            .request("POST", "/api/orders", Some(token), Some(self.order_payload(quantity)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "order creation failed: {body}");
        OrderId::parse_str(body["id"].as_str().unwrap()).unwrap()
    }

    /// Pay an order via the API with a correctly signed confirmation.
    pub async fn pay_order(&self, token: &str, order_id: OrderId) -> (StatusCode, Value) {
        let confirmation = signed_confirmation("gw_order_1", "gw_pay_1");
        self.request(
            "PUT",
            &format!("/api/orders/{order_id}/pay"),
            Some(token),
            Some(confirmation),
        )
        .await
    }

    /// Current stock count of the seeded product.
    pub async fn stock(&self) -> i64 {
        self.stock_of(self.product.id).await
    }

    /// Current stock count of any product.
    pub async fn stock_of(&self, id: ProductId) -> i64 {
        sqlx::query_scalar("SELECT count_in_stock FROM products WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// Force an order into the delivered state as of `days_ago` days,
    /// bypassing the API (the fulfilment history is not under test).
    pub async fn force_delivered(&self, order_id: OrderId, days_ago: i64) {
        self.force_delivered_at(order_id, Utc::now() - Duration::days(days_ago))
            .await;
    }

    /// Force an order delivered at an exact timestamp.
    pub async fn force_delivered_at(&self, order_id: OrderId, delivered_at: DateTime<Utc>) {
        sqlx::query(
            "UPDATE orders SET is_paid = 1, paid_at = ?, is_delivered = 1, delivered_at = ?, \
             status = 'delivered' WHERE id = ?",
        )
        .bind(delivered_at - Duration::days(1))
        .bind(delivered_at)
        .bind(order_id.to_string())
        .execute(&self.pool)
        .await
        .unwrap();
    }

    /// Record the shipping provider's reference for an order, as the
    /// fulfilment pipeline would after registering the shipment.
    pub async fn set_provider_ref(&self, order_id: OrderId, provider_ref: &str) {
        sqlx::query("UPDATE orders SET provider_order_id = ? WHERE id = ?")
            .bind(provider_ref)
            .bind(order_id.to_string())
            .execute(&self.pool)
            .await
            .unwrap();
    }

    /// Reassign an order to another user directly in the database.
    pub async fn set_order_owner(&self, order_id: OrderId, owner: UserId) {
        sqlx::query("UPDATE orders SET user_id = ? WHERE id = ?")
            .bind(owner.to_string())
            .bind(order_id.to_string())
            .execute(&self.pool)
            .await
            .unwrap();
    }

    /// Fetch an order as JSON through the staff-visible API.
    pub async fn get_order(&self, order_id: OrderId) -> Value {
        let (status, body) = self
            .request("GET", &format!("/api/orders/{order_id}"), Some(ADMIN_TOKEN), None)
            .await;
        assert_eq!(status, StatusCode::OK, "order fetch failed: {body}");
        body
    }
}

/// Sign a confirmation triple exactly as the gateway does.
#[must_use]
pub fn sign(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(GATEWAY_SECRET.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(format!("{gateway_order_id}|{gateway_payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// A correctly signed payment confirmation payload.
#[must_use]
pub fn signed_confirmation(gateway_order_id: &str, gateway_payment_id: &str) -> Value {
    serde_json::json!({
        "gateway_order_id": gateway_order_id,
        "gateway_payment_id": gateway_payment_id,
        "signature": sign(gateway_order_id, gateway_payment_id),
    })
}
