//! Shipping provider client.
//!
//! Authenticates with email/password, caches the bearer token per client
//! instance, and refreshes it lazily when expired. Used for best-effort
//! reverse-pickup creation when a return is approved; callers log and
//! continue on failure rather than propagating it.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use sandpiper_core::OrderId;

use crate::config::ShippingConfig;
use crate::models::{OrderItem, ShippingAddress};

/// Errors that can occur when interacting with the shipping provider.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Provider tokens are valid for ten days; refresh a day early so an
/// in-flight request never races the expiry.
const TOKEN_TTL_DAYS: i64 = 9;

struct CachedToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// A created reverse-pickup order on the provider side.
#[derive(Debug, Clone, Deserialize)]
pub struct PickupOrder {
    pub order_id: i64,
    pub shipment_id: i64,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Serialize)]
struct PickupItem<'a> {
    name: &'a str,
    sku: String,
    units: i64,
    selling_price: String,
}

/// Shipping provider client.
pub struct ShippingClient {
    client: reqwest::Client,
    base_url: String,
    email: String,
    password: SecretString,
    token: RwLock<Option<CachedToken>>,
}

impl ShippingClient {
    /// Create a new shipping client. No network call is made until the
    /// first pickup request needs a token.
    #[must_use]
    pub fn new(config: &ShippingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            email: config.email.clone(),
            password: config.password.clone(),
            token: RwLock::new(None),
        }
    }

    /// Return a valid bearer token, logging in if the cached one is
    /// missing or expired.
    async fn auth_token(&self) -> Result<SecretString, ShippingError> {
        {
            let guard = self.token.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.expires_at > Utc::now() {
                    return Ok(cached.value.clone());
                }
            }
        }

        let mut guard = self.token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.value.clone());
            }
        }

        let url = format!("{}/v1/external/auth/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "email": self.email,
                "password": self.password.expose_secret(),
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ShippingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let login: LoginResponse = response.json().await?;
        let value = SecretString::from(login.token);
        *guard = Some(CachedToken {
            value: value.clone(),
            expires_at: Utc::now() + Duration::days(TOKEN_TTL_DAYS),
        });
        Ok(value)
    }

    /// Create a reverse-pickup order so the courier collects the items
    /// from the customer's address.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError` on auth or API failure. Callers treat this
    /// as best-effort: the return approval itself has already committed.
    pub async fn create_return_order(
        &self,
        order_id: OrderId,
        address: &ShippingAddress,
        customer_name: &str,
        items: &[OrderItem],
    ) -> Result<PickupOrder, ShippingError> {
        let token = self.auth_token().await?;

        let pickup_items: Vec<PickupItem<'_>> = items
            .iter()
            .map(|item| PickupItem {
                name: &item.name,
                sku: item.product_id.to_string(),
                units: item.quantity,
                selling_price: item.unit_price.to_string(),
            })
            .collect();

        let (first_name, last_name) = customer_name
            .split_once(' ')
            .unwrap_or((customer_name, ""));

        let url = format!("{}/v1/external/orders/create/return", self.base_url);
        let body = serde_json::json!({
            "order_id": order_id.to_string(),
            "order_date": Utc::now().format("%Y-%m-%d").to_string(),
            "pickup_customer_name": first_name,
            "pickup_last_name": last_name,
            "pickup_address": address.address,
            "pickup_city": address.city,
            "pickup_country": address.country,
            "pickup_pincode": address.postal_code,
            "order_items": pickup_items,
            "payment_method": "Prepaid",
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ShippingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
