//! Payment gateway client and confirmation verification.
//!
//! Order intents are created against the gateway's REST API; payment
//! confirmation comes back through the client as a signed triple
//! (gateway order id, gateway payment id, signature) which is verified
//! locally with the shared key secret. Verification never makes a network
//! call and never errors: any mismatch is simply `false`, and callers
//! must treat `false` as "do not mark paid".

use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distr::Alphanumeric;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use sandpiper_core::{CurrencyCode, Money};

use crate::config::GatewayConfig;

type HmacSha256 = Hmac<Sha256>;

/// Errors that can occur when interacting with the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The amount cannot be represented in the gateway's minor units.
    #[error("amount not representable in minor units: {0}")]
    Amount(Decimal),
}

/// A gateway-side order record, correlating a payment to our order via
/// the receipt. Ephemeral: nothing beyond the confirmation triple is
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in minor units (x100).
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

/// Payment gateway client.
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
    currency: CurrencyCode,
}

impl GatewayClient {
    /// Create a new gateway client.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            currency: config.currency,
        }
    }

    /// The publishable key. Never returns the signing secret.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create a gateway order for the given amount, converted to the
    /// gateway's minor units and tagged with a fresh receipt id.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the request fails or the gateway rejects
    /// it; this path is fatal for payment-intent creation.
    pub async fn create_order(&self, amount: Decimal) -> Result<GatewayOrder, PaymentError> {
        let minor_units = Money::new(amount, self.currency)
            .to_minor_units()
            .ok_or(PaymentError::Amount(amount))?;
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(14)
            .map(char::from)
            .collect();
        let receipt = format!("rcpt_{suffix}");

        let url = format!("{}/v1/orders", self.base_url);
        let body = serde_json::json!({
            "amount": minor_units,
            "currency": self.currency.code(),
            "receipt": receipt,
        });

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Verify a completed-payment confirmation.
    ///
    /// Recomputes HMAC-SHA256 over `"{order_id}|{payment_id}"` with the
    /// key secret and compares in constant time. Malformed hex, a wrong
    /// secret, or any tampering yields `false`, never an error.
    #[must_use]
    pub fn verify(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };

        let Ok(mut mac) = HmacSha256::new_from_slice(self.key_secret.expose_secret().as_bytes())
        else {
            return false;
        };
        mac.update(format!("{gateway_order_id}|{gateway_payment_id}").as_bytes());

        // Mac::verify_slice is a constant-time comparison.
        mac.verify_slice(&expected).is_ok()
    }
}
