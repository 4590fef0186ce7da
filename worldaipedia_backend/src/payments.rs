//! Payment-intent creation for the embedded checkout widget.
//!
//! The widget itself runs provider-side; our only job is to mint an
//! intent for an amount and hand the client secret back to the page.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Clone)]
pub struct PaymentClient {
    api_url: String,
    secret_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntent {
    pub client_secret: String,
}

impl PaymentClient {
    pub fn new(api_url: String, secret_key: String, client: reqwest::Client) -> Self {
        Self {
            api_url,
            secret_key,
            client,
        }
    }

    /// Creates a payment intent for `amount` minor units and returns the
    /// widget's client secret. Provider failures are logged but surface
    /// generically.
    pub async fn create_intent(&self, amount: i64, currency: &str) -> Result<PaymentIntent> {
        if self.secret_key.is_empty() {
            bail!("payment provider is not configured");
        }
        if amount <= 0 {
            bail!("amount must be a positive number of minor units");
        }
        let currency = currency.trim().to_lowercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            bail!("currency must be a three-letter code");
        }

        let url = format!("{}/v1/payment_intents", self.api_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&[("amount", amount.to_string()), ("currency", currency)])
            .send()
            .await
            .context("failed to reach the payment provider")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read body".to_string());
            tracing::warn!(%status, %body, "payment intent creation failed");
            bail!("payment provider rejected the request");
        }

        response
            .json::<PaymentIntent>()
            .await
            .context("failed to parse the payment provider response")
    }
}
