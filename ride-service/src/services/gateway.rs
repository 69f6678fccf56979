//! Squad payment gateway client.
//!
//! Covers the two boundary concerns: webhook signature verification/parsing
//! for the reconciler, and best-effort virtual-account provisioning during
//! wallet setup.

use crate::config::SquadConfig;
use crate::models::User;
use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha512 = Hmac<Sha512>;

/// Webhook notification body. Only the fields the reconciler relies on are
/// modeled; the raw payload is stored alongside the transaction as jsonb.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub transaction_ref: String,
    /// Amount in minor units (kobo).
    pub amount: i64,
    pub customer: WebhookCustomer,
    pub payment_status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookCustomer {
    pub email: String,
}

/// Virtual account details returned by the gateway.
#[derive(Debug, Clone)]
pub struct VirtualAccount {
    pub account_number: String,
    pub account_name: String,
    pub bank_name: String,
}

#[derive(Debug, Serialize)]
struct CreateVirtualAccountRequest {
    customer: VirtualAccountCustomer,
    permanent: bool,
    preferred_bank: String,
    business_name: String,
    reference: String,
}

#[derive(Debug, Serialize)]
struct VirtualAccountCustomer {
    email: String,
    name: String,
    phone: String,
}

#[derive(Debug, Deserialize)]
struct CreateVirtualAccountResponse {
    status: u16,
    data: Option<VirtualAccountData>,
}

#[derive(Debug, Deserialize)]
struct VirtualAccountData {
    account_number: String,
    account_name: String,
    bank_name: String,
}

#[derive(Clone)]
pub struct SquadClient {
    client: Client,
    config: SquadConfig,
}

impl SquadClient {
    pub fn new(config: SquadConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Check if the gateway is configured (API key is set).
    pub fn is_configured(&self) -> bool {
        !self.config.api_key.expose_secret().is_empty()
    }

    /// Verify a webhook signature.
    ///
    /// The signature is `HMAC-SHA512(raw_body, secret_hash)`, hex encoded.
    /// Comparison is constant time.
    pub fn verify_webhook_signature(&self, body: &str, signature: &str) -> Result<bool> {
        let expected = self.compute_signature(body)?;

        let expected_bytes = expected.as_bytes();
        let signature_bytes = signature.as_bytes();
        if expected_bytes.len() != signature_bytes.len() {
            return Ok(false);
        }

        Ok(expected_bytes.ct_eq(signature_bytes).into())
    }

    /// Parse a webhook event from the raw request body.
    pub fn parse_webhook_event(&self, body: &str) -> Result<WebhookEvent> {
        let event: WebhookEvent = serde_json::from_str(body)?;
        Ok(event)
    }

    /// Create a permanent virtual account for a user.
    ///
    /// Best-effort: returns `Ok(None)` when the gateway is not configured.
    /// Callers treat failures as non-fatal and must not roll back the
    /// enclosing operation.
    pub async fn create_virtual_account(&self, user: &User) -> Result<Option<VirtualAccount>> {
        if !self.is_configured() {
            tracing::info!("Squad API key not set, skipping virtual account creation");
            return Ok(None);
        }

        let reference = format!("VA_{}_{}", user.user_id, &Uuid::new_v4().to_string()[..8]);
        let request = CreateVirtualAccountRequest {
            customer: VirtualAccountCustomer {
                email: user.email.clone(),
                name: format!("{} {}", user.first_name, user.last_name),
                phone: user.phone.clone(),
            },
            permanent: true,
            preferred_bank: "wema-bank".to_string(),
            business_name: "Dash University Rides".to_string(),
            reference,
        };

        let url = format!("{}/v1/virtual-accounts", self.config.api_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(anyhow!("Virtual account creation failed: {}", body));
        }

        let parsed: CreateVirtualAccountResponse = serde_json::from_str(&body)?;
        match (parsed.status, parsed.data) {
            (200, Some(data)) => {
                tracing::info!(
                    user_id = %user.user_id,
                    bank = %data.bank_name,
                    "Virtual account created"
                );
                Ok(Some(VirtualAccount {
                    account_number: data.account_number,
                    account_name: data.account_name,
                    bank_name: data.bank_name,
                }))
            }
            _ => Err(anyhow!("Unexpected virtual account response: {}", body)),
        }
    }

    /// Compute the HMAC-SHA512 hex signature of a payload.
    fn compute_signature(&self, payload: &str) -> Result<String> {
        let mut mac =
            HmacSha512::new_from_slice(self.config.secret_hash.expose_secret().as_bytes())
                .map_err(|_| anyhow!("Invalid key length"))?;
        mac.update(payload.as_bytes());
        let result = mac.finalize();
        Ok(hex::encode(result.into_bytes()))
    }
}
