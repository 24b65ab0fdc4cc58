use std::collections::HashMap;

use anyhow::Result;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::error;

use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: Option<String>,
    pub mode: Option<String>,
    pub subscription: Option<String>,
    pub customer: Option<String>,
    pub customer_details: Option<StripeCustomerDetails>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomerDetails {
    pub email: Option<String>,
}

impl StripeCheckoutSession {
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get(key))
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StripeSubscriptionItem {
    pub price: Option<StripePrice>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StripePrice {
    pub id: String,
}

impl StripeSubscription {
    /// Price of the first subscription item. Multi-item subscriptions are not
    /// sold here, so the first item is the plan.
    pub fn price_id(&self) -> Option<&str> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.as_str())
    }

    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_str(&self.status)
    }
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

/// Parameters for a subscription-mode Checkout Session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionParams {
    pub price_id: String,
    /// Existing customer to attach. When absent, Stripe creates one from
    /// `customer_email`.
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl StripeClient {
    pub fn new(secret_key: String, success_url: String, cancel_url: String) -> Self {
        Self::with_api_base(STRIPE_API_BASE.to_string(), secret_key, success_url, cancel_url)
    }

    pub fn with_api_base(
        api_base: String,
        secret_key: String,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            secret_key,
            success_url,
            cancel_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path)
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (stripe_error_type, stripe_error_code, stripe_error_param, stripe_error_message) =
            match serde_json::from_str::<StripeErrorEnvelope>(&body) {
                Ok(envelope) => {
                    let details = envelope.error;
                    (details.type_, details.code, details.param, details.message)
                }
                Err(_) => (None, None, None, None),
            };

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?stripe_error_type,
            stripe_error_code = ?stripe_error_code,
            stripe_error_param = ?stripe_error_param,
            stripe_error_message = ?stripe_error_message,
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    /// First customer registered under `email`, if any.
    pub async fn find_customer_by_email(&self, email: &str) -> Result<Option<StripeCustomer>> {
        // https://stripe.com/docs/api/customers/list
        let resp = self
            .http
            .get(self.url("customers"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "list customers by email").await?;

        let parsed: StripeList<StripeCustomer> = resp.json().await?;
        Ok(parsed.data.into_iter().find(|customer| !customer.deleted))
    }

    pub async fn retrieve_customer(&self, customer_id: &str) -> Result<StripeCustomer> {
        // https://stripe.com/docs/api/customers/retrieve
        let resp = self
            .http
            .get(self.url(&format!("customers/{}", customer_id)))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve customer").await?;

        let customer: StripeCustomer = resp.json().await?;
        Ok(customer)
    }

    /// First active subscription of `customer_id`, optionally restricted to
    /// one price.
    pub async fn first_active_subscription(
        &self,
        customer_id: &str,
        price_id: Option<&str>,
    ) -> Result<Option<StripeSubscription>> {
        // https://stripe.com/docs/api/subscriptions/list
        let mut query = vec![
            ("customer", customer_id),
            ("status", "active"),
            ("limit", "1"),
        ];
        if let Some(price_id) = price_id {
            query.push(("price", price_id));
        }

        let resp = self
            .http
            .get(self.url("subscriptions"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(&query)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "list active subscriptions").await?;

        let parsed: StripeList<StripeSubscription> = resp.json().await?;
        Ok(parsed.data.into_iter().next())
    }

    /// Creates a subscription-mode Checkout Session and returns its URL.
    pub async fn create_checkout_session(&self, params: CheckoutSessionParams) -> Result<String> {
        // Stripe Checkout docs:
        // https://stripe.com/docs/payments/checkout
        let mut body: Vec<(String, String)> = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), params.price_id),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        match (params.customer_id, params.customer_email) {
            (Some(customer), _) => body.push(("customer".to_string(), customer)),
            (None, Some(email)) => body.push(("customer_email".to_string(), email)),
            (None, None) => {}
        }

        for (key, value) in params.metadata {
            body.push((format!("metadata[{}]", key), value.clone()));
            body.push((format!("subscription_data[metadata][{}]", key), value));
        }

        let resp = self
            .http
            .post(self.url("checkout/sessions"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        #[derive(Deserialize)]
        struct CheckoutResp {
            url: Option<String>,
        }

        let parsed: CheckoutResp = resp.json().await?;
        parsed
            .url
            .ok_or_else(|| anyhow::anyhow!("Stripe Checkout session URL is missing"))
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        // https://stripe.com/docs/api/subscriptions/retrieve
        let resp = self
            .http
            .get(self.url(&format!("subscriptions/{}", subscription_id)))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve subscription").await?;

        let subscription: StripeSubscription = resp.json().await?;
        Ok(subscription)
    }

    pub fn extract_checkout_session(event: &StripeEvent) -> Result<StripeCheckoutSession> {
        Ok(serde_json::from_value(event.data.object.clone())?)
    }

    pub fn extract_subscription(event: &StripeEvent) -> Result<StripeSubscription> {
        Ok(serde_json::from_value(event.data.object.clone())?)
    }
}
