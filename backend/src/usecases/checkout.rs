use std::{collections::HashMap, sync::Arc};

use certlist_core::{
    domain::{
        repositories::entitlements::EntitlementRepository,
        value_objects::iam::SessionUser,
    },
    payments::stripe_client::CheckoutSessionParams,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::usecases::stripe_gateway::StripeGateway;

/// Metadata key carrying the local user id through checkout sessions and subscriptions.
pub const USER_ID_METADATA_KEY: &str = "user_id";

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("sign in to start a checkout")]
    Unauthenticated,
    #[error("user email is required for checkout")]
    MissingEmail,
    #[error("already subscribed to this plan")]
    AlreadySubscribed,
    #[error("payment provider is unavailable, please try again")]
    Upstream(#[source] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CheckoutError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CheckoutError::MissingEmail => StatusCode::BAD_REQUEST,
            CheckoutError::AlreadySubscribed => StatusCode::CONFLICT,
            CheckoutError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

pub type CheckoutResult<T> = std::result::Result<T, CheckoutError>;

pub struct CheckoutUseCase<E, G>
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    entitlement_repo: Arc<E>,
    stripe_gateway: Arc<G>,
}

impl<E, G> CheckoutUseCase<E, G>
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    pub fn new(entitlement_repo: Arc<E>, stripe_gateway: Arc<G>) -> Self {
        Self {
            entitlement_repo,
            stripe_gateway,
        }
    }

    /// Creates a hosted subscription checkout for `price_id` and returns its URL.
    ///
    /// Refuses when the customer already holds an active subscription on the
    /// same price. Price ids outside the catalog go to Stripe as-is and come
    /// back as provider failures, which are surfaced, not retried.
    pub async fn initiate_checkout(
        &self,
        session: Option<&SessionUser>,
        price_id: &str,
    ) -> CheckoutResult<String> {
        let session = session.ok_or(CheckoutError::Unauthenticated)?;
        let user_id = session.user_id;
        let email = session
            .normalized_email()
            .ok_or(CheckoutError::MissingEmail)?;

        let customer = self
            .stripe_gateway
            .find_customer_by_email(&email)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "checkout: customer lookup failed");
                CheckoutError::Upstream(err)
            })?;
        let customer_id = customer.map(|customer| customer.id);

        if let Some(customer_id) = customer_id.as_deref() {
            let existing = self
                .stripe_gateway
                .first_active_subscription(customer_id, Some(price_id.to_string()))
                .await
                .map_err(|err| {
                    error!(
                        %user_id,
                        customer_id,
                        error = ?err,
                        "checkout: subscription lookup failed"
                    );
                    CheckoutError::Upstream(err)
                })?;

            if let Some(subscription) = existing {
                info!(
                    %user_id,
                    customer_id,
                    subscription_id = %subscription.id,
                    price_id,
                    "checkout: already subscribed, refusing new session"
                );
                return Err(CheckoutError::AlreadySubscribed);
            }
        }

        let mut metadata = HashMap::new();
        metadata.insert(USER_ID_METADATA_KEY.to_string(), user_id.to_string());

        let url = self
            .stripe_gateway
            .create_checkout_session(CheckoutSessionParams {
                price_id: price_id.to_string(),
                customer_id: customer_id.clone(),
                customer_email: if customer_id.is_none() {
                    Some(email)
                } else {
                    None
                },
                metadata,
            })
            .await
            .map_err(|err| {
                error!(%user_id, price_id, error = ?err, "checkout: session creation failed");
                CheckoutError::Upstream(err)
            })?;

        self.entitlement_repo
            .upsert_stub(user_id, customer_id.clone())
            .await
            .map_err(|err| {
                warn!(%user_id, db_error = ?err, "checkout: failed to record entitlement stub");
                CheckoutError::Upstream(err)
            })?;

        info!(
            %user_id,
            price_id,
            customer_id = customer_id.as_deref().unwrap_or("new"),
            "checkout: session created"
        );

        Ok(url)
    }
}
