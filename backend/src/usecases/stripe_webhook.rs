use std::sync::Arc;

use certlist_core::{
    domain::{
        entities::entitlements::{SubscriptionStateUpdate, UpsertEntitlementEntity},
        repositories::{app_users::AppUserRepository, entitlements::EntitlementRepository},
        value_objects::{iam::normalize_email, plans::PlanCatalog},
    },
    payments::{
        stripe_client::{StripeCheckoutSession, StripeClient, StripeEvent, StripeSubscription},
        webhook_signature::WebhookVerifier,
    },
};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::usecases::{checkout::USER_ID_METADATA_KEY, stripe_gateway::StripeGateway};

const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

/// Failures that reject the delivery. Everything else is acknowledged.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing or invalid webhook signature")]
    SignatureInvalid,
    #[error("malformed webhook payload")]
    MalformedPayload(#[source] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::BAD_REQUEST
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No local account could be tied to the event.
    UnlinkableEvent,
    /// Subscription event for a customer no record knows about.
    UnknownCustomer,
    /// Provider or database failure while applying the event.
    Upstream,
    NotSubscriptionCheckout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied { user_id: Uuid },
    Ignored { event_type: String },
    Dropped(DropReason),
}

pub struct StripeWebhookUseCase<E, U, G>
where
    E: EntitlementRepository + Send + Sync + 'static,
    U: AppUserRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    entitlement_repo: Arc<E>,
    app_user_repo: Arc<U>,
    stripe_gateway: Arc<G>,
    verifier: WebhookVerifier,
    catalog: Arc<PlanCatalog>,
}

impl<E, U, G> StripeWebhookUseCase<E, U, G>
where
    E: EntitlementRepository + Send + Sync + 'static,
    U: AppUserRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    pub fn new(
        entitlement_repo: Arc<E>,
        app_user_repo: Arc<U>,
        stripe_gateway: Arc<G>,
        verifier: WebhookVerifier,
        catalog: Arc<PlanCatalog>,
    ) -> Self {
        Self {
            entitlement_repo,
            app_user_repo,
            stripe_gateway,
            verifier,
            catalog,
        }
    }

    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(signature) = signature else {
            warn!("stripe_webhook: request without signature header rejected");
            return Err(WebhookError::SignatureInvalid);
        };

        self.verifier
            .verify_at(payload, signature, Utc::now().timestamp())
            .map_err(|err| {
                warn!(reason = %err, "stripe_webhook: signature verification failed");
                WebhookError::SignatureInvalid
            })?;

        let event: StripeEvent = serde_json::from_slice(payload).map_err(|err| {
            warn!(error = %err, "stripe_webhook: verified payload is not a stripe event");
            WebhookError::MalformedPayload(err.into())
        })?;

        info!(
            event_id = event.id.as_deref().unwrap_or("unknown"),
            event_type = %event.type_,
            "stripe_webhook: event verified"
        );

        let outcome = match event.type_.as_str() {
            CHECKOUT_SESSION_COMPLETED => {
                let session = StripeClient::extract_checkout_session(&event)
                    .map_err(WebhookError::MalformedPayload)?;
                self.handle_checkout_completed(session).await
            }
            SUBSCRIPTION_UPDATED | SUBSCRIPTION_DELETED => {
                let subscription = StripeClient::extract_subscription(&event)
                    .map_err(WebhookError::MalformedPayload)?;
                self.handle_subscription_changed(&event.type_, subscription)
                    .await
            }
            other => {
                debug!(event_type = other, "stripe_webhook: event type not handled");
                WebhookOutcome::Ignored {
                    event_type: other.to_string(),
                }
            }
        };

        if let WebhookOutcome::Dropped(reason) = &outcome {
            warn!(
                event_id = event.id.as_deref().unwrap_or("unknown"),
                event_type = %event.type_,
                ?reason,
                "stripe_webhook: event dropped"
            );
        }

        Ok(outcome)
    }

    async fn handle_checkout_completed(&self, session: StripeCheckoutSession) -> WebhookOutcome {
        if session
            .mode
            .as_deref()
            .is_some_and(|mode| mode != "subscription")
        {
            return WebhookOutcome::Dropped(DropReason::NotSubscriptionCheckout);
        }
        let Some(subscription_id) = session.subscription.as_deref() else {
            return WebhookOutcome::Dropped(DropReason::NotSubscriptionCheckout);
        };

        let subscription = match self.stripe_gateway.retrieve_subscription(subscription_id).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(
                    subscription_id,
                    error = ?err,
                    "stripe_webhook: failed to retrieve subscription"
                );
                return WebhookOutcome::Dropped(DropReason::Upstream);
            }
        };

        let customer_id = session
            .customer
            .clone()
            .unwrap_or_else(|| subscription.customer.clone());

        let user_id = match self.link_checkout_to_user(&session, &customer_id).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => return WebhookOutcome::Dropped(DropReason::UnlinkableEvent),
            Err(err) => {
                warn!(
                    customer_id = %customer_id,
                    error = ?err,
                    "stripe_webhook: failed to link checkout to an account"
                );
                return WebhookOutcome::Dropped(DropReason::Upstream);
            }
        };

        let entity = UpsertEntitlementEntity {
            user_id,
            stripe_customer_id: Some(customer_id.clone()),
            stripe_subscription_id: Some(subscription.id.clone()),
            status: subscription.status().to_string(),
            price_id: subscription.price_id().map(str::to_string),
            cancel_at_period_end: subscription.cancel_at_period_end,
            updated_at: Utc::now(),
        };

        match self.entitlement_repo.upsert(entity).await {
            Ok(_) => {
                info!(
                    %user_id,
                    customer_id = %customer_id,
                    subscription_id = %subscription.id,
                    status = %subscription.status,
                    plan = %self.catalog.plan_for_optional_price_id(subscription.price_id()).name,
                    "stripe_webhook: checkout completed applied"
                );
                WebhookOutcome::Applied { user_id }
            }
            Err(err) => {
                warn!(%user_id, db_error = ?err, "stripe_webhook: failed to store entitlement");
                WebhookOutcome::Dropped(DropReason::Upstream)
            }
        }
    }

    /// Metadata user id, then a record holding the customer id, then an
    /// account whose email matches the customer's.
    async fn link_checkout_to_user(
        &self,
        session: &StripeCheckoutSession,
        customer_id: &str,
    ) -> anyhow::Result<Option<Uuid>> {
        if let Some(raw) = session.metadata_value(USER_ID_METADATA_KEY) {
            match Uuid::parse_str(raw.trim()) {
                Ok(user_id) => return Ok(Some(user_id)),
                Err(_) => {
                    warn!(customer_id, "stripe_webhook: ignoring unparseable user id metadata");
                }
            }
        }

        if let Some(record) = self
            .entitlement_repo
            .find_by_stripe_customer_id(customer_id)
            .await?
        {
            debug!(
                user_id = %record.user_id,
                customer_id,
                "stripe_webhook: linked checkout by stored customer id"
            );
            return Ok(Some(record.user_id));
        }

        let customer = self.stripe_gateway.retrieve_customer(customer_id).await?;
        if customer.deleted {
            debug!(customer_id, "stripe_webhook: customer is deleted");
            return Ok(None);
        }
        let email = customer
            .email
            .as_deref()
            .and_then(normalize_email)
            .or_else(|| {
                session
                    .customer_details
                    .as_ref()
                    .and_then(|details| details.email.as_deref())
                    .and_then(normalize_email)
            });
        let Some(email) = email else {
            debug!(customer_id, "stripe_webhook: customer has no email to match");
            return Ok(None);
        };

        let user_id = self.app_user_repo.find_user_id_by_email(&email).await?;
        if let Some(user_id) = user_id {
            info!(%user_id, customer_id, "stripe_webhook: linked checkout by account email");
        }
        Ok(user_id)
    }

    async fn handle_subscription_changed(
        &self,
        event_type: &str,
        subscription: StripeSubscription,
    ) -> WebhookOutcome {
        let update = SubscriptionStateUpdate {
            stripe_subscription_id: subscription.id.clone(),
            status: subscription.status(),
            price_id: subscription.price_id().map(str::to_string),
            cancel_at_period_end: subscription.cancel_at_period_end,
        };

        match self
            .entitlement_repo
            .update_subscription_state_by_customer_id(&subscription.customer, update)
            .await
        {
            Ok(Some(record)) => {
                info!(
                    user_id = %record.user_id,
                    customer_id = %subscription.customer,
                    subscription_id = %subscription.id,
                    status = %record.status,
                    cancel_at_period_end = record.cancel_at_period_end,
                    event_type,
                    "stripe_webhook: subscription state applied"
                );
                WebhookOutcome::Applied {
                    user_id: record.user_id,
                }
            }
            Ok(None) => WebhookOutcome::Dropped(DropReason::UnknownCustomer),
            Err(err) => {
                warn!(
                    customer_id = %subscription.customer,
                    db_error = ?err,
                    "stripe_webhook: failed to update subscription state"
                );
                WebhookOutcome::Dropped(DropReason::Upstream)
            }
        }
    }
}
