use anyhow::Result as AnyResult;
use async_trait::async_trait;
use certlist_core::payments::stripe_client::{
    CheckoutSessionParams, StripeClient, StripeCustomer, StripeSubscription,
};

/// The slice of Stripe the reconciliation paths talk to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn find_customer_by_email(&self, email: &str) -> AnyResult<Option<StripeCustomer>>;

    async fn retrieve_customer(&self, customer_id: &str) -> AnyResult<StripeCustomer>;

    async fn first_active_subscription(
        &self,
        customer_id: &str,
        price_id: Option<String>,
    ) -> AnyResult<Option<StripeSubscription>>;

    async fn create_checkout_session(&self, params: CheckoutSessionParams) -> AnyResult<String>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn find_customer_by_email(&self, email: &str) -> AnyResult<Option<StripeCustomer>> {
        self.find_customer_by_email(email).await
    }

    async fn retrieve_customer(&self, customer_id: &str) -> AnyResult<StripeCustomer> {
        self.retrieve_customer(customer_id).await
    }

    async fn first_active_subscription(
        &self,
        customer_id: &str,
        price_id: Option<String>,
    ) -> AnyResult<Option<StripeSubscription>> {
        self.first_active_subscription(customer_id, price_id.as_deref())
            .await
    }

    async fn create_checkout_session(&self, params: CheckoutSessionParams) -> AnyResult<String> {
        self.create_checkout_session(params).await
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }
}
