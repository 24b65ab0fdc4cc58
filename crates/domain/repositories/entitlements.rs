use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::entitlements::{
    EntitlementEntity, SubscriptionStateUpdate, UpsertEntitlementEntity,
};

#[automock]
#[async_trait]
pub trait EntitlementRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<EntitlementEntity>>;

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<EntitlementEntity>>;

    /// Makes sure a row exists for `user_id` without touching subscription
    /// fields. A known customer id is recorded, an unknown one never clears it.
    async fn upsert_stub(
        &self,
        user_id: Uuid,
        stripe_customer_id: Option<String>,
    ) -> Result<EntitlementEntity>;

    /// Full-row upsert keyed by `user_id`.
    async fn upsert(&self, entity: UpsertEntitlementEntity) -> Result<EntitlementEntity>;

    /// Overwrites subscription fields on the row owning `stripe_customer_id`.
    /// Returns `None` when no local row carries that customer.
    async fn update_subscription_state_by_customer_id(
        &self,
        stripe_customer_id: &str,
        update: SubscriptionStateUpdate,
    ) -> Result<Option<EntitlementEntity>>;
}
