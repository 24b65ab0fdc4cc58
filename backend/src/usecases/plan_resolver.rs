use anyhow::Result;
use certlist_core::domain::{
    entities::entitlements::UpsertEntitlementEntity,
    repositories::entitlements::EntitlementRepository,
    value_objects::{
        iam::SessionUser,
        plans::{PlanCatalog, PlanTier},
    },
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::usecases::stripe_gateway::StripeGateway;

/// Resolves the effective plan for a user: local record first, Stripe when the
/// record cannot answer, free plan otherwise.
pub struct PlanResolver<E, G>
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    entitlement_repo: Arc<E>,
    stripe_gateway: Arc<G>,
    catalog: Arc<PlanCatalog>,
}

impl<E, G> PlanResolver<E, G>
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    pub fn new(entitlement_repo: Arc<E>, stripe_gateway: Arc<G>, catalog: Arc<PlanCatalog>) -> Self {
        Self {
            entitlement_repo,
            stripe_gateway,
            catalog,
        }
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Never fails: every error path resolves to the free plan.
    pub async fn get_effective_plan(&self, session: Option<&SessionUser>) -> PlanTier {
        let Some(session) = session else {
            debug!("plan_resolver: no session, using free plan");
            return PlanTier::free();
        };
        let user_id = session.user_id;

        match self.entitlement_repo.find_by_user_id(user_id).await {
            Ok(Some(record)) => {
                if let Some(plan) = record.active_plan(&self.catalog) {
                    debug!(
                        %user_id,
                        plan = %plan.name,
                        "plan_resolver: using local active entitlement"
                    );
                    return plan;
                }
                debug!(
                    %user_id,
                    status = %record.status,
                    "plan_resolver: local entitlement not active, asking stripe"
                );
            }
            Ok(None) => {
                debug!(%user_id, "plan_resolver: no local entitlement, asking stripe");
            }
            Err(err) => {
                warn!(
                    %user_id,
                    db_error = ?err,
                    "plan_resolver: failed to load local entitlement, asking stripe"
                );
            }
        }

        match self.resolve_from_stripe(session).await {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                debug!(%user_id, "plan_resolver: no active stripe subscription, using free plan");
                PlanTier::free()
            }
            Err(err) => {
                warn!(
                    %user_id,
                    error = ?err,
                    "plan_resolver: stripe lookup failed, degrading to free plan"
                );
                PlanTier::free()
            }
        }
    }

    async fn resolve_from_stripe(&self, session: &SessionUser) -> Result<Option<PlanTier>> {
        let user_id = session.user_id;
        let Some(email) = session.normalized_email() else {
            debug!(%user_id, "plan_resolver: session has no email, cannot query stripe");
            return Ok(None);
        };

        let Some(customer) = self.stripe_gateway.find_customer_by_email(&email).await? else {
            return Ok(None);
        };

        let Some(subscription) = self
            .stripe_gateway
            .first_active_subscription(&customer.id, None)
            .await?
        else {
            return Ok(None);
        };

        let plan = self
            .catalog
            .plan_for_optional_price_id(subscription.price_id());

        info!(
            %user_id,
            customer_id = %customer.id,
            subscription_id = %subscription.id,
            plan = %plan.name,
            "plan_resolver: active stripe subscription found"
        );

        self.write_back(
            user_id,
            UpsertEntitlementEntity {
                user_id,
                stripe_customer_id: Some(customer.id.clone()),
                stripe_subscription_id: Some(subscription.id.clone()),
                status: subscription.status().to_string(),
                price_id: subscription.price_id().map(str::to_string),
                cancel_at_period_end: subscription.cancel_at_period_end,
                updated_at: Utc::now(),
            },
        )
        .await;

        Ok(Some(plan))
    }

    async fn write_back(&self, user_id: Uuid, entity: UpsertEntitlementEntity) {
        if let Err(err) = self.entitlement_repo.upsert(entity).await {
            warn!(
                %user_id,
                db_error = ?err,
                "plan_resolver: failed to write back stripe subscription"
            );
        }
    }
}
