use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        plans::{PlanCatalog, PlanTier},
    },
    infra::db::postgres::schema::entitlements,
};

#[derive(Debug, Clone, PartialEq, Eq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = entitlements, primary_key(user_id))]
pub struct EntitlementEntity {
    pub user_id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub status: String,
    pub price_id: Option<String>,
    pub cancel_at_period_end: bool,
    pub updated_at: DateTime<Utc>,
}

impl EntitlementEntity {
    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_str(&self.status)
    }

    /// Plan granted by this record alone, without asking the provider.
    /// `None` means the record cannot answer (not active, or no price).
    pub fn active_plan(&self, catalog: &PlanCatalog) -> Option<PlanTier> {
        if !self.status().is_active() {
            return None;
        }
        self.price_id
            .as_deref()
            .map(|price_id| catalog.plan_for_price_id(price_id))
    }
}

/// Full-row write. `None` fields overwrite stored values with NULL.
#[derive(Debug, Clone, PartialEq, Eq, Insertable, AsChangeset)]
#[diesel(table_name = entitlements, treat_none_as_null = true)]
pub struct UpsertEntitlementEntity {
    pub user_id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub status: String,
    pub price_id: Option<String>,
    pub cancel_at_period_end: bool,
    pub updated_at: DateTime<Utc>,
}

impl UpsertEntitlementEntity {
    pub fn into_entity(self) -> EntitlementEntity {
        EntitlementEntity {
            user_id: self.user_id,
            stripe_customer_id: self.stripe_customer_id,
            stripe_subscription_id: self.stripe_subscription_id,
            status: self.status,
            price_id: self.price_id,
            cancel_at_period_end: self.cancel_at_period_end,
            updated_at: self.updated_at,
        }
    }
}

/// Subscription fields carried by a provider event, applied to the record that
/// owns the customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionStateUpdate {
    pub stripe_subscription_id: String,
    pub status: SubscriptionStatus,
    pub price_id: Option<String>,
    pub cancel_at_period_end: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::plans::{PlanName, sample_catalog};

    fn record(status: &str, price_id: Option<&str>) -> EntitlementEntity {
        EntitlementEntity {
            user_id: Uuid::new_v4(),
            stripe_customer_id: Some("cus_1".to_string()),
            stripe_subscription_id: Some("sub_1".to_string()),
            status: status.to_string(),
            price_id: price_id.map(str::to_string),
            cancel_at_period_end: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn active_record_maps_price_through_catalog() {
        let catalog = sample_catalog();
        let entity = record("active", Some("price_premium"));

        let plan = entity.active_plan(&catalog).expect("active record answers");
        assert_eq!(plan.name, PlanName::Premium);
    }

    #[test]
    fn inactive_or_priceless_records_defer_to_provider() {
        let catalog = sample_catalog();

        for entity in [
            record("canceled", Some("price_premium")),
            record("past_due", Some("price_basic")),
            record("active", None),
            record("none", None),
        ] {
            assert!(entity.active_plan(&catalog).is_none());
        }
    }

    #[test]
    fn active_record_with_unknown_price_is_free_but_answers_locally() {
        let catalog = sample_catalog();
        let entity = record("active", Some("price_legacy"));

        assert_eq!(entity.active_plan(&catalog), Some(PlanTier::free()));
    }
}
