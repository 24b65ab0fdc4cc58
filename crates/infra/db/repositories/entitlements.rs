use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update, upsert::excluded};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::entitlements},
};
use domain::{
    entities::entitlements::{EntitlementEntity, SubscriptionStateUpdate, UpsertEntitlementEntity},
    repositories::entitlements::EntitlementRepository,
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};

pub struct EntitlementPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EntitlementPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl EntitlementRepository for EntitlementPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<EntitlementEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = entitlements::table
            .filter(entitlements::user_id.eq(user_id))
            .select(EntitlementEntity::as_select())
            .first::<EntitlementEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<EntitlementEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = entitlements::table
            .filter(entitlements::stripe_customer_id.eq(stripe_customer_id))
            .order(entitlements::updated_at.desc())
            .select(EntitlementEntity::as_select())
            .first::<EntitlementEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn upsert_stub(
        &self,
        user_id: Uuid,
        stripe_customer_id: Option<String>,
    ) -> Result<EntitlementEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let result = insert_into(entitlements::table)
            .values((
                entitlements::user_id.eq(user_id),
                entitlements::stripe_customer_id.eq(stripe_customer_id),
                entitlements::status.eq(SubscriptionStatus::None.to_string()),
                entitlements::cancel_at_period_end.eq(false),
                entitlements::updated_at.eq(now),
            ))
            .on_conflict(entitlements::user_id)
            .do_update()
            .set((
                entitlements::stripe_customer_id.eq(diesel::dsl::sql::<
                    diesel::sql_types::Nullable<diesel::sql_types::Text>,
                >(
                    "COALESCE(excluded.stripe_customer_id, entitlements.stripe_customer_id)",
                )),
                entitlements::updated_at.eq(excluded(entitlements::updated_at)),
            ))
            .returning(EntitlementEntity::as_returning())
            .get_result::<EntitlementEntity>(&mut conn)?;

        Ok(result)
    }

    async fn upsert(&self, entity: UpsertEntitlementEntity) -> Result<EntitlementEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(entitlements::table)
            .values(&entity)
            .on_conflict(entitlements::user_id)
            .do_update()
            .set(&entity)
            .returning(EntitlementEntity::as_returning())
            .get_result::<EntitlementEntity>(&mut conn)?;

        Ok(result)
    }

    async fn update_subscription_state_by_customer_id(
        &self,
        stripe_customer_id: &str,
        state: SubscriptionStateUpdate,
    ) -> Result<Option<EntitlementEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = update(
            entitlements::table.filter(entitlements::stripe_customer_id.eq(stripe_customer_id)),
        )
        .set((
            entitlements::stripe_subscription_id.eq(Some(state.stripe_subscription_id)),
            entitlements::status.eq(state.status.to_string()),
            entitlements::price_id.eq(state.price_id),
            entitlements::cancel_at_period_end.eq(state.cancel_at_period_end),
            entitlements::updated_at.eq(Utc::now()),
        ))
        .returning(EntitlementEntity::as_returning())
        .get_result::<EntitlementEntity>(&mut conn)
        .optional()?;

        Ok(result)
    }
}
