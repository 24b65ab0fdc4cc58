//! In-memory stand-ins shared by the use-case and router tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::{Result, bail};
use async_trait::async_trait;
use certlist_core::{
    domain::{
        entities::entitlements::{
            EntitlementEntity, SubscriptionStateUpdate, UpsertEntitlementEntity,
        },
        repositories::{app_users::AppUserRepository, entitlements::EntitlementRepository},
        value_objects::{
            enums::subscription_statuses::SubscriptionStatus,
            iam::normalize_email,
            plans::{PaidPriceIds, PlanCatalog},
        },
    },
    payments::stripe_client::{
        StripeCustomer, StripePrice, StripeSubscription, StripeSubscriptionItem,
        StripeSubscriptionItems,
    },
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

pub(crate) const BASIC: &str = "price_basic";
pub(crate) const PREMIUM: &str = "price_premium";
pub(crate) const ENTERPRISE: &str = "price_enterprise";
pub(crate) const WEBHOOK_SECRET: &str = "whsec_test_secret";

pub(crate) fn catalog() -> PlanCatalog {
    PlanCatalog::new(PaidPriceIds {
        basic: BASIC.to_string(),
        premium: PREMIUM.to_string(),
        enterprise: ENTERPRISE.to_string(),
    })
}

pub(crate) fn customer(id: &str, email: Option<&str>) -> StripeCustomer {
    StripeCustomer {
        id: id.to_string(),
        email: email.map(str::to_string),
        deleted: false,
    }
}

pub(crate) fn subscription(id: &str, customer: &str, status: &str, price: &str) -> StripeSubscription {
    StripeSubscription {
        id: id.to_string(),
        customer: customer.to_string(),
        status: status.to_string(),
        cancel_at_period_end: false,
        items: StripeSubscriptionItems {
            data: vec![StripeSubscriptionItem {
                price: Some(StripePrice {
                    id: price.to_string(),
                }),
            }],
        },
    }
}

pub(crate) fn record(
    user_id: Uuid,
    customer_id: Option<&str>,
    status: &str,
    price_id: Option<&str>,
) -> EntitlementEntity {
    EntitlementEntity {
        user_id,
        stripe_customer_id: customer_id.map(str::to_string),
        stripe_subscription_id: None,
        status: status.to_string(),
        price_id: price_id.map(str::to_string),
        cancel_at_period_end: false,
        updated_at: Utc::now(),
    }
}

pub(crate) fn sign(payload: &[u8]) -> String {
    let timestamp = Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

/// Mirrors the Postgres repository semantics over a map keyed by user id.
#[derive(Default)]
pub(crate) struct InMemoryEntitlements {
    rows: Mutex<HashMap<Uuid, EntitlementEntity>>,
    writes: AtomicUsize,
    fail: bool,
}

impl InMemoryEntitlements {
    pub(crate) fn with(records: Vec<EntitlementEntity>) -> Self {
        let store = Self::default();
        {
            let mut rows = store.rows.lock().unwrap();
            for record in records {
                rows.insert(record.user_id, record);
            }
        }
        store
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn get(&self, user_id: Uuid) -> Option<EntitlementEntity> {
        self.rows.lock().unwrap().get(&user_id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            bail!("database unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl EntitlementRepository for InMemoryEntitlements {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<EntitlementEntity>> {
        self.check()?;
        Ok(self.get(user_id))
    }

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<EntitlementEntity>> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|row| row.stripe_customer_id.as_deref() == Some(stripe_customer_id))
            .cloned())
    }

    async fn upsert_stub(
        &self,
        user_id: Uuid,
        stripe_customer_id: Option<String>,
    ) -> Result<EntitlementEntity> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let row = rows.entry(user_id).or_insert_with(|| EntitlementEntity {
            user_id,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            status: SubscriptionStatus::None.to_string(),
            price_id: None,
            cancel_at_period_end: false,
            updated_at: Utc::now(),
        });
        if stripe_customer_id.is_some() {
            row.stripe_customer_id = stripe_customer_id;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn upsert(&self, entity: UpsertEntitlementEntity) -> Result<EntitlementEntity> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let row = entity.into_entity();
        self.rows.lock().unwrap().insert(row.user_id, row.clone());
        Ok(row)
    }

    async fn update_subscription_state_by_customer_id(
        &self,
        stripe_customer_id: &str,
        update: SubscriptionStateUpdate,
    ) -> Result<Option<EntitlementEntity>> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .values_mut()
            .find(|row| row.stripe_customer_id.as_deref() == Some(stripe_customer_id))
        else {
            return Ok(None);
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        row.stripe_subscription_id = Some(update.stripe_subscription_id);
        row.status = update.status.to_string();
        row.price_id = update.price_id;
        row.cancel_at_period_end = update.cancel_at_period_end;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }
}

#[derive(Default)]
pub(crate) struct InMemoryAppUsers {
    accounts: Vec<(Uuid, String)>,
}

impl InMemoryAppUsers {
    pub(crate) fn with(accounts: Vec<(Uuid, &str)>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|(id, email)| (id, email.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl AppUserRepository for InMemoryAppUsers {
    async fn find_user_id_by_email(&self, email: &str) -> Result<Option<Uuid>> {
        let Some(wanted) = normalize_email(email) else {
            return Ok(None);
        };
        Ok(self
            .accounts
            .iter()
            .find(|(_, candidate)| normalize_email(candidate).as_deref() == Some(wanted.as_str()))
            .map(|(id, _)| *id))
    }
}
