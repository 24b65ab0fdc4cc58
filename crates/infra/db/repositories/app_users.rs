use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::users},
};
use domain::{
    entities::app_users::AppUserEntity, repositories::app_users::AppUserRepository,
    value_objects::iam::normalize_email,
};

const SCAN_PAGE_SIZE: i64 = 500;

pub struct AppUserPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl AppUserPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AppUserRepository for AppUserPostgres {
    // O(accounts). Replace with an indexed lookup on lower(email) if the
    // fallback outlives metadata-based linking.
    async fn find_user_id_by_email(&self, email: &str) -> Result<Option<Uuid>> {
        let Some(wanted) = normalize_email(email) else {
            return Ok(None);
        };

        let mut conn = Arc::clone(&self.db_pool).get()?;
        let mut last_seen: Option<Uuid> = None;

        loop {
            let mut query = users::table
                .select(AppUserEntity::as_select())
                .order(users::id.asc())
                .limit(SCAN_PAGE_SIZE)
                .into_boxed();
            if let Some(cursor) = last_seen {
                query = query.filter(users::id.gt(cursor));
            }

            let page = query.load::<AppUserEntity>(&mut conn)?;
            let page_len = page.len();

            if let Some(found) = page.iter().find(|user| {
                user.email.as_deref().and_then(normalize_email).as_deref() == Some(wanted.as_str())
            }) {
                return Ok(Some(found.id));
            }

            if (page_len as i64) < SCAN_PAGE_SIZE {
                return Ok(None);
            }
            last_seen = page.last().map(|user| user.id);
        }
    }
}
