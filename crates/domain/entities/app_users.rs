use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::users;

/// Account row owned by the identity provider (read-only here).
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = users)]
pub struct AppUserEntity {
    pub id: Uuid,
    pub email: Option<String>,
}
