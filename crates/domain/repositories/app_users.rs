use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[automock]
#[async_trait]
pub trait AppUserRepository {
    /// Linear scan over identity-provider accounts. Only used as a fallback
    /// for provider events that carry no local user id.
    async fn find_user_id_by_email(&self, email: &str) -> Result<Option<Uuid>>;
}
