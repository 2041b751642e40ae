//! Session contract. Login and token refresh live outside this workspace; the
//! sync layer only reads what an authenticated session exposes.

use async_trait::async_trait;

use crate::errors::Result;

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Instance base URL, e.g. `https://example.my.salesforce.com`.
    async fn instance_url(&self) -> Result<String>;

    async fn access_token(&self) -> Result<String>;

    /// Contact id of the signed-in user; surveys are scoped to it.
    async fn user_contact_id(&self) -> Result<String>;
}

/// Fixed session values, for hosts that resolve the session up front.
#[derive(Debug, Clone)]
pub struct StaticSession {
    pub instance_url: String,
    pub access_token: String,
    pub user_contact_id: String,
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn instance_url(&self) -> Result<String> {
        Ok(self.instance_url.trim_end_matches('/').to_string())
    }

    async fn access_token(&self) -> Result<String> {
        Ok(self.access_token.clone())
    }

    async fn user_contact_id(&self) -> Result<String> {
        Ok(self.user_contact_id.clone())
    }
}
