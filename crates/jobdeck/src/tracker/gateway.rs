use async_trait::async_trait;

use super::domain::{ApplicationId, ApplicationPatch, JobApplication, NewApplication, UserId};

/// CRUD access to the hosted backend holding persisted applications.
#[async_trait]
pub trait ApplicationGateway: Send + Sync {
    async fn list(&self, user_id: &UserId) -> Result<Vec<JobApplication>, GatewayError>;

    async fn create(
        &self,
        user_id: &UserId,
        draft: NewApplication,
    ) -> Result<JobApplication, GatewayError>;

    /// Returns the row as stored after the update.
    async fn update(
        &self,
        id: &ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<JobApplication, GatewayError>;

    async fn delete(&self, id: &ApplicationId) -> Result<(), GatewayError>;
}

/// Error enumeration for backend failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("record not found")]
    NotFound,
    #[error("backend unavailable: {message}")]
    Unavailable {
        message: String,
        code: Option<String>,
    },
}

impl GatewayError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            code: None,
        }
    }
}
