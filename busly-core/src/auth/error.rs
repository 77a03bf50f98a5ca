use super::secure_store::StorageError;
use crate::api::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.server_message().unwrap_or_else(|| e.to_string()),
            other => other.to_string(),
        }
    }
}
