//! TokenVerifier trait: turns a bearer token into a caller identity.

use crate::error::AuthError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> std::result::Result<Caller, AuthError>;
}
