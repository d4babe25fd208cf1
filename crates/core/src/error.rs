//! Error types for the RepairKit domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator capability has its own error enum; the top-level
//! [`Error`] wraps them so binaries can propagate with `?`.

use thiserror::Error;

/// The top-level error type for all RepairKit operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Text generation ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Device catalog ---
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    // --- Fallback web search ---
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    // --- Persistence ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Caller identity ---
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Catalog request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Not found in catalog: {0}")]
    NotFound(String),

    #[error("Catalog request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed catalog response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search backend not configured: {0}")]
    NotConfigured(String),

    #[error("Search request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Search timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed search response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has no subject claim")]
    MissingSubject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn catalog_error_converts_into_top_level() {
        let err: Error = CatalogError::NotFound("guide 1234".into()).into();
        assert!(matches!(err, Error::Catalog(_)));
        assert!(err.to_string().contains("guide 1234"));
    }

    #[test]
    fn store_error_names_missing_session() {
        let err = Error::Store(StoreError::SessionNotFound("abc".into()));
        assert_eq!(err.to_string(), "Store error: Session not found: abc");
    }
}
