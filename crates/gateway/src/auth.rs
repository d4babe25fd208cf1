//! Bearer-token authentication.
//!
//! Every protected route runs [`auth_middleware`], which resolves the
//! `Authorization: Bearer <token>` header to a [`Caller`] through the
//! configured [`TokenVerifier`] and stores it in the request extensions.

use crate::SharedState;
use crate::error::ApiError;
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use repairkit_config::AppConfig;
use repairkit_core::auth::{Caller, TokenVerifier};
use repairkit_core::error::AuthError;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
}

/// HS256 JWTs; the `sub` claim is the user id.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn hs256(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Reads claims without checking the signature or expiry. Development only.
    pub fn unverified() -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(&[]),
            validation,
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Caller, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        match data.claims.sub {
            Some(sub) if !sub.trim().is_empty() => Ok(Caller { user_id: sub }),
            _ => Err(AuthError::MissingSubject),
        }
    }
}

/// Fixed tokens mapped to user ids.
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Caller, AuthError> {
        self.tokens
            .get(token)
            .map(|user_id| Caller {
                user_id: user_id.clone(),
            })
            .ok_or_else(|| AuthError::InvalidToken("unknown token".into()))
    }
}

/// Tries each verifier in order; the first acceptance wins.
pub struct ChainVerifier {
    verifiers: Vec<Arc<dyn TokenVerifier>>,
}

impl ChainVerifier {
    pub fn new(verifiers: Vec<Arc<dyn TokenVerifier>>) -> Self {
        Self { verifiers }
    }
}

#[async_trait]
impl TokenVerifier for ChainVerifier {
    async fn verify(&self, token: &str) -> Result<Caller, AuthError> {
        let mut last = AuthError::InvalidToken("no verifier configured".into());
        for verifier in &self.verifiers {
            match verifier.verify(token).await {
                Ok(caller) => return Ok(caller),
                Err(e) => last = e,
            }
        }
        Err(last)
    }
}

/// Pick the verifier for this deployment.
///
/// Outside production, a missing secret or `verify_signature = false`
/// falls back to reading JWT claims without a signature check.
pub fn build_verifier(config: &AppConfig) -> Arc<dyn TokenVerifier> {
    let auth = &config.auth;

    let statics: Option<Arc<dyn TokenVerifier>> = (!auth.static_tokens.is_empty())
        .then(|| Arc::new(StaticTokenVerifier::new(auth.static_tokens.clone())) as Arc<dyn TokenVerifier>);

    let jwt: Option<Arc<dyn TokenVerifier>> = match &auth.jwt_secret {
        Some(secret) if auth.verify_signature => Some(Arc::new(JwtVerifier::hs256(secret))),
        _ if config.is_production() => None,
        Some(_) => {
            warn!("JWT signature checks are disabled; do not run like this in production");
            Some(Arc::new(JwtVerifier::unverified()))
        }
        None if statics.is_some() => None,
        None => {
            warn!("No auth configured; accepting unverified JWTs in development");
            Some(Arc::new(JwtVerifier::unverified()))
        }
    };

    match (statics, jwt) {
        (Some(statics), Some(jwt)) => Arc::new(ChainVerifier::new(vec![statics, jwt])),
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => Arc::new(StaticTokenVerifier::new(HashMap::new())),
    }
}

/// Resolve the bearer token to a [`Caller`] or reject with 401.
pub async fn auth_middleware(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        warn!(path = %req.uri().path(), "Request without bearer token");
        return Err(AuthError::MissingToken.into());
    };

    let caller = state.verifier.verify(&token).await.inspect_err(|e| {
        warn!(path = %req.uri().path(), error = %e, "Rejected bearer token");
    })?;
    debug!(user_id = %caller.user_id, "Authenticated request");

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}
