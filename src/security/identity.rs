//! Bearer-token identity verification
//!
//! The gateway does not store credentials. An [`IdentityProvider`] turns an
//! opaque bearer token into a stable user id; roles live in the local user
//! directory.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Resolves a bearer token to a user id
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a token and return the subject it was issued for
    ///
    /// # Errors
    ///
    /// Returns `Error::Auth` if the token is invalid or expired
    async fn verify(&self, token: &str) -> Result<String>;
}

/// Claims carried by gateway tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// HS256 shared-secret token verifier
pub struct JwtIdentityProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
}

impl JwtIdentityProvider {
    /// Create a verifier for tokens signed with `secret`
    ///
    /// # Errors
    ///
    /// Returns error if the secret is empty
    pub fn new(secret: &SecretString, issuer: Option<String>) -> Result<Self> {
        let bytes = secret.expose_secret().as_bytes();
        if bytes.is_empty() {
            return Err(Error::Config("JWT secret required".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.required_spec_claims.remove("aud");
        if let Some(iss) = &issuer {
            validation.set_issuer(&[iss]);
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
            issuer,
        })
    }

    /// Sign a token for `user_id` valid for `ttl_secs`
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails
    pub fn issue(&self, user_id: &str, ttl_secs: u64) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());

        let claims = Claims {
            sub: user_id.to_string(),
            exp: now.saturating_add(ttl_secs),
            iss: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Auth(format!("failed to sign token: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> Result<String> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            Error::Auth(e.to_string())
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(Error::Auth("token has no subject".to_string()));
        }

        Ok(data.claims.sub)
    }
}
