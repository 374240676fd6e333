//! Manage json web tokens.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

const EXPIRATION_TIME: u64 = 60 * 60 * 24; // 24 hours.

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    pub username: String,
    pub role: String,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
}

/// Manage HS256 tokens.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiration: u64,
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance.
    pub fn new(secret: &str, expiration: Option<u64>) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiration: expiration.unwrap_or(EXPIRATION_TIME),
        }
    }

    /// Create a new [`jsonwebtoken`].
    pub fn create(&self, user_id: &str, username: &str, role: &str) -> Result<String> {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| ServerError::internal("system clock is before epoch", err))?
            .as_secs();
        let claims = Claims {
            sub: user_id.to_owned(),
            username: username.to_owned(),
            role: role.to_owned(),
            iat: time,
            exp: time + self.expiration,
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|err| ServerError::internal("failed to sign token", err))
    }

    /// Decode and check a token.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "rejected token");
                ServerError::Unauthorized
            })
    }
}
