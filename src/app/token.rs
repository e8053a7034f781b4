//! Identity tokens: signed, stateless bearer credentials naming a user.
//!
//! Tokens are HS256 JWTs carrying `{sub, iat, exp}`. All three claims are
//! required and expiry is enforced without leeway. `sub` is the decimal user
//! id as a string, the registered-claim form the decoder checks. Validation only proves the
//! token is genuine and current; resolving `sub` to a live account is the
//! caller's job.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::domain::{ConfigError, TokenError, UserId};

/// Smallest accepted signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Claims carried by every identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: decimal id of the user the token was issued to.
    pub sub: String,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Issues and validates identity tokens with one signing secret.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    /// Builds the service from the signing secret.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes or `ttl` is not positive. Both are startup
    /// faults rather than per-call failures.
    pub fn new(secret: &SecretString, ttl: Duration) -> Result<Self, ConfigError> {
        let secret = secret.expose_secret().as_bytes();
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                key: "JWT_SECRET".to_string(),
                message: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }
        if ttl <= Duration::zero() {
            return Err(ConfigError::InvalidValue {
                key: "TOKEN_TTL_SECS".to_string(),
                message: "must be positive".to_string(),
            });
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        })
    }

    /// Issues a token for `user_id`, valid from now for the configured lifetime.
    ///
    /// # Errors
    ///
    /// Only fails if the signer itself errors, which with an HMAC key means a
    /// broken build rather than bad input.
    pub fn issue(&self, user_id: UserId) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.sign(&claims)
    }

    /// Signs an explicit claim set.
    ///
    /// # Errors
    ///
    /// See [`TokenService::issue`].
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to sign identity token");
            TokenError::InvalidCredential(e.to_string())
        })
    }

    /// Validates `token` and returns the user id it was issued to.
    ///
    /// # Errors
    ///
    /// - `TokenError::Expired` once `exp` has passed.
    /// - `TokenError::InvalidCredential` for anything else: malformed
    ///   structure, wrong algorithm or signature, missing or mistyped claims.
    pub fn validate(&self, token: &str) -> Result<UserId, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!(error = %e, "Identity token rejected");
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidCredential(e.to_string()),
            }
        })?;

        data.claims.sub.parse::<UserId>().map_err(|_| {
            debug!(sub = %data.claims.sub, "Identity token subject is not a user id");
            TokenError::InvalidCredential("subject is not a user id".to_string())
        })
    }
}
