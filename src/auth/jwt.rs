/// Token Codec
///
/// Creates and verifies HS256-signed tokens. Access and refresh tokens are
/// produced by two separate codec instances with separate secrets, so a token
/// of one kind can never verify as the other.

use chrono::{DateTime, SubsecRound, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;

use crate::auth::claims::{Claims, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::{AppError, ConfigError, TokenError};
use crate::identity::UserId;

/// Signs and verifies tokens of one kind.
///
/// Holds only immutable key material after construction and is safe to share
/// between request handlers.
pub struct TokenCodec {
    kind: TokenKind,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
    issuer: String,
}

impl TokenCodec {
    /// # Errors
    /// Returns `ConfigError` if the secret is empty or the ttl cannot be represented
    pub fn new(
        kind: TokenKind,
        secret: &[u8],
        ttl: Duration,
        issuer: &str,
    ) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingRequired(format!("{} token secret", kind)));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| ConfigError::InvalidValue(format!("{} token ttl: {}", kind, e)))?;

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against `expiresAt` at microsecond precision below.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["iss"]);
        validation.set_issuer(&[issuer]);

        Ok(Self {
            kind,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
            issuer: issuer.to_string(),
        })
    }

    /// Mint a token for `user_id`, issued now and expiring after the codec's ttl.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if signing fails
    pub fn create(&self, user_id: UserId) -> Result<String, AppError> {
        self.create_at(user_id, Utc::now())
    }

    fn create_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims::new(user_id, now.trunc_subsecs(6), self.ttl, &self.issuer);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("{} token generation failed: {}", self.kind, e)))
    }

    /// Check the signature, then the claims, then expiry.
    ///
    /// # Errors
    /// `BadSignature` if the MAC does not match this codec's secret,
    /// `Expired` once `expiresAt` has passed, `Malformed` for anything else
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::InvalidSignature => TokenError::BadSignature,
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                };
                tracing::debug!(kind = %self.kind, error = %e, "Token verification failed");
                reason
            })?;

        if claims.is_expired() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

/// The access and refresh codecs, built once at startup
pub struct TokenCodecs {
    pub access: TokenCodec,
    pub refresh: TokenCodec,
}

impl TokenCodecs {
    /// # Errors
    /// Returns `ConfigError` if either secret is empty or both kinds share a secret
    pub fn from_settings(settings: &JwtSettings) -> Result<Self, ConfigError> {
        if settings.access_token_secret == settings.refresh_token_secret {
            return Err(ConfigError::InvalidValue(
                "access and refresh tokens must use different secrets".to_string(),
            ));
        }

        Ok(Self {
            access: TokenCodec::new(
                TokenKind::Access,
                settings.access_token_secret.as_bytes(),
                settings.access_token_ttl(),
                &settings.issuer,
            )?,
            refresh: TokenCodec::new(
                TokenKind::Refresh,
                settings.refresh_token_secret.as_bytes(),
                settings.refresh_token_ttl(),
                &settings.issuer,
            )?,
        })
    }
}
