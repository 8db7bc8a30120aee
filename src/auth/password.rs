/// Password Hashing and Verification
///
/// Salted bcrypt hashes with a cost factor fixed at startup.

use crate::error::{AppError, AuthError, ValidationError};
use crate::validators::MAX_PASSWORD_LENGTH;

/// Credential hasher configured with a fixed bcrypt cost
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password using bcrypt
    ///
    /// Every call uses a fresh salt, so hashing the same password twice
    /// yields different strings.
    ///
    /// # Errors
    /// - `AppError::Validation` if the password is longer than bcrypt can read
    /// - `AppError::Internal` if bcrypt fails (random source or invalid cost)
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        if password.len() > MAX_PASSWORD_LENGTH {
            return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_LENGTH).into());
        }
        bcrypt::hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against its hash
    ///
    /// A wrong password and an unparseable hash are the same failure to the caller.
    pub fn verify(&self, hash: &str, password: &str) -> Result<(), AuthError> {
        // bcrypt would compare only a prefix of a longer input.
        if password.len() > MAX_PASSWORD_LENGTH {
            return Err(AuthError::InvalidCredentials);
        }
        match bcrypt::verify(password, hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash could not be parsed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}
