/// Session flows
///
/// Signup, login, refresh, deactivate and change-password, composed from the
/// hasher, the token codecs, the revocation cache and the identity store.
/// Every authentication failure is returned with its precise cause; the HTTP
/// layer turns all of them into the same 401.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthenticatedUser, PasswordHasher, RevocationCache, TokenCodecs};
use crate::error::{AppError, AuthError, StoreError};
use crate::identity::{Identity, IdentityStore, NewIdentity};
use crate::validators::{is_valid_email, is_valid_password};

/// Tokens returned by a successful login
#[derive(Debug, Serialize)]
pub struct TokenPair {
    #[serde(rename = "accesstoken")]
    pub access_token: String,
    #[serde(rename = "refreshtoken")]
    pub refresh_token: String,
}

pub struct SessionService {
    store: Arc<dyn IdentityStore>,
    codecs: Arc<TokenCodecs>,
    revoked: Arc<RevocationCache>,
    hasher: PasswordHasher,
    poison_window: Duration,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        codecs: Arc<TokenCodecs>,
        revoked: Arc<RevocationCache>,
        hasher: PasswordHasher,
        poison_window: Duration,
    ) -> Self {
        Self {
            store,
            codecs,
            revoked,
            hasher,
            poison_window,
        }
    }

    /// Register a new, active identity.
    ///
    /// # Errors
    /// - `Validation` for a malformed email or password
    /// - `Conflict` if the email is already registered
    /// - `Internal` if hashing or the store fails
    pub async fn signup(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let email = is_valid_email(email)?;
        is_valid_password(password)?;

        let password_hash = self.hash_password(password).await?;
        let identity = self
            .store
            .insert(NewIdentity {
                email,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = %identity.id, "User has been created");
        Ok(identity)
    }

    /// Exchange credentials for an access token and a refresh token.
    ///
    /// # Errors
    /// - `Validation` for a malformed email or password, before any lookup
    /// - `Auth` for an unknown email, a wrong password or a disabled account
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let email = is_valid_email(email)?;
        is_valid_password(password)?;

        // Unknown email and wrong password must look identical to the client.
        let identity = match self.store.find_by_email(&email).await {
            Ok(identity) => identity,
            Err(StoreError::NotFound) => {
                tracing::warn!("Login attempt for an email that is not registered");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e.into()),
        };

        self.verify_password(&identity, password).await?;

        if !identity.is_active {
            return Err(AuthError::AccountDisabled(identity.id).into());
        }

        let access_token = self.codecs.access.create(identity.id)?;
        let refresh_token = self.codecs.refresh.create(identity.id)?;

        tracing::info!(user_id = %identity.id, "User logged in successfully");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Mint a new access token from a refresh token.
    ///
    /// The refresh token itself is not rotated.
    ///
    /// # Errors
    /// `Auth` if the token is missing, invalid or expired, if the identity is
    /// gone or disabled, or if the identity was saved after the token was issued
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<String, AppError> {
        let token = refresh_token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.codecs.refresh.verify(token)?;
        if !claims.user_id.is_valid() {
            return Err(AuthError::InvalidSubject.into());
        }

        let identity = self.store.find_by_id(claims.user_id).await?;

        if !identity.is_active {
            return Err(AuthError::AccountDisabled(identity.id).into());
        }

        if identity.predates_last_update(claims.issued_at) {
            return Err(AuthError::StaleToken(identity.id).into());
        }

        let access_token = self.codecs.access.create(identity.id)?;

        tracing::info!(user_id = %identity.id, "Access token has been refreshed");
        Ok(access_token)
    }

    /// Load the identity behind an authenticated request.
    pub async fn current_identity(&self, user: &AuthenticatedUser) -> Result<Identity, AppError> {
        Ok(self.store.find_by_id(user.user_id).await?)
    }

    /// Disable the caller's account and revoke the token used for this request.
    ///
    /// The store bumps `updated_at`, which kills every refresh token issued before now.
    ///
    /// # Errors
    /// `Validation` if the account is already disabled
    pub async fn deactivate(&self, user: &AuthenticatedUser) -> Result<(), AppError> {
        let identity = self.store.deactivate(user.user_id).await?;
        self.revoke(user);

        tracing::info!(user_id = %identity.id, "User has been disabled");
        Ok(())
    }

    /// Replace the caller's password and revoke the token used for this request.
    ///
    /// Only the hash is written, so a deactivate landing while the new hash
    /// is computed stays in effect.
    ///
    /// # Errors
    /// `Validation` if the new password is missing, too short or too long
    pub async fn change_password(
        &self,
        user: &AuthenticatedUser,
        new_password: &str,
    ) -> Result<(), AppError> {
        if let Err(e) = is_valid_password(new_password) {
            tracing::warn!(user_id = %user.user_id, "Invalid request to change password");
            return Err(e.into());
        }

        let password_hash = self.hash_password(new_password).await?;
        let identity = self
            .store
            .update_password_hash(user.user_id, password_hash)
            .await?;
        self.revoke(user);

        tracing::info!(user_id = %identity.id, "User password has been changed");
        Ok(())
    }

    /// Poison the caller's access token for the configured window, or until
    /// the token's own expiry if that is later.
    fn revoke(&self, user: &AuthenticatedUser) {
        let remaining = (user.expires_at - Utc::now()).to_std().unwrap_or_default();
        self.revoked
            .poison_for(&user.token, self.poison_window.max(remaining));
    }

    async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.hasher;
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, identity: &Identity, password: &str) -> Result<(), AppError> {
        let hasher = self.hasher;
        let hash = identity.password_hash.clone();
        let password = password.to_owned();

        let verified = tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?;

        verified.map_err(|e| {
            tracing::warn!(user_id = %identity.id, "Invalid login for user");
            e.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionValidator;
    use crate::configuration::JwtSettings;
    use crate::error::{TokenError, ValidationError};
    use crate::identity::{InMemoryIdentityStore, UserId};
    use async_trait::async_trait;

    fn codecs() -> Arc<TokenCodecs> {
        Arc::new(
            TokenCodecs::from_settings(&JwtSettings {
                access_token_secret: "session-access-secret".to_string(),
                refresh_token_secret: "session-refresh-secret".to_string(),
                access_token_expiry: 300,
                refresh_token_expiry: 3600,
                issuer: "test".to_string(),
            })
            .unwrap(),
        )
    }

    struct Harness {
        service: SessionService,
        store: Arc<InMemoryIdentityStore>,
        codecs: Arc<TokenCodecs>,
        revoked: Arc<RevocationCache>,
    }

    fn harness() -> Harness {
        harness_with(4, Duration::from_secs(300))
    }

    fn harness_with(hash_cost: u32, poison_window: Duration) -> Harness {
        let store = Arc::new(InMemoryIdentityStore::new());
        let codecs = codecs();
        let revoked = Arc::new(RevocationCache::new());
        let service = SessionService::new(
            store.clone(),
            codecs.clone(),
            revoked.clone(),
            PasswordHasher::new(hash_cost),
            poison_window,
        );
        Harness {
            service,
            store,
            codecs,
            revoked,
        }
    }

    impl Harness {
        fn authenticated(&self, access_token: &str) -> AuthenticatedUser {
            let claims = self.codecs.access.verify(access_token).unwrap();
            AuthenticatedUser {
                user_id: claims.user_id,
                token: access_token.to_string(),
                expires_at: claims.expires_at,
            }
        }
    }

    /// Store that fails the test if it is touched at all
    struct UntouchableStore;

    #[async_trait]
    impl IdentityStore for UntouchableStore {
        async fn insert(&self, _new: NewIdentity) -> Result<Identity, StoreError> {
            panic!("store must not be reached")
        }
        async fn find_by_id(&self, _id: UserId) -> Result<Identity, StoreError> {
            panic!("store must not be reached")
        }
        async fn find_by_email(&self, _email: &str) -> Result<Identity, StoreError> {
            panic!("store must not be reached")
        }
        async fn update_password_hash(
            &self,
            _id: UserId,
            _password_hash: String,
        ) -> Result<Identity, StoreError> {
            panic!("store must not be reached")
        }
        async fn deactivate(&self, _id: UserId) -> Result<Identity, StoreError> {
            panic!("store must not be reached")
        }
    }

    fn auth_cause(result: Result<impl std::fmt::Debug, AppError>) -> AuthError {
        match result {
            Err(AppError::Auth(cause)) => cause,
            other => panic!("expected an auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_signup_stores_hash_not_plaintext() {
        let h = harness();
        let identity = h.service.signup("a@b.com", "password1").await.unwrap();

        assert!(identity.is_active);
        let stored = h.store.find_by_email("a@b.com").await.unwrap();
        assert_ne!(stored.password_hash, "password1");
        assert!(PasswordHasher::new(4).verify(&stored.password_hash, "password1").is_ok());
    }

    #[tokio::test]
    async fn test_signup_duplicate_email_is_conflict() {
        let h = harness();
        h.service.signup("a@b.com", "password1").await.unwrap();

        let result = h.service.signup("a@b.com", "password2").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_the_store() {
        let service = SessionService::new(
            Arc::new(UntouchableStore),
            codecs(),
            Arc::new(RevocationCache::new()),
            PasswordHasher::new(4),
            Duration::from_secs(300),
        );

        let login = service.login("invalid-email", "password1").await;
        assert!(matches!(login, Err(AppError::Validation(ValidationError::InvalidFormat(_)))));

        let signup = service.signup("a@b.com", "short").await;
        assert!(matches!(signup, Err(AppError::Validation(ValidationError::TooShort(_, 8)))));
    }

    #[tokio::test]
    async fn test_login_issues_both_tokens() {
        let h = harness();
        let identity = h.service.signup("a@b.com", "password1").await.unwrap();

        let tokens = h.service.login("a@b.com", "password1").await.unwrap();

        assert_eq!(h.codecs.access.verify(&tokens.access_token).unwrap().user_id, identity.id);
        assert_eq!(h.codecs.refresh.verify(&tokens.refresh_token).unwrap().user_id, identity.id);
    }

    #[tokio::test]
    async fn test_login_failures_share_one_cause() {
        let h = harness();
        h.service.signup("a@b.com", "password1").await.unwrap();

        let wrong_password = auth_cause(h.service.login("a@b.com", "password2").await);
        let unknown_email = auth_cause(h.service.login("x@y.com", "password1").await);

        assert_eq!(wrong_password, AuthError::InvalidCredentials);
        assert_eq!(unknown_email, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_login_rejected_for_disabled_account() {
        let h = harness();
        h.service.signup("a@b.com", "password1").await.unwrap();
        let tokens = h.service.login("a@b.com", "password1").await.unwrap();
        h.service.deactivate(&h.authenticated(&tokens.access_token)).await.unwrap();

        let cause = auth_cause(h.service.login("a@b.com", "password1").await);
        assert!(matches!(cause, AuthError::AccountDisabled(_)));
    }

    #[tokio::test]
    async fn test_refresh_mints_access_token_and_does_not_rotate() {
        let h = harness();
        let identity = h.service.signup("a@b.com", "password1").await.unwrap();
        let tokens = h.service.login("a@b.com", "password1").await.unwrap();

        let first = h.service.refresh(Some(&tokens.refresh_token)).await.unwrap();
        let second = h.service.refresh(Some(&tokens.refresh_token)).await.unwrap();

        assert_eq!(h.codecs.access.verify(&first).unwrap().user_id, identity.id);
        assert_eq!(h.codecs.access.verify(&second).unwrap().user_id, identity.id);
    }

    #[tokio::test]
    async fn test_refresh_rejects_missing_and_wrong_kind() {
        let h = harness();
        h.service.signup("a@b.com", "password1").await.unwrap();
        let tokens = h.service.login("a@b.com", "password1").await.unwrap();

        assert_eq!(auth_cause(h.service.refresh(None).await), AuthError::MissingToken);
        assert_eq!(auth_cause(h.service.refresh(Some("  ")).await), AuthError::MissingToken);
        assert_eq!(
            auth_cause(h.service.refresh(Some(&tokens.access_token)).await),
            AuthError::InvalidToken(TokenError::BadSignature)
        );
    }

    #[tokio::test]
    async fn test_refresh_token_stale_after_password_change() {
        let h = harness();
        h.service.signup("a@b.com", "password1").await.unwrap();
        let tokens = h.service.login("a@b.com", "password1").await.unwrap();

        h.service
            .change_password(&h.authenticated(&tokens.access_token), "password2")
            .await
            .unwrap();

        let cause = auth_cause(h.service.refresh(Some(&tokens.refresh_token)).await);
        assert!(matches!(cause, AuthError::StaleToken(_)));

        // a fresh login after the change works again
        let fresh = h.service.login("a@b.com", "password2").await.unwrap();
        assert!(h.service.refresh(Some(&fresh.refresh_token)).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rejected_after_deactivate() {
        let h = harness();
        h.service.signup("a@b.com", "password1").await.unwrap();
        let tokens = h.service.login("a@b.com", "password1").await.unwrap();
        h.service.deactivate(&h.authenticated(&tokens.access_token)).await.unwrap();

        let cause = auth_cause(h.service.refresh(Some(&tokens.refresh_token)).await);
        assert!(matches!(cause, AuthError::AccountDisabled(_)));
    }

    #[tokio::test]
    async fn test_refresh_for_unknown_identity() {
        let h = harness();
        let orphan = h.codecs.refresh.create(UserId::new(404)).unwrap();

        assert_eq!(
            auth_cause(h.service.refresh(Some(&orphan)).await),
            AuthError::UnknownIdentity
        );
    }

    #[tokio::test]
    async fn test_deactivate_poisons_current_token_and_bumps_updated_at() {
        let h = harness();
        let created = h.service.signup("a@b.com", "password1").await.unwrap();
        let tokens = h.service.login("a@b.com", "password1").await.unwrap();

        h.service.deactivate(&h.authenticated(&tokens.access_token)).await.unwrap();

        assert!(h.revoked.contains(&tokens.access_token));
        let stored = h.store.find_by_id(created.id).await.unwrap();
        assert!(!stored.is_active);
        assert!(stored.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_deactivate_twice_is_validation_error() {
        let h = harness();
        h.service.signup("a@b.com", "password1").await.unwrap();
        let first = h.service.login("a@b.com", "password1").await.unwrap();
        let second = h.service.login("a@b.com", "password1").await.unwrap();

        h.service.deactivate(&h.authenticated(&first.access_token)).await.unwrap();
        let result = h.service.deactivate(&h.authenticated(&second.access_token)).await;

        assert!(matches!(result, Err(AppError::Validation(ValidationError::InvalidState(_)))));
        assert!(!h.revoked.contains(&second.access_token));
    }

    #[tokio::test]
    async fn test_change_password() {
        let h = harness();
        h.service.signup("a@b.com", "password1").await.unwrap();
        let tokens = h.service.login("a@b.com", "password1").await.unwrap();
        let user = h.authenticated(&tokens.access_token);

        let short = h.service.change_password(&user, "short").await;
        assert!(matches!(short, Err(AppError::Validation(_))));
        assert!(!h.revoked.contains(&tokens.access_token));

        h.service.change_password(&user, "password2").await.unwrap();

        assert!(h.revoked.contains(&tokens.access_token));
        assert!(h.service.login("a@b.com", "password1").await.is_err());
        assert!(h.service.login("a@b.com", "password2").await.is_ok());
    }

    #[tokio::test]
    async fn test_deactivate_during_password_change_stays_in_effect() {
        // Cost 10 keeps the new hash busy long enough for the deactivate to land first.
        let h = harness_with(10, Duration::from_secs(300));
        let created = h.service.signup("a@b.com", "password1").await.unwrap();
        let first = h.service.login("a@b.com", "password1").await.unwrap();
        let second = h.service.login("a@b.com", "password1").await.unwrap();
        let changing = h.authenticated(&first.access_token);
        let deactivating = h.authenticated(&second.access_token);

        let (changed, deactivated) = tokio::join!(
            h.service.change_password(&changing, "password2"),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                h.service.deactivate(&deactivating).await
            }
        );
        changed.unwrap();
        deactivated.unwrap();

        let stored = h.store.find_by_id(created.id).await.unwrap();
        assert!(!stored.is_active);
        assert!(PasswordHasher::new(10).verify(&stored.password_hash, "password2").is_ok());

        let cause = auth_cause(h.service.login("a@b.com", "password2").await);
        assert!(matches!(cause, AuthError::AccountDisabled(_)));
    }

    #[tokio::test]
    async fn test_poison_outlives_a_short_window() {
        let h = harness_with(4, Duration::from_millis(50));
        h.service.signup("a@b.com", "password1").await.unwrap();
        let tokens = h.service.login("a@b.com", "password1").await.unwrap();

        h.service
            .change_password(&h.authenticated(&tokens.access_token), "password2")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        // The access token itself is still unexpired, so it must stay poisoned.
        assert!(h.revoked.contains(&tokens.access_token));
        let validator = SessionValidator::new(h.codecs.clone(), h.revoked.clone());
        let header = format!("Bearer {}", tokens.access_token);
        assert_eq!(
            validator.authenticate(Some(&header)).unwrap_err(),
            AuthError::TokenRevoked
        );
    }

    #[tokio::test]
    async fn test_password_beyond_bcrypt_input_is_rejected() {
        let h = harness();
        let prefix = "a".repeat(72);

        let signup = h
            .service
            .signup("a@b.com", &format!("{}-right-suffix", prefix))
            .await;
        assert!(matches!(signup, Err(AppError::Validation(ValidationError::TooLong(_, 72)))));

        h.service.signup("a@b.com", &prefix).await.unwrap();
        let login = h
            .service
            .login("a@b.com", &format!("{}-WRONG-suffix", prefix))
            .await;
        assert!(matches!(login, Err(AppError::Validation(ValidationError::TooLong(_, 72)))));
        assert!(h.service.login("a@b.com", &prefix).await.is_ok());
    }

    #[tokio::test]
    async fn test_current_identity() {
        let h = harness();
        let created = h.service.signup("a@b.com", "password1").await.unwrap();
        let tokens = h.service.login("a@b.com", "password1").await.unwrap();

        let identity = h
            .service
            .current_identity(&h.authenticated(&tokens.access_token))
            .await
            .unwrap();

        assert_eq!(identity.id, created.id);
        assert_eq!(identity.email, "a@b.com");
    }
}
