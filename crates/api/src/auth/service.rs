//! Registration, login, and admin elevation

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use quillhub_shared::{Account, AccountProfile, NewAccount, Role};
use uuid::Uuid;

use super::error::AuthError;
use super::jwt::TokenCodec;
use super::password::PasswordHasher;
use super::store::{CredentialStore, StoreError};
use super::validation::{AccountDraft, RegistrationPolicy, RoleAssignment, ValidDraft};

/// Default bound on a single credential store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Identity of the service account used by the content generator
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub name: String,
    pub username: String,
    pub email: String,
}

impl Default for BotIdentity {
    fn default() -> Self {
        Self {
            name: "QuillHub AI Bot".to_string(),
            username: "quillhub_ai".to_string(),
            email: "aibot@quillhub.com".to_string(),
        }
    }
}

/// Orchestrates the account lifecycle on top of a [`CredentialStore`]
///
/// Holds no mutable state of its own; clones share the same store, codec,
/// and hasher and can be used from any number of requests at once.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: TokenCodec,
    policy: RegistrationPolicy,
    store_timeout: Duration,
    dummy_hash: Arc<str>,
}

impl AuthService {
    /// Create the service; computes the decoy hash used for unknown logins
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: TokenCodec,
        policy: RegistrationPolicy,
    ) -> Result<Self, AuthError> {
        let dummy_hash = hasher.impossible_hash()?;

        Ok(Self {
            store,
            hasher,
            tokens,
            policy,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Override the per-call store deadline
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    /// Register a new account with the draft's role (default: `user`)
    ///
    /// The privileged role can only be granted through [`Self::register_admin`].
    pub async fn register(&self, draft: AccountDraft) -> Result<Account, AuthError> {
        if draft.role.is_some_and(|role| role.is_privileged()) {
            tracing::warn!(username = %draft.username.trim(), "register: privileged role requested via self-registration");
            return Err(AuthError::Forbidden);
        }

        let valid = self.policy.validate(draft, RoleAssignment::FromDraft)?;
        self.create_account(valid).await
    }

    /// Create an admin account on behalf of an existing admin
    pub async fn register_admin(
        &self,
        draft: AccountDraft,
        requesting_role: Role,
    ) -> Result<Account, AuthError> {
        if !requesting_role.is_privileged() {
            tracing::warn!(%requesting_role, "register_admin: requester is not an admin");
            return Err(AuthError::Forbidden);
        }

        let valid = self
            .policy
            .validate(draft, RoleAssignment::Forced(Role::PRIVILEGED))?;
        self.create_account(valid).await
    }

    /// Verify credentials and issue a session token
    ///
    /// Unknown identifiers and wrong passwords fail identically.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<(AccountProfile, String), AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let mut account = None;
        if identifier.contains('@') {
            let email = identifier.to_lowercase();
            account = self.bounded(self.store.find_by_email(&email)).await?;
        }
        if account.is_none() {
            account = self.bounded(self.store.find_by_username(identifier)).await?;
        }

        // Always pay for one verification, found or not
        let target_hash = match &account {
            Some(found) => found.password_hash.clone(),
            None => self.dummy_hash.to_string(),
        };
        let password_ok = self.verify_blocking(password, target_hash).await?;

        let account = match account {
            Some(found) if password_ok => found,
            Some(found) => {
                tracing::warn!(account_id = %found.id, reason = "invalid_password", "login: rejected");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                tracing::warn!(reason = "account_not_found", "login: rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let token = self
            .tokens
            .issue(account.id, &account.email, &account.username, account.role)?;

        tracing::info!(account_id = %account.id, role = %account.role, "login: token issued");
        Ok((account.into_profile(), token))
    }

    /// Return the bot account, creating it on first use
    ///
    /// Safe to call concurrently from several processes: a losing racer
    /// reads back the winner's row.
    pub async fn ensure_bot_account(&self, bot: &BotIdentity) -> Result<Account, AuthError> {
        let email = bot.email.trim().to_lowercase();
        if let Some(existing) = self.bounded(self.store.find_by_email(&email)).await? {
            tracing::debug!(account_id = %existing.id, "Bot account already exists");
            return Ok(existing);
        }

        // Nobody knows this password; the bot never logs in with one
        let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let draft = AccountDraft {
            name: bot.name.clone(),
            username: bot.username.clone(),
            email: email.clone(),
            password: secret,
            role: None,
        };
        let valid = self
            .policy
            .validate(draft, RoleAssignment::Forced(Role::Bot))?;

        match self.create_account(valid).await {
            Ok(account) => {
                tracing::info!(account_id = %account.id, "Created bot account");
                Ok(account)
            }
            Err(AuthError::UsernameTaken | AuthError::EmailAlreadyRegistered) => self
                .bounded(self.store.find_by_email(&email))
                .await?
                .ok_or(AuthError::UsernameTaken),
            Err(e) => Err(e),
        }
    }

    /// Shared tail of every creation path: uniqueness fast path, hash, insert
    async fn create_account(&self, valid: ValidDraft) -> Result<Account, AuthError> {
        if self
            .bounded(self.store.find_by_username(&valid.username))
            .await?
            .is_some()
        {
            tracing::info!(username = %valid.username, "register: username already taken");
            return Err(AuthError::UsernameTaken);
        }
        if self
            .bounded(self.store.find_by_email(&valid.email))
            .await?
            .is_some()
        {
            tracing::info!("register: email already registered");
            return Err(AuthError::EmailAlreadyRegistered);
        }

        let ValidDraft {
            name,
            username,
            email,
            password,
            role,
        } = valid;
        let password_hash = self.hash_blocking(password).await?;

        // The store's constraint decides races the lookups above could not see
        let account = self
            .bounded(self.store.create(NewAccount {
                name,
                username,
                email,
                password_hash,
                role,
            }))
            .await?;

        tracing::info!(account_id = %account.id, role = %account.role, "Account created");
        Ok(account)
    }

    /// Run a store call under the configured deadline
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => {
                tracing::error!(timeout = ?self.store_timeout, "Credential store call timed out");
                Err(AuthError::Internal("credential store timed out".to_string()))
            }
        }
    }

    // Hashing runs to completion on the blocking pool even if the request
    // future is dropped; a half-computed hash is worthless anyway.
    async fn hash_blocking(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {}", e)))??;
        Ok(hash)
    }

    async fn verify_blocking(&self, password: &str, hash: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("verification task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{ManualClock, TokenError, TOKEN_TTL_HOURS};
    use crate::auth::store::InMemoryCredentialStore;
    use crate::auth::validation::ValidationError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;

    const SECRET: &str = "test-secret-key-at-least-32-chars!";

    fn draft(username: &str, email: &str) -> AccountDraft {
        AccountDraft {
            name: "Ada Lovelace".to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password: "longenough1".to_string(),
            role: None,
        }
    }

    fn service_with(store: Arc<dyn CredentialStore>, clock: Arc<ManualClock>) -> AuthService {
        let tokens = TokenCodec::with_clock(SECRET, time::Duration::hours(TOKEN_TTL_HOURS), clock)
            .expect("valid secret");
        AuthService::new(
            store,
            PasswordHasher::insecure_for_tests().unwrap(),
            tokens,
            RegistrationPolicy::default(),
        )
        .expect("service")
    }

    fn service() -> (AuthService, Arc<InMemoryCredentialStore>, Arc<ManualClock>) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
        (service_with(store.clone(), clock.clone()), store, clock)
    }

    /// Store whose lookups never see anything, so only the insert can catch duplicates
    struct BlindLookups {
        inner: InMemoryCredentialStore,
        email_lookups: AtomicUsize,
        username_lookups: AtomicUsize,
    }

    impl BlindLookups {
        fn new() -> Self {
            Self {
                inner: InMemoryCredentialStore::new(),
                email_lookups: AtomicUsize::new(0),
                username_lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CredentialStore for BlindLookups {
        async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
            self.inner.create(account).await
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<Account>, StoreError> {
            self.email_lookups.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn find_by_username(&self, _username: &str) -> Result<Option<Account>, StoreError> {
            self.username_lookups.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    /// Store that never answers
    struct Stalled;

    #[async_trait]
    impl CredentialStore for Stalled {
        async fn create(&self, _account: NewAccount) -> Result<Account, StoreError> {
            std::future::pending().await
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<Account>, StoreError> {
            std::future::pending().await
        }

        async fn find_by_username(&self, _username: &str) -> Result<Option<Account>, StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_register_success() {
        let (service, store, _) = service();

        let account = service
            .register(draft("ada", "Ada@Example.com"))
            .await
            .expect("register");

        assert!(!account.id.0.is_nil());
        assert_eq!(account.email, "ada@example.com");
        assert_eq!(account.role, Role::User);
        assert_ne!(account.password_hash, "longenough1");
        assert!(account.created_at <= OffsetDateTime::now_utc());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_register_conflicts_name_the_field() {
        let (service, _, _) = service();
        service.register(draft("ada", "ada@example.com")).await.unwrap();

        assert!(matches!(
            service.register(draft("ada", "other@example.com")).await,
            Err(AuthError::UsernameTaken)
        ));
        assert!(matches!(
            service.register(draft("other", "ADA@example.com")).await,
            Err(AuthError::EmailAlreadyRegistered)
        ));
    }

    #[tokio::test]
    async fn test_validation_runs_before_store() {
        let store = Arc::new(BlindLookups::new());
        let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
        let service = service_with(store.clone(), clock);

        let err = service.register(draft("ad", "ada@example.com")).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Validation(ValidationError::UsernameTooShort(3))
        ));
        assert_eq!(store.username_lookups.load(Ordering::SeqCst), 0);
        assert_eq!(store.email_lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_insert_duplicate_translates_to_conflict() {
        let store = Arc::new(BlindLookups::new());
        let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
        let service = service_with(store.clone(), clock);

        service.register(draft("ada", "ada@example.com")).await.unwrap();

        assert!(matches!(
            service.register(draft("ada", "second@example.com")).await,
            Err(AuthError::UsernameTaken)
        ));
        assert!(matches!(
            service.register(draft("second", "ada@example.com")).await,
            Err(AuthError::EmailAlreadyRegistered)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration_has_one_winner() {
        let (service, store, _) = service();

        let mut handles = Vec::new();
        for i in 0..16 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .register(draft("racer", &format!("racer{}@example.com", i)))
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.expect("task panicked") {
                Ok(_) => wins += 1,
                Err(AuthError::UsernameTaken) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_self_registration_cannot_request_admin() {
        let (service, store, _) = service();
        let mut d = draft("ada", "ada@example.com");
        d.role = Some(Role::Admin);

        assert!(matches!(service.register(d).await, Err(AuthError::Forbidden)));
        assert!(store.is_empty());

        let mut d = draft("mod", "mod@example.com");
        d.role = Some(Role::Moderator);
        assert_eq!(service.register(d).await.unwrap().role, Role::Moderator);
    }

    #[tokio::test]
    async fn test_login_by_email_and_username() {
        let (service, _, _) = service();
        service.register(draft("ada", "ada@example.com")).await.unwrap();

        let (profile, token) = service.login("ADA@example.com", "longenough1").await.unwrap();
        assert_eq!(profile.username, "ada");
        let claims = service.tokens().verify(&token).unwrap();
        assert_eq!(claims.sub, profile.id);
        assert_eq!(claims.role, Role::User);

        let (by_name, _) = service.login("  ada ", "longenough1").await.unwrap();
        assert_eq!(by_name.id, profile.id);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (service, _, _) = service();
        service.register(draft("ada", "ada@example.com")).await.unwrap();

        let unknown = service.login("ghost@example.com", "longenough1").await.unwrap_err();
        let wrong = service.login("ada@example.com", "wrong").await.unwrap_err();
        let empty = service.login("", "").await.unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(empty, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_login_email_miss_falls_back_to_username_once() {
        let store = Arc::new(BlindLookups::new());
        let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
        let service = service_with(store.clone(), clock);

        let _ = service.login("plainname", "longenough1").await;
        assert_eq!(store.email_lookups.load(Ordering::SeqCst), 0);
        assert_eq!(store.username_lookups.load(Ordering::SeqCst), 1);

        let _ = service.login("odd@name", "longenough1").await;
        assert_eq!(store.email_lookups.load(Ordering::SeqCst), 1);
        assert_eq!(store.username_lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_login_email_hit_skips_username_lookup() {
        let (service, _, _) = service();
        service.register(draft("ada", "ada@example.com")).await.unwrap();

        // An account whose *username* looks like the first account's email
        let mut tricky = draft("ada@example.com", "tricky@example.com");
        tricky.password = "otherpassword".to_string();
        service.register(tricky).await.unwrap();

        // Email path resolves first, so only the first account's password works
        assert!(service.login("ada@example.com", "longenough1").await.is_ok());
        assert!(matches!(
            service.login("ada@example.com", "otherpassword").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_token_expires_after_horizon() {
        let (service, _, clock) = service();
        service.register(draft("ada", "ada@example.com")).await.unwrap();
        let (_, token) = service.login("ada", "longenough1").await.unwrap();

        clock.advance(time::Duration::hours(23));
        assert!(service.tokens().verify(&token).is_ok());

        clock.advance(time::Duration::hours(1));
        assert!(matches!(
            service.tokens().verify(&token),
            Err(TokenError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_register_admin_requires_admin() {
        let (service, store, _) = service();

        for role in [Role::User, Role::Moderator, Role::Bot] {
            // Even invalid drafts are refused on authorization first
            assert!(matches!(
                service.register_admin(AccountDraft::default(), role).await,
                Err(AuthError::Forbidden)
            ));
        }
        assert!(store.is_empty());

        let mut d = draft("root", "root@example.com");
        d.role = Some(Role::User);
        let admin = service.register_admin(d, Role::Admin).await.unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_register_admin_shares_uniqueness() {
        let (service, _, _) = service();
        service.register(draft("ada", "ada@example.com")).await.unwrap();

        assert!(matches!(
            service
                .register_admin(draft("ada", "x@example.com"), Role::Admin)
                .await,
            Err(AuthError::UsernameTaken)
        ));
        assert!(matches!(
            service
                .register_admin(draft("root", "x"), Role::Admin)
                .await,
            Err(AuthError::Validation(ValidationError::InvalidEmail))
        ));
    }

    #[tokio::test]
    async fn test_ensure_bot_account_is_idempotent() {
        let (service, store, _) = service();
        let bot = BotIdentity::default();

        let first = service.ensure_bot_account(&bot).await.unwrap();
        let second = service.ensure_bot_account(&bot).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.role, Role::Bot);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_store_timeout_is_internal_error() {
        let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
        let service = service_with(Arc::new(Stalled), clock)
            .with_store_timeout(Duration::from_millis(20));

        assert!(matches!(
            service.register(draft("ada", "ada@example.com")).await,
            Err(AuthError::Internal(_))
        ));
        assert!(matches!(
            service.login("ada", "longenough1").await,
            Err(AuthError::Internal(_))
        ));
    }
}
