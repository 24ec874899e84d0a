//! Shared application state

use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use crate::auth::InMemoryCredentialStore;
use crate::auth::{
    AuthError, AuthService, AuthState, CredentialStore, PasswordHasher, RegistrationPolicy,
    SystemClock, TokenCodec,
};
use crate::config::Config;

/// State handed to every handler; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth_service: AuthService,
    pub store: Arc<dyn CredentialStore>,
    pub tokens: TokenCodec,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn CredentialStore>, auth_service: AuthService) -> Self {
        let tokens = auth_service.tokens().clone();
        Self {
            config: Arc::new(config),
            auth_service,
            store,
            tokens,
        }
    }

    /// State for the authentication middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            tokens: self.tokens.clone(),
        }
    }
}

/// Wire the auth service from configuration
pub fn build_auth_service(
    config: &Config,
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
) -> Result<AuthService, AuthError> {
    let tokens = TokenCodec::with_clock(
        &config.jwt_secret,
        time::Duration::hours(config.jwt_expiry_hours),
        Arc::new(SystemClock),
    )?;

    let service = AuthService::new(
        store,
        hasher,
        tokens,
        RegistrationPolicy::new(config.password_min_length),
    )?
    .with_store_timeout(Duration::from_millis(config.store_timeout_ms));

    Ok(service)
}

#[cfg(test)]
impl AppState {
    /// In-memory state with cheap hashing and no login delay
    pub(crate) fn for_tests() -> Self {
        let config = Config::for_tests();
        let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let hasher = PasswordHasher::insecure_for_tests().unwrap();
        let service = build_auth_service(&config, store.clone(), hasher).unwrap();
        Self::new(config, store, service)
    }
}
