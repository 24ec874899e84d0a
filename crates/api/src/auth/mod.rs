//! Identity subsystem: accounts, credentials, session tokens, and role gates

pub mod error;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;
pub mod store;
pub mod validation;

pub use error::{AuthError, ErrorClass};
pub use jwt::{Claims, Clock, ManualClock, SystemClock, TokenCodec, TokenError};
pub use middleware::{bearer_token, require_auth, require_role, AuthState, RoleAssertion, RoleGate};
pub use password::{PasswordError, PasswordHasher};
pub use service::{AuthService, BotIdentity};
pub use store::{CredentialStore, DuplicateField, InMemoryCredentialStore, PgCredentialStore, StoreError};
pub use validation::{AccountDraft, RegistrationPolicy, ValidationError};
