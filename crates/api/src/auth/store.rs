//! Durable account storage consumed by the auth service

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use quillhub_shared::{unique_violation_constraint, Account, AccountId, NewAccount};
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::instrument;

/// Which unique field an insert collided on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Username,
    Email,
}

impl DuplicateField {
    /// Map a Postgres constraint/index name onto the field it guards
    pub fn from_constraint(name: &str) -> Option<Self> {
        if name.contains("username") {
            Some(Self::Username)
        } else if name.contains("email") {
            Some(Self::Email)
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Duplicate {0:?}")]
    Duplicate(DuplicateField),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Account persistence
///
/// Implementations own uniqueness: `create` must fail with
/// [`StoreError::Duplicate`] when the username or (case-insensitive) email
/// already exists, even if a concurrent caller inserted it a moment ago.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert an account, returning it with its assigned id and timestamp
    async fn create(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Look up an account by lower-cased email
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Look up an account by exact username
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    /// Cheap liveness probe for readiness checks
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    match unique_violation_constraint(&err) {
        Some(Some(constraint)) => match DuplicateField::from_constraint(constraint) {
            Some(field) => StoreError::Duplicate(field),
            None => {
                tracing::error!(constraint, "Unique violation on unexpected constraint");
                StoreError::Database(err)
            }
        },
        Some(None) => {
            tracing::error!(error = ?err, "Unique violation without constraint name");
            StoreError::Database(err)
        }
        None => StoreError::Database(err),
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    #[instrument(skip(self, account), fields(username = %account.username), name = "db_create_account")]
    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO users (name, username, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, username, email, password_hash, role, created_at
            "#,
        )
        .bind(&account.name)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)
    }

    #[instrument(skip(self), name = "db_find_account_by_email")]
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, username, email, password_hash, role, created_at
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    #[instrument(skip(self), name = "db_find_account_by_username")]
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, username, email, password_hash, role, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local store with the same uniqueness rules as the SQL schema
///
/// The uniqueness check and the insert happen under one lock, so it is a
/// faithful stand-in for the database constraint in concurrent tests.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    accounts: Mutex<HashMap<AccountId, Account>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, pred: impl Fn(&Account) -> bool) -> Result<Option<Account>, StoreError> {
        let accounts = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("account map poisoned".to_string()))?;
        Ok(accounts.values().find(|a| pred(a)).cloned())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("account map poisoned".to_string()))?;

        if accounts.values().any(|a| a.username == account.username) {
            return Err(StoreError::Duplicate(DuplicateField::Username));
        }
        if accounts
            .values()
            .any(|a| a.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(StoreError::Duplicate(DuplicateField::Email));
        }

        let created = Account {
            id: AccountId::new(),
            name: account.name,
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            created_at: OffsetDateTime::now_utc(),
        };
        accounts.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.find(|a| a.email.eq_ignore_ascii_case(email))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        self.find(|a| a.username == username)
    }
}
