//! Common types used across QuillHub

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::DomainError;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Account ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AccountId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Platform role carried by every account and every session token.
///
/// The set is closed: anything that does not parse into one of these
/// variants is rejected at the boundary that produced it (token decoding,
/// request deserialization, row decoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Moderator,
    Bot,
}

impl Default for Role {
    fn default() -> Self {
        Self::User
    }
}

impl Role {
    /// The privileged role allowed to create other privileged accounts
    pub const PRIVILEGED: Role = Role::Admin;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Bot => "bot",
        }
    }

    pub fn is_privileged(&self) -> bool {
        *self == Self::PRIVILEGED
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "bot" => Ok(Self::Bot),
            _ => Err(DomainError::UnknownRole(s.to_string())),
        }
    }
}

// =============================================================================
// Models
// =============================================================================

/// Stored account record
///
/// Deliberately not `Serialize`: the only external form is [`AccountProfile`].
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: OffsetDateTime,
}

impl Account {
    /// Drop the password hash, keeping the fields safe to hand to a client
    pub fn into_profile(self) -> AccountProfile {
        AccountProfile {
            id: self.id,
            name: self.name,
            username: self.username,
            email: self.email,
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Sanitized account projection returned by every response path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: AccountId,
    pub name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Account> for AccountProfile {
    fn from(account: Account) -> Self {
        account.into_profile()
    }
}

/// Account about to be inserted; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}
