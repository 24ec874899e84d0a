//! Registration input policy shared by self-signup and admin creation

use quillhub_shared::Role;

use super::password::MAX_PASSWORD_BYTES;

/// Floor for the configurable minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Minimum username length, in characters
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Unvalidated registration input
#[derive(Debug, Clone, Default)]
pub struct AccountDraft {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    /// Requested role; `None` means the default unprivileged role
    pub role: Option<Role>,
}

/// Draft that passed the policy, with text fields normalized
#[derive(Debug, Clone)]
pub struct ValidDraft {
    pub name: String,
    pub username: String,
    /// Trimmed and lower-cased
    pub email: String,
    /// Exactly as submitted; secrets are checked trimmed but never rewritten
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name, username, email, and password are required")]
    MissingFields,
    #[error("username must be at least {0} characters")]
    UsernameTooShort(usize),
    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("password must be at most {0} bytes")]
    PasswordTooLong(usize),
    #[error("invalid email format")]
    InvalidEmail,
}

/// How the role of the created account is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAssignment {
    /// Use the draft's role, or the default role if none was given
    FromDraft,
    /// Ignore the draft and use this role
    Forced(Role),
}

/// Field rules applied, in order, to every account draft
#[derive(Debug, Clone, Copy)]
pub struct RegistrationPolicy {
    min_password_length: usize,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            min_password_length: MIN_PASSWORD_LENGTH,
        }
    }
}

impl RegistrationPolicy {
    /// Policy with a custom minimum password length (never below 6)
    pub fn new(min_password_length: usize) -> Self {
        Self {
            min_password_length: min_password_length.max(MIN_PASSWORD_LENGTH),
        }
    }

    pub fn min_password_length(&self) -> usize {
        self.min_password_length
    }

    /// Normalize and validate a draft; the first failing rule wins
    pub fn validate(
        &self,
        draft: AccountDraft,
        roles: RoleAssignment,
    ) -> Result<ValidDraft, ValidationError> {
        let name = draft.name.trim();
        let username = draft.username.trim();
        let email = draft.email.trim().to_lowercase();
        let password = draft.password.trim();

        if name.is_empty() || username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(ValidationError::MissingFields);
        }
        if username.chars().count() < MIN_USERNAME_LENGTH {
            return Err(ValidationError::UsernameTooShort(MIN_USERNAME_LENGTH));
        }
        if password.chars().count() < self.min_password_length {
            return Err(ValidationError::PasswordTooShort(self.min_password_length));
        }
        if !looks_like_email(&email) {
            return Err(ValidationError::InvalidEmail);
        }
        if draft.password.len() > MAX_PASSWORD_BYTES {
            return Err(ValidationError::PasswordTooLong(MAX_PASSWORD_BYTES));
        }

        let role = match roles {
            RoleAssignment::FromDraft => draft.role.unwrap_or_default(),
            RoleAssignment::Forced(role) => role,
        };

        Ok(ValidDraft {
            name: name.to_string(),
            username: username.to_string(),
            email,
            password: draft.password,
            role,
        })
    }
}

/// Shape check only: something before and after a single `@`
pub fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
