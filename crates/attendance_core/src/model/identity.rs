//! Identity domain model.
//!
//! # Responsibility
//! - Define the user entity every profile and record refers back to.
//! - Validate profile fields before persistence.
//!
//! # Invariants
//! - `id` is stable and never reused for another identity.
//! - `username` is unique across all identities (enforced by storage).
//! - `role` is exactly one of administrator or participant.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

const USERNAME_MAX_CHARS: usize = 150;
const NAME_MAX_CHARS: usize = 100;

/// Stable identifier for identities and the role profiles they own.
pub type IdentityId = Uuid;

/// Authorization role carried by every identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full read/write access over records and profiles.
    Admin,
    /// Read-only access to own records and profile.
    Participant,
}

impl Role {
    /// Stable string id used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Participant => "participant",
        }
    }

    /// Parses a storage or command-line role value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "admin" => Some(Self::Admin),
            "participant" => Some(Self::Participant),
            _ => None,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System user with a role tag and profile fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: IdentityId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    /// Login capability; independent of participant enrollment.
    pub is_active: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl Identity {
    /// Builds an active identity with a generated id.
    ///
    /// Timestamps start at zero and are stamped by the repository on insert.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            role,
            is_active: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// `"<first> <last>"`, trimmed.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Validates field shapes; uniqueness is left to storage.
    pub fn validate(&self) -> Result<(), IdentityValidationError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(IdentityValidationError::EmptyField("username"));
        }
        if username.chars().count() > USERNAME_MAX_CHARS {
            return Err(IdentityValidationError::TooLong {
                field: "username",
                max_chars: USERNAME_MAX_CHARS,
            });
        }
        if !USERNAME_RE.is_match(username) {
            return Err(IdentityValidationError::InvalidUsername(username.to_string()));
        }

        if self.email.trim().is_empty() {
            return Err(IdentityValidationError::EmptyField("email"));
        }
        if !EMAIL_RE.is_match(self.email.trim()) {
            return Err(IdentityValidationError::InvalidEmail(self.email.clone()));
        }

        for (field, value) in [
            ("firstName", self.first_name.as_str()),
            ("lastName", self.last_name.as_str()),
        ] {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(IdentityValidationError::EmptyField(field));
            }
            if trimmed.chars().count() > NAME_MAX_CHARS {
                return Err(IdentityValidationError::TooLong {
                    field,
                    max_chars: NAME_MAX_CHARS,
                });
            }
        }

        Ok(())
    }
}

/// Field-level identity validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityValidationError {
    EmptyField(&'static str),
    TooLong {
        field: &'static str,
        max_chars: usize,
    },
    InvalidUsername(String),
    InvalidEmail(String),
    /// The identity already owns a profile; its role can no longer change.
    RoleLocked { current: Role, requested: Role },
    /// A profile was requested for an identity carrying a different role.
    RoleMismatch { expected: Role, actual: Role },
}

impl IdentityValidationError {
    /// Caller-facing field name the failure refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyField(field) | Self::TooLong { field, .. } => field,
            Self::InvalidUsername(_) => "username",
            Self::InvalidEmail(_) => "email",
            Self::RoleLocked { .. } | Self::RoleMismatch { .. } => "role",
        }
    }
}

impl Display for IdentityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::TooLong { field, max_chars } => {
                write!(f, "{field} must be at most {max_chars} characters")
            }
            Self::InvalidUsername(value) => write!(
                f,
                "username `{value}` may only contain letters, digits and @/./+/-/_"
            ),
            Self::InvalidEmail(value) => write!(f, "email `{value}` is not a valid address"),
            Self::RoleLocked { current, requested } => write!(
                f,
                "role cannot change from {current} to {requested} once a profile exists"
            ),
            Self::RoleMismatch { expected, actual } => write!(
                f,
                "profile requires role {expected}, identity has role {actual}"
            ),
        }
    }
}

impl Error for IdentityValidationError {}

#[cfg(test)]
mod tests {
    use super::{Identity, IdentityValidationError, Role};

    fn sample() -> Identity {
        Identity::new("m.rossi", "mario.rossi@example.com", "Mario", "Rossi", Role::Admin)
    }

    #[test]
    fn valid_identity_passes() {
        sample().validate().expect("sample identity should be valid");
        assert_eq!(sample().full_name(), "Mario Rossi");
    }

    #[test]
    fn rejects_username_with_spaces() {
        let mut identity = sample();
        identity.username = "mario rossi".to_string();
        let err = identity.validate().expect_err("space must be rejected");
        assert!(matches!(err, IdentityValidationError::InvalidUsername(_)));
        assert_eq!(err.field(), "username");
    }

    #[test]
    fn rejects_malformed_email_and_blank_names() {
        let mut identity = sample();
        identity.email = "not-an-email".to_string();
        assert_eq!(identity.validate().unwrap_err().field(), "email");

        let mut identity = sample();
        identity.last_name = "   ".to_string();
        assert_eq!(
            identity.validate().unwrap_err(),
            IdentityValidationError::EmptyField("lastName")
        );
    }

    #[test]
    fn role_roundtrips_through_storage_strings() {
        for role in [Role::Admin, Role::Participant] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("partecipante"), None);
    }
}
