use super::{STATUS_DISABLED, STATUS_ENABLED, STATUSES, check_one_of, violation};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use tikilive_core::FieldErrors;

static USERNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,32}$").unwrap());

/// Serializes as the detail shape `{id, username, email, status, created}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub status: String,
    /// Unix timestamp, set by the store on insert
    pub created: u64,
}

impl User {
    /// A user not stored yet; `id` and `created` are assigned on insert.
    pub fn new(username: impl Into<String>, email: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: 0,
            username: username.into(),
            email: email.into(),
            status: status.into(),
            created: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == STATUS_ENABLED
    }

    pub fn is_disabled(&self) -> bool {
        self.status == STATUS_DISABLED
    }

    /// Field rules that need no other records. Username uniqueness is the
    /// store's check.
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if self.username.is_empty() {
            violation(&mut errors, "username", "The username is required.");
        } else if !USERNAME.is_match(&self.username) {
            violation(
                &mut errors,
                "username",
                "The username must have 3 to 32 letters, digits or underscores.",
            );
        }

        if self.email.is_empty() {
            violation(&mut errors, "email", "The email address is required.");
        } else if !self.email.contains('@') {
            violation(&mut errors, "email", "The email address is not valid.");
        }

        check_one_of(&mut errors, "status", &self.status, &STATUSES);

        errors
    }

    /// `{id, username}`, the shape used in listings and as a channel owner
    pub fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
        })
    }
}
