//! Domain entities served by the API.
//!
//! Entities validate themselves; stores call [`Channel::validate`] and
//! [`User::validate`] before every write and report the collected
//! violations as a `Validation` error.

pub mod channel;
pub mod user;

pub use channel::Channel;
pub use user::User;

use std::time::{SystemTime, UNIX_EPOCH};
use tikilive_core::FieldErrors;

pub const STATUS_ENABLED: &str = "enabled";
pub const STATUS_DISABLED: &str = "disabled";
pub const STATUSES: [&str; 2] = [STATUS_ENABLED, STATUS_DISABLED];

/// Seconds since the Unix epoch
pub fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

pub(crate) fn violation(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

pub(crate) fn check_one_of(errors: &mut FieldErrors, field: &str, value: &str, allowed: &[&str]) {
    if !allowed.contains(&value) {
        violation(
            errors,
            field,
            format!("The value must be one of: {}.", allowed.join(", ")),
        );
    }
}
