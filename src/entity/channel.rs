use super::{STATUS_DISABLED, STATUS_ENABLED, STATUSES, User, check_one_of, violation};
use serde_json::{Value, json};
use tikilive_core::FieldErrors;

pub const PUBLISHED: &str = "published";
pub const UNPUBLISHED: &str = "unpublished";
pub const PUBLISHED_STATES: [&str; 2] = [PUBLISHED, UNPUBLISHED];

/// Longest accepted channel name, in characters
pub const NAME_MAX_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: u64,
    /// Owner
    pub user_id: u64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub status: String,
    pub published: String,
    pub created: u64,
}

impl Channel {
    pub fn new(user_id: u64, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: 0,
            user_id,
            slug: slugify(&name),
            name,
            description: String::new(),
            status: STATUS_ENABLED.to_string(),
            published: PUBLISHED.to_string(),
            created: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_published(mut self, published: impl Into<String>) -> Self {
        self.published = published.into();
        self
    }

    /// Change the name; the slug follows it.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.slug = slugify(&self.name);
    }

    pub fn is_enabled(&self) -> bool {
        self.status == STATUS_ENABLED
    }

    pub fn is_disabled(&self) -> bool {
        self.status == STATUS_DISABLED
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if self.name.trim().is_empty() {
            violation(&mut errors, "name", "The channel name is required.");
        } else if self.name.chars().count() > NAME_MAX_LENGTH {
            violation(
                &mut errors,
                "name",
                format!("The channel name cannot be longer than {} characters.", NAME_MAX_LENGTH),
            );
        }

        check_one_of(&mut errors, "status", &self.status, &STATUSES);
        check_one_of(&mut errors, "published", &self.published, &PUBLISHED_STATES);

        errors
    }

    /// Listing shape: `{id, name, slug, user}`
    pub fn summary(&self, owner: Option<&User>) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "slug": self.slug,
            "user": owner.map(User::summary),
        })
    }

    /// Detail shape: the summary plus description and creation time
    pub fn to_value(&self, owner: Option<&User>) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "slug": self.slug,
            "description": self.description,
            "created": self.created,
            "user": owner.map(User::summary),
        })
    }
}

/// Lowercase ASCII words joined by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
