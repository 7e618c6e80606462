//! Persistence seams for channels and users.
//!
//! Controllers only see the [`ChannelStore`] and [`UserStore`] traits; the
//! in-memory implementations in [`memory`] back the binary and the tests.

pub mod memory;

pub use memory::{MemoryChannelStore, MemoryUserStore};

use crate::entity::{Channel, User};
use tikilive_core::{Error, Result};

/// Sort order of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Case-insensitive `ASC` / `DESC`; anything else is `InvalidArgument`.
    pub fn parse(value: &str) -> Result<Self> {
        if value.eq_ignore_ascii_case("asc") {
            Ok(Direction::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Ok(Direction::Desc)
        } else {
            Err(Error::invalid_argument(format!(
                "Invalid order direction '{}'. Use ASC or DESC.",
                value
            )))
        }
    }
}

/// One page of an ordered listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a> {
    pub offset: usize,
    pub limit: usize,
    pub order_by: &'a str,
    pub direction: &'a str,
}

pub trait UserStore: Send + Sync {
    fn find_by_id(&self, id: u64) -> Result<Option<User>>;

    /// Enabled users, ordered by `id`, `username` or `created`
    fn find_all_active(&self, page: &Page<'_>) -> Result<Vec<User>>;

    fn count_all_active(&self) -> Result<usize>;

    /// Validate and store a new user, returning its id
    fn insert(&self, user: User) -> Result<u64>;

    fn update(&self, user: &User) -> Result<()>;

    /// Returns whether a user was removed
    fn delete(&self, id: u64) -> Result<bool>;
}

pub trait ChannelStore: Send + Sync {
    fn find_by_id(&self, id: u64) -> Result<Option<Channel>>;

    /// Enabled channels, ordered by `id`, `name` or `created`
    fn find_all_active(&self, page: &Page<'_>) -> Result<Vec<Channel>>;

    fn count_all_active(&self) -> Result<usize>;

    fn insert(&self, channel: Channel) -> Result<u64>;

    fn update(&self, channel: &Channel) -> Result<()>;

    fn delete(&self, id: u64) -> Result<bool>;
}
