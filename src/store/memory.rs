// In-memory stores

use super::{ChannelStore, Direction, Page, UserStore};
use crate::entity::{self, Channel, User, violation};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tikilive_core::{Error, Result};
use tracing::debug;

trait Record: Clone {
    const KIND: &'static str;
    const SORT_FIELDS: &'static [&'static str];

    fn id(&self) -> u64;
    fn assign(&mut self, id: u64, created: u64);
    fn is_active(&self) -> bool;
    fn compare_by(&self, other: &Self, field: &str) -> Ordering;
}

impl Record for User {
    const KIND: &'static str = "User";
    const SORT_FIELDS: &'static [&'static str] = &["id", "username", "created"];

    fn id(&self) -> u64 {
        self.id
    }

    fn assign(&mut self, id: u64, created: u64) {
        self.id = id;
        self.created = created;
    }

    fn is_active(&self) -> bool {
        self.is_enabled()
    }

    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "username" => self.username.cmp(&other.username),
            "created" => self.created.cmp(&other.created),
            _ => Ordering::Equal,
        }
        .then(self.id.cmp(&other.id))
    }
}

impl Record for Channel {
    const KIND: &'static str = "Channel";
    const SORT_FIELDS: &'static [&'static str] = &["id", "name", "created"];

    fn id(&self) -> u64 {
        self.id
    }

    fn assign(&mut self, id: u64, created: u64) {
        self.id = id;
        self.created = created;
    }

    fn is_active(&self) -> bool {
        self.is_enabled()
    }

    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "name" => self.name.cmp(&other.name),
            "created" => self.created.cmp(&other.created),
            _ => Ordering::Equal,
        }
        .then(self.id.cmp(&other.id))
    }
}

struct Table<T> {
    rows: BTreeMap<u64, T>,
    next_id: u64,
}

impl<T: Record> Table<T> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn find(&self, id: u64) -> Option<T> {
        self.rows.get(&id).cloned()
    }

    fn active(&self, page: &Page<'_>) -> Result<Vec<T>> {
        if !T::SORT_FIELDS.contains(&page.order_by) {
            return Err(Error::invalid_argument(format!(
                "Invalid order field '{}'. Use one of: {}.",
                page.order_by,
                T::SORT_FIELDS.join(", ")
            )));
        }
        let direction = Direction::parse(page.direction)?;

        let mut rows: Vec<&T> = self.rows.values().filter(|row| row.is_active()).collect();
        rows.sort_by(|a, b| {
            let ordering = a.compare_by(b, page.order_by);
            match direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        });

        Ok(rows
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }

    fn count_active(&self) -> usize {
        self.rows.values().filter(|row| row.is_active()).count()
    }

    fn insert(&mut self, mut row: T) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        row.assign(id, entity::timestamp());
        self.rows.insert(id, row);
        debug!(kind = T::KIND, id, "Record inserted");
        id
    }

    fn replace(&mut self, row: T) -> Result<()> {
        match self.rows.get_mut(&row.id()) {
            Some(existing) => {
                *existing = row;
                Ok(())
            }
            None => Err(Error::store(format!("{} {} is not stored", T::KIND, row.id()))),
        }
    }

    fn remove(&mut self, id: u64) -> bool {
        let removed = self.rows.remove(&id).is_some();
        if removed {
            debug!(kind = T::KIND, id, "Record deleted");
        }
        removed
    }
}

fn rejected(kind: &str, errors: tikilive_core::FieldErrors) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(format!("{} did not pass validation.", kind), errors))
    }
}

/// Users kept in memory
pub struct MemoryUserStore {
    table: RwLock<Table<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table::new()),
        }
    }

    fn check(table: &Table<User>, user: &User) -> Result<()> {
        let mut errors = user.validate();
        let taken = table
            .rows
            .values()
            .any(|other| other.id != user.id && other.username.eq_ignore_ascii_case(&user.username));
        if taken {
            violation(&mut errors, "username", "The username is already taken.");
        }
        rejected(User::KIND, errors)
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore for MemoryUserStore {
    fn find_by_id(&self, id: u64) -> Result<Option<User>> {
        Ok(self.table.read().find(id))
    }

    fn find_all_active(&self, page: &Page<'_>) -> Result<Vec<User>> {
        self.table.read().active(page)
    }

    fn count_all_active(&self) -> Result<usize> {
        Ok(self.table.read().count_active())
    }

    fn insert(&self, user: User) -> Result<u64> {
        let mut table = self.table.write();
        Self::check(&table, &user)?;
        Ok(table.insert(user))
    }

    fn update(&self, user: &User) -> Result<()> {
        let mut table = self.table.write();
        Self::check(&table, user)?;
        table.replace(user.clone())
    }

    fn delete(&self, id: u64) -> Result<bool> {
        Ok(self.table.write().remove(id))
    }
}

/// Channels kept in memory
pub struct MemoryChannelStore {
    table: RwLock<Table<Channel>>,
}

impl MemoryChannelStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table::new()),
        }
    }
}

impl Default for MemoryChannelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelStore for MemoryChannelStore {
    fn find_by_id(&self, id: u64) -> Result<Option<Channel>> {
        Ok(self.table.read().find(id))
    }

    fn find_all_active(&self, page: &Page<'_>) -> Result<Vec<Channel>> {
        self.table.read().active(page)
    }

    fn count_all_active(&self) -> Result<usize> {
        Ok(self.table.read().count_active())
    }

    fn insert(&self, channel: Channel) -> Result<u64> {
        rejected(Channel::KIND, channel.validate())?;
        Ok(self.table.write().insert(channel))
    }

    fn update(&self, channel: &Channel) -> Result<()> {
        rejected(Channel::KIND, channel.validate())?;
        self.table.write().replace(channel.clone())
    }

    fn delete(&self, id: u64) -> Result<bool> {
        Ok(self.table.write().remove(id))
    }
}
