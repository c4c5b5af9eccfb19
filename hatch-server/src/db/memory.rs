//! In-memory user store for tests
//!
//! Sessions work on a private copy and merge on commit, so uncommitted
//! writes are invisible to other sessions. Ids come from a shared counter
//! and are not reused after a rollback, matching a Postgres sequence.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::store::{StoreError, UserSession, UserStore};
use crate::models::{
    EmailAddress, NewUser, Pagination, Sort, SortField, SortOrder, User, UserChanges,
};

const EMAIL_CONSTRAINT: &str = "ix_users_email";

#[derive(Debug)]
struct Shared {
    users: BTreeMap<i64, User>,
    next_id: i64,
    available: bool,
}

#[derive(Debug, Clone)]
pub struct MemoryUserStore {
    shared: Arc<Mutex<Shared>>,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                users: BTreeMap::new(),
                next_id: 1,
                available: true,
            })),
        }
    }

    /// Simulate the database going away (or coming back).
    pub fn set_available(&self, available: bool) {
        lock(&self.shared).available = available;
    }

    /// Committed users in id order.
    pub fn users(&self) -> Vec<User> {
        lock(&self.shared).users.values().cloned().collect()
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("connection refused".to_owned())
}

fn email_taken(users: &BTreeMap<i64, User>, email: &str, except: Option<i64>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn begin(&self) -> Result<Box<dyn UserSession>, StoreError> {
        let shared = lock(&self.shared);
        if !shared.available {
            return Err(unavailable());
        }
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.shared),
            users: shared.users.clone(),
            touched: BTreeSet::new(),
            deleted: BTreeSet::new(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if lock(&self.shared).available {
            Ok(())
        } else {
            Err(unavailable())
        }
    }
}

struct MemorySession {
    shared: Arc<Mutex<Shared>>,
    users: BTreeMap<i64, User>,
    touched: BTreeSet<i64>,
    deleted: BTreeSet<i64>,
}

impl MemorySession {
    fn check_available(&self) -> Result<(), StoreError> {
        if lock(&self.shared).available {
            Ok(())
        } else {
            Err(unavailable())
        }
    }
}

/// Postgres ordering: NULLs sort as larger than any value.
fn compare(a: &User, b: &User, field: SortField) -> Ordering {
    match field {
        SortField::Id => a.id.cmp(&b.id),
        SortField::Email => a.email.cmp(&b.email),
        SortField::Name => match (&a.name, &b.name) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

#[async_trait]
impl UserSession for MemorySession {
    async fn find_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        Ok(self.users.get(&id).cloned())
    }

    async fn find_by_email(&mut self, email: &EmailAddress) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        Ok(self
            .users
            .values()
            .find(|u| u.email == email.as_str())
            .cloned())
    }

    async fn list(&mut self, page: Pagination, sort: Sort) -> Result<(Vec<User>, u64), StoreError> {
        self.check_available()?;
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by(|a, b| {
            let primary = match sort.order {
                SortOrder::Asc => compare(a, b, sort.field),
                SortOrder::Desc => compare(b, a, sort.field),
            };
            primary.then(a.id.cmp(&b.id))
        });

        let items = users
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok((items, self.users.len() as u64))
    }

    async fn insert(&mut self, user: &NewUser) -> Result<User, StoreError> {
        self.check_available()?;
        if email_taken(&self.users, user.email.as_str(), None) {
            return Err(StoreError::UniqueViolation {
                constraint: EMAIL_CONSTRAINT.to_owned(),
            });
        }

        let id = {
            let mut shared = lock(&self.shared);
            let id = shared.next_id;
            shared.next_id += 1;
            id
        };
        let now = Utc::now();
        let created = User {
            id,
            email: user.email.as_str().to_owned(),
            name: user.name.as_ref().map(|n| n.as_str().to_owned()),
            is_active: true,
            is_superuser: user.is_superuser,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(id, created.clone());
        self.touched.insert(id);
        Ok(created)
    }

    async fn update(&mut self, id: i64, changes: &UserChanges) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        if let Some(email) = &changes.email {
            if email_taken(&self.users, email.as_str(), Some(id)) {
                return Err(StoreError::UniqueViolation {
                    constraint: EMAIL_CONSTRAINT.to_owned(),
                });
            }
        }

        let Some(user) = self.users.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply_to(user);
        user.updated_at = Utc::now().max(user.updated_at);
        self.touched.insert(id);
        Ok(Some(user.clone()))
    }

    async fn delete(&mut self, id: i64) -> Result<bool, StoreError> {
        self.check_available()?;
        if self.users.remove(&id).is_none() {
            return Ok(false);
        }
        self.touched.remove(&id);
        self.deleted.insert(id);
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut shared = lock(&self.shared);
        if !shared.available {
            return Err(unavailable());
        }

        let mut merged = shared.users.clone();
        for id in &self.deleted {
            merged.remove(id);
        }
        for id in &self.touched {
            if let Some(user) = self.users.get(id) {
                merged.insert(*id, user.clone());
            }
        }

        // Another session may have committed the same email meanwhile
        let mut seen = HashSet::new();
        if !merged.values().all(|u| seen.insert(u.email.as_str())) {
            return Err(StoreError::UniqueViolation {
                constraint: EMAIL_CONSTRAINT.to_owned(),
            });
        }

        shared.users = merged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
