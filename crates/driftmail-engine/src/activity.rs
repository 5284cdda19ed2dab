//! `ActivityStore` implementations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use driftmail_core::error::Result;
use driftmail_core::traits::ActivityStore;

use crate::persistence::NotifierDb;

/// Reads the platform's `users` table through the notifier database.
pub struct SqliteActivityStore {
    db: Arc<NotifierDb>,
}

impl SqliteActivityStore {
    pub fn new(db: Arc<NotifierDb>) -> Self {
        Self { db }
    }
}

impl ActivityStore for SqliteActivityStore {
    fn last_activity(&self, email: &str) -> Result<Option<DateTime<Utc>>> {
        self.db.user_last_activity(email)
    }
}

/// In-memory activity store for tests and demos.
#[derive(Default)]
pub struct MemoryActivityStore {
    inner: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interaction for `email`.
    pub fn touch(&self, email: &str, at: DateTime<Utc>) {
        self.inner.lock().unwrap().insert(email.to_string(), at);
    }

    /// Drop the record entirely, as if the user never existed.
    pub fn forget(&self, email: &str) {
        self.inner.lock().unwrap().remove(email);
    }
}

impl ActivityStore for MemoryActivityStore {
    fn last_activity(&self, email: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.inner.lock().unwrap().get(email).copied())
    }
}
