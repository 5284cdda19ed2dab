//! Trait seams for the engine's external collaborators.
//!
//! The workflow takes these as injected dependencies rather than reaching
//! for process-wide singletons, so tests can substitute fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Outbound email delivery. `message` is pre-rendered HTML.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &str, subject: &str, message: &str) -> Result<()>;
}

/// Read-only view of the platform's user datastore.
pub trait ActivityStore: Send + Sync {
    /// Last-activity timestamp for `email`, or `None` if no record exists.
    fn last_activity(&self, email: &str) -> Result<Option<DateTime<Utc>>>;
}
