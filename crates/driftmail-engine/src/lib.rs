//! # Driftmail Engine
//!
//! Durable user-lifecycle notifier. One run per user, created at signup,
//! never finishing on its own: welcome email, three-day sleep, then an
//! unbounded loop of activity checks and nudge emails with thirty-day
//! sleeps in between.
//!
//! ## Design
//! - SQLite persistence — runs and step checkpoints survive restarts
//! - Sleeps are persisted wake times, not blocking waits; a tokio interval
//!   re-enters due runs (processes cannot block for 30 days)
//! - Every step is checkpointed: replay returns the recorded output
//!   instead of re-executing the side effect
//! - Collaborators (`Mailer`, `ActivityStore`) are injected traits
//!
//! ## Architecture
//! ```text
//! Notifier (tokio interval)
//!   └── due runs (next_wake <= now)
//!         Signup ──► welcome email ──► WelcomeSent
//!         WelcomeSent ──► sleep 3 days ──► Sleeping
//!         Sleeping ──► Checking ──► classify activity
//!         Checking ──► Notifying ──► "Are you still there?" (non-active)
//!                                 │  "Welcome back" (active)
//!         Notifying ──► sleep 30 days ──► Sleeping ──► …
//!         Terminated / Halted ──► never driven again
//! ```

pub mod activity;
pub mod classify;
pub mod engine;
pub mod persistence;
pub mod retry;
pub mod run;
pub mod templates;

pub use activity::{MemoryActivityStore, SqliteActivityStore};
pub use classify::classify;
pub use engine::{NotifierEngine, spawn_notifier};
pub use persistence::NotifierDb;
pub use retry::RetryPolicy;
pub use run::{LifecycleRun, RunState};
