//! # Driftmail Channels
//! `Mailer` implementations: SMTP delivery via lettre, and an in-memory
//! recorder for tests and dry runs.

pub mod memory;
pub mod smtp;

pub use memory::{MemoryMailer, SentEmail};
pub use smtp::SmtpMailer;
