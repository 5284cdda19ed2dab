//! # Driftmail Core
//! Shared foundation: configuration, error type, wire types, and the trait
//! seams (`Mailer`, `ActivityStore`) the engine takes as explicit
//! dependencies.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::DriftmailConfig;
pub use error::{DriftmailError, Result};
pub use traits::{ActivityStore, Mailer};
pub use types::{ActivityState, SignupPayload};
