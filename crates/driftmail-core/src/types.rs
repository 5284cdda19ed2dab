//! Shared wire and domain types.

use serde::{Deserialize, Serialize};

/// Payload delivered once per signup by the account-creation flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupPayload {
    pub email: String,
    pub full_name: String,
}

/// Derived two-valued classification of a user's recent engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityState {
    Active,
    NonActive,
}

impl ActivityState {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::NonActive => "non-active",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            _ => Self::NonActive,
        }
    }
}
