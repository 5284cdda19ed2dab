//! Lifecycle run — the core data model for one user's workflow instance.

use chrono::{DateTime, Utc};
use driftmail_core::types::{ActivityState, SignupPayload};
use serde::{Deserialize, Serialize};

/// Days the run sleeps after the welcome email.
pub const INITIAL_SLEEP_DAYS: i64 = 3;
/// Days the run sleeps between loop iterations.
pub const LOOP_SLEEP_DAYS: i64 = 30;

/// Checkpoint key for the welcome step.
pub const STEP_NEW_SIGNUP: &str = "new-signup";

/// Checkpoint key for the activity check of loop iteration `n`.
pub fn check_step_key(iteration: u32) -> String {
    format!("check-user-state#{iteration}")
}

/// Checkpoint key for the nudge email of loop iteration `n`.
pub fn send_step_key(state: ActivityState, iteration: u32) -> String {
    format!("send-email-{}#{iteration}", state.as_db_str())
}

/// One durable execution instance of the lifecycle notifier, scoped to a
/// single user and keyed by their email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleRun {
    /// Unique run ID.
    pub id: String,
    /// The user's email — also the run's natural key.
    pub email: String,
    /// Full name, used to personalize every email.
    pub full_name: String,
    /// Current state-machine position.
    pub state: RunState,
    /// Completed loop iterations.
    pub iteration: u32,
    /// When the run should next be driven. `None` only for runs that will
    /// never be driven again.
    pub next_wake: Option<DateTime<Utc>>,
    /// Consecutive failures of the current step.
    pub attempts: u32,
    /// Last step error, kept for operators.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Explicit states of the lifecycle machine. The workflow has no natural
/// exit: `Terminated` is never entered by the machine itself, only through
/// the explicit terminate operation. `Halted` marks a permanent step
/// failure after retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created; welcome email not yet recorded.
    Signup,
    /// Welcome email checkpointed; initial delay not yet scheduled.
    WelcomeSent,
    /// Suspended until `next_wake`.
    Sleeping,
    /// Classifying the user's recent activity.
    Checking,
    /// Sending the state-dependent nudge email.
    Notifying,
    /// Explicitly stopped. Never entered by the workflow itself.
    Terminated,
    /// A step failed permanently; the run will not be driven again.
    Halted,
}

impl RunState {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::WelcomeSent => "welcome_sent",
            Self::Sleeping => "sleeping",
            Self::Checking => "checking",
            Self::Notifying => "notifying",
            Self::Terminated => "terminated",
            Self::Halted => "halted",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "welcome_sent" => Self::WelcomeSent,
            "sleeping" => Self::Sleeping,
            "checking" => Self::Checking,
            "notifying" => Self::Notifying,
            "terminated" => Self::Terminated,
            "halted" => Self::Halted,
            _ => Self::Signup,
        }
    }

    /// Whether the engine should ever drive this run again.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Terminated | Self::Halted)
    }
}

impl LifecycleRun {
    /// Create a fresh run for a signup, due immediately.
    pub fn new(payload: &SignupPayload, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: payload.email.clone(),
            full_name: payload.full_name.clone(),
            state: RunState::Signup,
            iteration: 0,
            next_wake: Some(now),
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the run is due for driving at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state.is_live() && self.next_wake.is_some_and(|wake| wake <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftmail_core::types::ActivityState;

    #[test]
    fn step_keys_are_stable_per_iteration() {
        assert_eq!(check_step_key(0), "check-user-state#0");
        assert_eq!(check_step_key(7), "check-user-state#7");
        assert_eq!(
            send_step_key(ActivityState::NonActive, 2),
            "send-email-non-active#2"
        );
        assert_eq!(send_step_key(ActivityState::Active, 2), "send-email-active#2");
    }

    #[test]
    fn state_db_strings_round_trip() {
        for state in [
            RunState::Signup,
            RunState::WelcomeSent,
            RunState::Sleeping,
            RunState::Checking,
            RunState::Notifying,
            RunState::Terminated,
            RunState::Halted,
        ] {
            assert_eq!(RunState::from_db_str(state.as_db_str()), state);
        }
    }

    #[test]
    fn new_run_is_due_immediately() {
        let now = Utc::now();
        let run = LifecycleRun::new(
            &SignupPayload {
                email: "a@x.com".into(),
                full_name: "Ana".into(),
            },
            now,
        );
        assert!(run.is_due(now));
        assert_eq!(run.state, RunState::Signup);
        assert_eq!(run.iteration, 0);
    }

    #[test]
    fn dead_runs_are_never_due() {
        let now = Utc::now();
        let mut run = LifecycleRun::new(
            &SignupPayload {
                email: "a@x.com".into(),
                full_name: "Ana".into(),
            },
            now,
        );
        run.state = RunState::Halted;
        assert!(!run.is_due(now));
        run.state = RunState::Terminated;
        assert!(!run.is_due(now));
    }
}
