//! Activity classification — the 3-day/30-day engagement window.

use chrono::{DateTime, Duration, Utc};
use driftmail_core::types::ActivityState;

/// Lower bound of the inactivity window, in days.
pub const ACTIVITY_WINDOW_MIN_DAYS: i64 = 3;
/// Upper bound of the inactivity window, in days.
pub const ACTIVITY_WINDOW_MAX_DAYS: i64 = 30;

/// Classify a user's engagement from their last-activity timestamp.
///
/// No record at all counts as `non-active`. A last activity between 3 and
/// 30 days ago counts as `non-active`. Everything else — including activity
/// older than 30 days — falls through to `active`; that fall-through is the
/// platform's long-standing behavior and is kept as-is.
pub fn classify(last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ActivityState {
    let Some(last) = last_activity else {
        return ActivityState::NonActive;
    };

    let elapsed = now - last;
    if elapsed > Duration::days(ACTIVITY_WINDOW_MIN_DAYS)
        && elapsed <= Duration::days(ACTIVITY_WINDOW_MAX_DAYS)
    {
        ActivityState::NonActive
    } else {
        ActivityState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-08-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn missing_record_is_non_active() {
        assert_eq!(classify(None, now()), ActivityState::NonActive);
    }

    #[test]
    fn recent_activity_is_active() {
        let t = now();
        assert_eq!(classify(Some(t - Duration::hours(1)), t), ActivityState::Active);
        // Exactly three days is still inside the active window.
        assert_eq!(classify(Some(t - Duration::days(3)), t), ActivityState::Active);
    }

    #[test]
    fn stale_activity_is_non_active() {
        let t = now();
        assert_eq!(
            classify(Some(t - Duration::days(3) - Duration::seconds(1)), t),
            ActivityState::NonActive
        );
        assert_eq!(classify(Some(t - Duration::days(10)), t), ActivityState::NonActive);
        // Exactly thirty days is the last non-active moment.
        assert_eq!(classify(Some(t - Duration::days(30)), t), ActivityState::NonActive);
    }

    #[test]
    fn activity_older_than_thirty_days_is_active() {
        // Current behavior: long-idle users fall outside the window and
        // classify as active. Pinned here so any future fix is deliberate.
        let t = now();
        assert_eq!(
            classify(Some(t - Duration::days(30) - Duration::seconds(1)), t),
            ActivityState::Active
        );
        assert_eq!(classify(Some(t - Duration::days(365)), t), ActivityState::Active);
    }
}
