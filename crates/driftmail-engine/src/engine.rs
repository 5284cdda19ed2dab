//! Notifier engine — drives due lifecycle runs through the state machine.
//!
//! A run is driven until it suspends (a persisted wake time), halts, or is
//! terminated. Every side-effecting step goes through the checkpoint guard:
//! if the step already completed, its recorded output is returned and the
//! side effect is not repeated. Email delivery itself remains
//! at-least-once: a crash between a successful send and the checkpoint
//! write can duplicate a send.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use driftmail_core::error::{DriftmailError, Result};
use driftmail_core::traits::{ActivityStore, Mailer};
use driftmail_core::types::{ActivityState, SignupPayload};

use crate::classify::classify;
use crate::persistence::NotifierDb;
use crate::retry::RetryPolicy;
use crate::run::{self, LifecycleRun, RunState};
use crate::templates;

/// Result of the checkpoint guard around one step.
enum StepOutcome {
    /// Step completed now or on a previous attempt; output is the recorded
    /// value.
    Done(String),
    /// Step failed; a retry was scheduled or the run was halted. Stop
    /// driving.
    Suspended,
}

/// The lifecycle notifier engine. Collaborators are injected so tests can
/// substitute fakes.
pub struct NotifierEngine {
    db: Arc<NotifierDb>,
    activity: Arc<dyn ActivityStore>,
    mailer: Arc<dyn Mailer>,
    retry: RetryPolicy,
}

impl NotifierEngine {
    pub fn new(
        db: Arc<NotifierDb>,
        activity: Arc<dyn ActivityStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            db,
            activity,
            mailer,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the default retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn db(&self) -> &Arc<NotifierDb> {
        &self.db
    }

    /// Create a run for a signup. Idempotent per email: a second trigger
    /// for the same address returns the existing run untouched, which is
    /// what keeps the welcome email at exactly one per signup.
    pub fn start_run(
        &self,
        payload: &SignupPayload,
        now: DateTime<Utc>,
    ) -> Result<(LifecycleRun, bool)> {
        if payload.email.is_empty() || !payload.email.contains('@') {
            return Err(DriftmailError::Engine(format!(
                "Invalid signup email: '{}'",
                payload.email
            )));
        }
        let (run, created) = self.db.create_run_if_absent(payload, now)?;
        if created {
            tracing::info!("🚀 Lifecycle run started for {} ({})", run.email, run.id);
        } else {
            tracing::debug!("Run already exists for {}, not duplicating", run.email);
        }
        Ok((run, created))
    }

    /// Explicitly stop a run. The workflow never takes this transition on
    /// its own; it exists so the missing exit is a choice, not an accident.
    pub fn terminate(&self, email: &str, now: DateTime<Utc>) -> Result<bool> {
        let stopped = self.db.terminate_run(email, now)?;
        if stopped {
            tracing::info!("🛑 Lifecycle run terminated for {email}");
        }
        Ok(stopped)
    }

    /// Drive every due run once. Takes `now` explicitly so tests can
    /// advance simulated time; the live loop passes `Utc::now()`.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let due = self.db.due_runs(now)?;
        let mut driven = Vec::new();
        for mut run in due {
            match self.drive_run(&mut run, now).await {
                Ok(()) => driven.push(run.email.clone()),
                // One user's broken run must not stall everyone else's.
                Err(e) => tracing::warn!("⚠️ Run {} failed to advance: {e}", run.id),
            }
        }
        Ok(driven)
    }

    /// Advance one run until it suspends.
    async fn drive_run(&self, run: &mut LifecycleRun, now: DateTime<Utc>) -> Result<()> {
        loop {
            match run.state {
                RunState::Signup => {
                    let (subject, body) = templates::welcome(&run.full_name);
                    let mailer = self.mailer.clone();
                    let email = run.email.clone();
                    let outcome = self
                        .step(run, run::STEP_NEW_SIGNUP, now, async move {
                            mailer.send(&email, &subject, &body).await?;
                            Ok("sent".to_string())
                        })
                        .await?;
                    match outcome {
                        StepOutcome::Done(_) => {
                            tracing::info!("💌 Welcome email recorded for {}", run.email);
                            run.state = RunState::WelcomeSent;
                        }
                        StepOutcome::Suspended => break,
                    }
                }

                RunState::WelcomeSent => {
                    let wake = now + Duration::days(run::INITIAL_SLEEP_DAYS);
                    run.state = RunState::Sleeping;
                    run.next_wake = Some(wake);
                    tracing::info!("😴 {} sleeping until {wake}", run.email);
                    break;
                }

                RunState::Sleeping => match run.next_wake {
                    Some(wake) if wake <= now => run.state = RunState::Checking,
                    _ => break,
                },

                RunState::Checking => {
                    let key = run::check_step_key(run.iteration);
                    let activity = self.activity.clone();
                    let email = run.email.clone();
                    let outcome = self
                        .step(run, &key, now, async move {
                            let last = activity.last_activity(&email)?;
                            Ok(classify(last, now).as_db_str().to_string())
                        })
                        .await?;
                    match outcome {
                        StepOutcome::Done(state) => {
                            tracing::info!(
                                "🔎 {} is {} (iteration {})",
                                run.email,
                                state,
                                run.iteration
                            );
                            run.state = RunState::Notifying;
                        }
                        StepOutcome::Suspended => break,
                    }
                }

                RunState::Notifying => {
                    let check_key = run::check_step_key(run.iteration);
                    let Some(cached) = self.db.checkpoint(&run.id, &check_key)? else {
                        // Resumed into Notifying without a recorded
                        // classification; re-check first.
                        run.state = RunState::Checking;
                        continue;
                    };
                    let activity_state = ActivityState::from_db_str(&cached);
                    let (subject, body) = match activity_state {
                        ActivityState::NonActive => templates::re_engagement(&run.full_name),
                        ActivityState::Active => templates::welcome_back(&run.full_name),
                    };
                    let send_key = run::send_step_key(activity_state, run.iteration);
                    let mailer = self.mailer.clone();
                    let email = run.email.clone();
                    let outcome = self
                        .step(run, &send_key, now, async move {
                            mailer.send(&email, &subject, &body).await?;
                            Ok("sent".to_string())
                        })
                        .await?;
                    match outcome {
                        StepOutcome::Done(_) => {
                            let wake = now + Duration::days(run::LOOP_SLEEP_DAYS);
                            tracing::info!(
                                "📮 Nudge sent to {} (iteration {}), sleeping until {wake}",
                                run.email,
                                run.iteration
                            );
                            run.iteration += 1;
                            run.state = RunState::Sleeping;
                            run.next_wake = Some(wake);
                            break;
                        }
                        StepOutcome::Suspended => break,
                    }
                }

                RunState::Terminated | RunState::Halted => break,
            }
        }

        run.updated_at = now;
        self.db.save_run(run)
    }

    /// Checkpoint guard: replay a completed step from its recorded output,
    /// execute it otherwise. Failures schedule a retry per the engine
    /// policy or halt the run once attempts are exhausted.
    async fn step<Fut>(
        &self,
        run: &mut LifecycleRun,
        step_key: &str,
        now: DateTime<Utc>,
        action: Fut,
    ) -> Result<StepOutcome>
    where
        Fut: Future<Output = Result<String>>,
    {
        if let Some(output) = self.db.checkpoint(&run.id, step_key)? {
            tracing::debug!("↩️ Replaying checkpoint '{step_key}' for {}", run.email);
            return Ok(StepOutcome::Done(output));
        }

        match action.await {
            Ok(output) => {
                self.db.record_checkpoint(&run.id, step_key, &output, now)?;
                run.attempts = 0;
                run.last_error = None;
                Ok(StepOutcome::Done(output))
            }
            Err(e) => {
                run.attempts += 1;
                run.last_error = Some(e.to_string());
                match self.retry.next_retry_at(run.attempts, now) {
                    Some(at) => {
                        tracing::warn!(
                            "⚠️ Step '{step_key}' failed for {} (attempt {}), retrying at {at}: {e}",
                            run.email,
                            run.attempts
                        );
                        run.next_wake = Some(at);
                    }
                    None => {
                        tracing::error!(
                            "🛑 Step '{step_key}' failed permanently for {}: {e}",
                            run.email
                        );
                        run.state = RunState::Halted;
                        run.next_wake = None;
                    }
                }
                Ok(StepOutcome::Suspended)
            }
        }
    }
}

/// Spawn the notifier loop as a background tokio task.
pub async fn spawn_notifier(engine: Arc<NotifierEngine>, tick_secs: u64) {
    tracing::info!("⏰ Lifecycle notifier started (check every {tick_secs}s)");

    let mut interval = tokio::time::interval(StdDuration::from_secs(tick_secs));
    loop {
        interval.tick().await;
        match engine.tick(Utc::now()).await {
            Ok(driven) if !driven.is_empty() => {
                tracing::info!("📬 Drove {} due run(s)", driven.len());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("⚠️ Notifier tick failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::MemoryActivityStore;
    use async_trait::async_trait;
    use driftmail_channels::MemoryMailer;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn payload() -> SignupPayload {
        SignupPayload {
            email: "a@x.com".into(),
            full_name: "Ana".into(),
        }
    }

    fn engine_with(
        mailer: Arc<dyn Mailer>,
    ) -> (NotifierEngine, Arc<NotifierDb>, Arc<MemoryActivityStore>) {
        let db = Arc::new(NotifierDb::open_in_memory().unwrap());
        let activity = Arc::new(MemoryActivityStore::new());
        let engine = NotifierEngine::new(db.clone(), activity.clone(), mailer);
        (engine, db, activity)
    }

    /// Mailer that always fails, for retry tests.
    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: &str, _subject: &str, _message: &str) -> Result<()> {
            Err(DriftmailError::Mail("smtp down".into()))
        }
    }

    #[tokio::test]
    async fn welcome_is_recorded_exactly_once_across_replays() {
        let mailer = Arc::new(MemoryMailer::new());
        let (engine, db, _) = engine_with(mailer.clone());
        let t0 = ts("2026-01-01T00:00:00Z");

        engine.start_run(&payload(), t0).unwrap();
        engine.tick(t0).await.unwrap();
        assert_eq!(mailer.count(), 1);
        assert_eq!(mailer.sent()[0].subject, "Welcome to the platform");

        // Simulate a crash that lost the state transition but kept the
        // checkpoint: the run is rewound to Signup and driven again.
        let mut run = db.get_run_by_email("a@x.com").unwrap().unwrap();
        run.state = RunState::Signup;
        run.next_wake = Some(t0);
        db.save_run(&run).unwrap();

        engine.tick(t0).await.unwrap();
        assert_eq!(mailer.count(), 1);

        let run = db.get_run_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(run.state, RunState::Sleeping);
        assert_eq!(run.next_wake, Some(t0 + Duration::days(3)));
    }

    #[tokio::test]
    async fn duplicate_signup_trigger_does_not_duplicate_the_run() {
        let mailer = Arc::new(MemoryMailer::new());
        let (engine, _, _) = engine_with(mailer.clone());
        let t0 = ts("2026-01-01T00:00:00Z");

        let (first, created) = engine.start_run(&payload(), t0).unwrap();
        assert!(created);
        let (second, created) = engine.start_run(&payload(), t0).unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);

        engine.tick(t0).await.unwrap();
        assert_eq!(mailer.count(), 1);
    }

    #[tokio::test]
    async fn ten_day_idle_user_gets_reengagement_not_welcome_back() {
        let mailer = Arc::new(MemoryMailer::new());
        let (engine, db, activity) = engine_with(mailer.clone());
        let t0 = ts("2026-01-01T00:00:00Z");

        engine.start_run(&payload(), t0).unwrap();
        engine.tick(t0).await.unwrap();

        let t1 = t0 + Duration::days(3);
        activity.touch("a@x.com", t1 - Duration::days(10));
        engine.tick(t1).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].subject, "Are you still there?");
        assert!(sent[1].message.contains("We Miss You, Ana!"));

        let run = db.get_run_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(run.iteration, 1);
        assert_eq!(run.state, RunState::Sleeping);
        assert_eq!(run.next_wake, Some(t1 + Duration::days(30)));
    }

    #[tokio::test]
    async fn recently_active_user_gets_welcome_back() {
        let mailer = Arc::new(MemoryMailer::new());
        let (engine, _, activity) = engine_with(mailer.clone());
        let t0 = ts("2026-01-01T00:00:00Z");

        engine.start_run(&payload(), t0).unwrap();
        engine.tick(t0).await.unwrap();

        let t1 = t0 + Duration::days(3);
        activity.touch("a@x.com", t1 - Duration::hours(1));
        engine.tick(t1).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].subject, "Welcome back to the platform");
    }

    #[tokio::test]
    async fn missing_user_record_takes_the_non_active_path() {
        let mailer = Arc::new(MemoryMailer::new());
        let (engine, _, activity) = engine_with(mailer.clone());
        let t0 = ts("2026-01-01T00:00:00Z");

        engine.start_run(&payload(), t0).unwrap();
        engine.tick(t0).await.unwrap();

        // The record vanishes entirely before the first check (e.g. the
        // platform deleted the account row).
        activity.touch("a@x.com", t0);
        activity.forget("a@x.com");
        engine.tick(t0 + Duration::days(3)).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].subject, "Are you still there?");
    }

    #[tokio::test]
    async fn loop_sends_exactly_one_email_per_iteration() {
        let mailer = Arc::new(MemoryMailer::new());
        let (engine, db, activity) = engine_with(mailer.clone());
        let t0 = ts("2026-01-01T00:00:00Z");

        engine.start_run(&payload(), t0).unwrap();
        engine.tick(t0).await.unwrap();

        // Four iterations of alternating activity: fresh, stale, fresh,
        // stale.
        let mut t = t0 + Duration::days(3);
        for i in 0..4u32 {
            if i % 2 == 0 {
                activity.touch("a@x.com", t - Duration::hours(1));
            } else {
                activity.touch("a@x.com", t - Duration::days(10));
            }
            engine.tick(t).await.unwrap();
            t += Duration::days(30);
        }

        let subjects: Vec<String> = mailer.sent().iter().map(|m| m.subject.clone()).collect();
        assert_eq!(
            subjects,
            vec![
                "Welcome to the platform",
                "Welcome back to the platform",
                "Are you still there?",
                "Welcome back to the platform",
                "Are you still there?",
            ]
        );

        let run = db.get_run_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(run.iteration, 4);
        // One welcome + one check + one send per iteration.
        assert_eq!(db.checkpoint_count(&run.id).unwrap(), 9);
    }

    #[tokio::test]
    async fn failing_step_retries_then_halts() {
        let (engine, db, _) = engine_with(Arc::new(FailingMailer));
        let engine = engine.with_retry(RetryPolicy::fixed_with(60_000, 2));
        let t0 = ts("2026-01-01T00:00:00Z");

        engine.start_run(&payload(), t0).unwrap();

        // First failure schedules a retry one minute out.
        engine.tick(t0).await.unwrap();
        let run = db.get_run_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(run.state, RunState::Signup);
        assert_eq!(run.attempts, 1);
        assert_eq!(run.next_wake, Some(t0 + Duration::seconds(60)));
        assert!(run.last_error.as_deref().unwrap().contains("smtp down"));

        // Second failure exhausts the policy and halts the run.
        engine.tick(t0 + Duration::seconds(61)).await.unwrap();
        let run = db.get_run_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(run.state, RunState::Halted);
        assert_eq!(run.next_wake, None);
        assert!(db.due_runs(t0 + Duration::days(365)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn terminated_run_is_never_driven_again() {
        let mailer = Arc::new(MemoryMailer::new());
        let (engine, _, _) = engine_with(mailer.clone());
        let t0 = ts("2026-01-01T00:00:00Z");

        engine.start_run(&payload(), t0).unwrap();
        engine.tick(t0).await.unwrap();
        assert!(engine.terminate("a@x.com", t0).unwrap());

        engine.tick(t0 + Duration::days(90)).await.unwrap();
        assert_eq!(mailer.count(), 1);
    }

    #[tokio::test]
    async fn rejects_invalid_signup_email() {
        let mailer = Arc::new(MemoryMailer::new());
        let (engine, _, _) = engine_with(mailer);
        let bad = SignupPayload {
            email: "not-an-email".into(),
            full_name: "Ana".into(),
        };
        assert!(engine.start_run(&bad, Utc::now()).is_err());
    }
}
