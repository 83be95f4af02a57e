//! Verification state machine.
//!
//! Per-user lifecycle: NONE -> ACTIVE -> VERIFIED / EXPIRED / EXHAUSTED.
//! A wrong answer under the cap stays ACTIVE with the window slid forward;
//! the captcha itself never changes within one session.
//!
//! All session mutations happen synchronously relative to the triggering
//! event, before any outward I/O. Terminal outcomes are returned to the
//! caller, which invokes the outcome executor exactly once; the machine
//! itself only touches the store, the catalog, and the staff log.

use std::sync::Arc;
use std::time::Duration;

use gatekeeper_common::{Notice, SessionView, UserId};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::catalog::ChallengeCatalog;
use super::store::{SessionStore, VerificationSession};
use crate::logsink::EventLog;

/// Result of a start-verification action
#[derive(Debug)]
pub enum StartOutcome {
    /// User already holds the verified role; nothing created or touched
    AlreadyVerified,

    /// A session is still live; same image, remaining budget shown
    Resumed(SessionView),

    /// Fresh session created and timer armed
    Challenge(SessionView),

    /// Empty catalog: configuration error, no session started
    Unconfigured,
}

/// Result of an answer submission
#[derive(Debug)]
pub enum AnswerOutcome {
    /// No live session, or the window had already elapsed
    Expired,

    /// Correct answer; session cleared. Caller must run the grant path
    /// exactly once.
    Verified,

    /// Wrong answer under the cap; window slid, same captcha persists
    Retry(SessionView),

    /// Attempt cap reached; session cleared. Caller must run the removal
    /// path exactly once.
    Exhausted,
}

/// The verification state machine
pub struct Verifier {
    store: SessionStore,
    catalog: ChallengeCatalog,
    window: Duration,
    max_attempts: u32,
    log: Arc<EventLog>,
}

impl Verifier {
    pub fn new(
        catalog: ChallengeCatalog,
        window: Duration,
        max_attempts: u32,
        log: Arc<EventLog>,
    ) -> Self {
        Self {
            store: SessionStore::new(),
            catalog,
            window,
            max_attempts,
            log,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn view(&self, session: &VerificationSession, now: Instant, fresh: bool) -> SessionView {
        let elapsed = now.saturating_duration_since(session.created_at);
        let remaining = self.window.saturating_sub(elapsed);
        SessionView {
            image_ref: session.image_ref.clone(),
            seconds_remaining: remaining.as_secs(),
            attempts_used: session.attempts,
            attempts_remaining: self.max_attempts.saturating_sub(session.attempts),
            fresh,
        }
    }

    /// Arm the expiry timer for `(user, epoch)`
    fn schedule_expiry(self: &Arc<Self>, user: &UserId, epoch: u64) -> JoinHandle<()> {
        let machine = Arc::clone(self);
        let user = user.clone();
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            machine.expire(user, epoch).await;
        })
    }

    /// Begin verification, or show the still-live session.
    ///
    /// `already_has_role` is the caller's membership check against the
    /// verified role; when set, nothing is created or touched.
    pub async fn start_or_resume(
        self: &Arc<Self>,
        user: &UserId,
        already_has_role: bool,
    ) -> StartOutcome {
        if already_has_role {
            return StartOutcome::AlreadyVerified;
        }

        let now = Instant::now();
        if let Some((session, _)) = self.store.get(user).await {
            if now.saturating_duration_since(session.created_at) < self.window {
                tracing::debug!(user = %user, attempts = session.attempts, "Resuming live session");
                return StartOutcome::Resumed(self.view(&session, now, false));
            }
            // Logically expired but the timer has not fired yet
            self.store.remove(user).await;
        }

        let Some(record) = self.catalog.pick() else {
            tracing::error!(user = %user, "Challenge catalog is empty; refusing to start a session");
            return StartOutcome::Unconfigured;
        };

        let session = VerificationSession {
            code: record.code.clone(),
            image_ref: record.image_ref.clone(),
            created_at: now,
            attempts: 0,
        };
        let view = self.view(&session, now, true);

        let epoch = self.store.next_epoch();
        let timer = self.schedule_expiry(user, epoch);
        self.store.put(user.clone(), session, epoch, timer).await;

        tracing::info!(user = %user, window_secs = self.window.as_secs(), "Verification session started");
        StartOutcome::Challenge(view)
    }

    /// Evaluate a submitted answer.
    pub async fn answer(self: &Arc<Self>, user: &UserId, raw_answer: &str) -> AnswerOutcome {
        let now = Instant::now();

        let Some((session, epoch)) = self.store.get(user).await else {
            return AnswerOutcome::Expired;
        };

        // A window that elapsed before the timer callback ran counts as
        // expired all the same.
        if now.saturating_duration_since(session.created_at) >= self.window {
            self.store.remove_if_epoch(user, epoch).await;
            tracing::info!(user = %user, "Session window elapsed before answer");
            return AnswerOutcome::Expired;
        }

        // Terminal removals are epoch-guarded like the retry path: if the
        // timer fired between the lookup and here, expiry already won and
        // no grant or removal may follow.
        let answer = raw_answer.trim().to_lowercase();
        if answer == session.code {
            if self.store.remove_if_epoch(user, epoch).await.is_none() {
                return AnswerOutcome::Expired;
            }
            tracing::info!(user = %user, attempts = session.attempts, "Verification succeeded");
            return AnswerOutcome::Verified;
        }

        let attempts = session.attempts + 1;
        if attempts >= self.max_attempts {
            if self.store.remove_if_epoch(user, epoch).await.is_none() {
                return AnswerOutcome::Expired;
            }
            tracing::warn!(user = %user, attempts, "Attempt cap reached; session exhausted");
            return AnswerOutcome::Exhausted;
        }

        // Sliding window: wrong-but-not-final resets created_at and the
        // timer together; code and image stay as drawn.
        let new_epoch = self.store.next_epoch();
        let timer = self.schedule_expiry(user, new_epoch);
        let applied = self
            .store
            .reset_window(user, epoch, new_epoch, attempts, now, timer)
            .await;
        if !applied {
            // Slot superseded between lookup and reset (timer fired)
            return AnswerOutcome::Expired;
        }

        let refreshed = VerificationSession {
            created_at: now,
            attempts,
            ..session
        };
        tracing::debug!(
            user = %user,
            attempts_used = attempts,
            attempts_remaining = self.max_attempts - attempts,
            "Wrong answer, window reset"
        );
        AnswerOutcome::Retry(self.view(&refreshed, now, false))
    }

    /// Timer-fire path. Removes the session only when it is still the one
    /// the timer was armed for; a no-show is neither success nor
    /// exhaustion, so no outcome side effect runs.
    async fn expire(self: Arc<Self>, user: UserId, epoch: u64) {
        if let Some(session) = self.store.remove_if_epoch(&user, epoch).await {
            tracing::info!(user = %user, attempts = session.attempts, "Verification session expired");
            self.log
                .emit(
                    Notice::warning(
                        "Verification Expired",
                        format!(
                            "The verification session for {user} expired after {} seconds.",
                            self.window.as_secs()
                        ),
                    )
                    .with_field("Attempts used", session.attempts.to_string()),
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryPlatform;
    use gatekeeper_common::ChallengeRecord;

    const WINDOW: Duration = Duration::from_secs(120);

    fn verifier_with(records: Vec<ChallengeRecord>, max_attempts: u32) -> Arc<Verifier> {
        let platform = Arc::new(MemoryPlatform::new());
        let log = Arc::new(EventLog::new(platform, None));
        Arc::new(Verifier::new(
            ChallengeCatalog::new(records),
            WINDOW,
            max_attempts,
            log,
        ))
    }

    fn single_record() -> Vec<ChallengeRecord> {
        vec![ChallengeRecord {
            code: "abc1".to_string(),
            image_ref: "assets/captcha-0.png".to_string(),
        }]
    }

    #[tokio::test(start_paused = true)]
    async fn already_verified_never_creates_a_session() {
        let verifier = verifier_with(single_record(), 5);
        let user = UserId::from("u1");

        let outcome = verifier.start_or_resume(&user, true).await;
        assert!(matches!(outcome, StartOutcome::AlreadyVerified));
        assert!(verifier.store().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_catalog_is_unconfigured() {
        let verifier = verifier_with(Vec::new(), 5);
        let outcome = verifier.start_or_resume(&UserId::from("u1"), false).await;
        assert!(matches!(outcome, StartOutcome::Unconfigured));
        assert!(verifier.store().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn start_then_resume_keeps_the_same_captcha() {
        let verifier = verifier_with(single_record(), 5);
        let user = UserId::from("u1");

        let StartOutcome::Challenge(first) = verifier.start_or_resume(&user, false).await else {
            panic!("expected a fresh challenge");
        };
        assert!(first.fresh);
        assert_eq!(first.attempts_used, 0);
        assert_eq!(first.seconds_remaining, 120);

        tokio::time::sleep(Duration::from_secs(30)).await;

        let StartOutcome::Resumed(resumed) = verifier.start_or_resume(&user, false).await else {
            panic!("expected a resume");
        };
        assert!(!resumed.fresh);
        assert_eq!(resumed.image_ref, first.image_ref);
        assert_eq!(resumed.seconds_remaining, 90);
    }

    #[tokio::test(start_paused = true)]
    async fn correct_answer_is_case_insensitive_and_clears_the_session() {
        let verifier = verifier_with(single_record(), 5);
        let user = UserId::from("u1");

        verifier.start_or_resume(&user, false).await;
        let outcome = verifier.answer(&user, "  AbC1 ").await;
        assert!(matches!(outcome, AnswerOutcome::Verified));
        assert!(verifier.store().is_empty().await);

        // The session is gone; the old code is no longer answerable
        let again = verifier.answer(&user, "abc1").await;
        assert!(matches!(again, AnswerOutcome::Expired));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_lands_exactly_on_the_cap() {
        let verifier = verifier_with(single_record(), 3);
        let user = UserId::from("u1");
        verifier.start_or_resume(&user, false).await;

        let AnswerOutcome::Retry(view) = verifier.answer(&user, "zzzz").await else {
            panic!("first wrong answer should retry");
        };
        assert_eq!(view.attempts_used, 1);
        assert_eq!(view.attempts_remaining, 2);

        let AnswerOutcome::Retry(view) = verifier.answer(&user, "zzzz").await else {
            panic!("second wrong answer should retry");
        };
        assert_eq!(view.attempts_used, 2);
        assert_eq!(view.attempts_remaining, 1);

        let outcome = verifier.answer(&user, "zzzz").await;
        assert!(matches!(outcome, AnswerOutcome::Exhausted));
        assert!(verifier.store().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_answer_slides_the_window() {
        let verifier = verifier_with(single_record(), 5);
        let user = UserId::from("u1");
        verifier.start_or_resume(&user, false).await;

        // Just before expiry, submit a wrong answer
        tokio::time::sleep(WINDOW - Duration::from_secs(1)).await;
        let outcome = verifier.answer(&user, "wrong").await;
        assert!(matches!(outcome, AnswerOutcome::Retry(_)));

        // The original deadline passes; the slid session survives it
        tokio::time::sleep(WINDOW - Duration::from_secs(1)).await;
        let outcome = verifier.answer(&user, "abc1").await;
        assert!(matches!(outcome, AnswerOutcome::Verified));
    }

    #[tokio::test(start_paused = true)]
    async fn captcha_is_stable_across_retries() {
        let verifier = verifier_with(single_record(), 5);
        let user = UserId::from("u1");

        let StartOutcome::Challenge(start) = verifier.start_or_resume(&user, false).await else {
            panic!("expected a challenge");
        };

        for _ in 0..3 {
            let AnswerOutcome::Retry(view) = verifier.answer(&user, "nope").await else {
                panic!("expected retry");
            };
            assert_eq!(view.image_ref, start.image_ref);
        }
        let (session, _) = verifier.store().get(&user).await.expect("still live");
        assert_eq!(session.code, "abc1");
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_at_the_deadline_beats_a_correct_answer() {
        let verifier = verifier_with(single_record(), 5);
        let user = UserId::from("u1");
        verifier.start_or_resume(&user, false).await;

        // The timer fires exactly at the deadline; a correct answer
        // arriving then must not read as a success.
        tokio::time::sleep(WINDOW).await;

        let outcome = verifier.answer(&user, "abc1").await;
        assert!(matches!(outcome, AnswerOutcome::Expired));
        assert!(verifier.store().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_expires_via_the_timer_with_no_side_effects() {
        let verifier = verifier_with(single_record(), 5);
        let user = UserId::from("u1");
        verifier.start_or_resume(&user, false).await;

        tokio::time::sleep(WINDOW + Duration::from_secs(1)).await;

        assert!(verifier.store().is_empty().await);
        let outcome = verifier.answer(&user, "abc1").await;
        assert!(matches!(outcome, AnswerOutcome::Expired));
    }

    #[tokio::test(start_paused = true)]
    async fn start_after_expiry_draws_a_fresh_session() {
        let verifier = verifier_with(single_record(), 5);
        let user = UserId::from("u1");
        verifier.start_or_resume(&user, false).await;

        tokio::time::sleep(WINDOW + Duration::from_secs(1)).await;

        let outcome = verifier.start_or_resume(&user, false).await;
        let StartOutcome::Challenge(view) = outcome else {
            panic!("expected a fresh challenge after expiry");
        };
        assert!(view.fresh);
        assert_eq!(view.attempts_used, 0);
    }
}
