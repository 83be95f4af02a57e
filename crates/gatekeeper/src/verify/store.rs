//! Session store: one slot per user, owning that session's expiry timer.
//!
//! Every write cancels the slot's previous timer handle, so at most one
//! expiry task is pending per live session. Each entry carries an epoch;
//! a timer that outlives its session proves it by failing the epoch check
//! and becomes a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use gatekeeper_common::UserId;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Live state of one user's in-progress challenge.
///
/// `code` and `image_ref` are fixed for the session's whole lifetime; a
/// fresh captcha is only drawn for a brand-new session, never on retry.
#[derive(Debug, Clone)]
pub struct VerificationSession {
    /// Expected answer, lowercase
    pub code: String,

    /// Captcha image shown to the user
    pub image_ref: String,

    /// Start of the current validity window; reset on every retry
    pub created_at: Instant,

    /// Wrong answers so far
    pub attempts: u32,
}

struct Entry {
    session: VerificationSession,
    epoch: u64,
    timer: JoinHandle<()>,
}

impl Entry {
    fn cancel(&self) {
        self.timer.abort();
    }
}

/// Mapping from user to verification session. Owns the timers.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Entry>>,
    epochs: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an epoch for a new or reset session
    pub fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Pure lookup; clones the session together with its current epoch
    pub async fn get(&self, user: &UserId) -> Option<(VerificationSession, u64)> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(user)
            .map(|entry| (entry.session.clone(), entry.epoch))
    }

    /// Store a session, cancelling any timer the user's slot already held
    pub async fn put(
        &self,
        user: UserId,
        session: VerificationSession,
        epoch: u64,
        timer: JoinHandle<()>,
    ) {
        let mut sessions = self.sessions.lock().await;
        if let Some(previous) = sessions.insert(
            user,
            Entry {
                session,
                epoch,
                timer,
            },
        ) {
            previous.cancel();
        }
    }

    /// Delete the user's session and cancel its timer.
    ///
    /// Idempotent: removing an absent session is a no-op and returns false.
    pub async fn remove(&self, user: &UserId) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.remove(user) {
            Some(entry) => {
                entry.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove only if the slot still belongs to `epoch`.
    ///
    /// This is the timer-fire path: a timer superseded by a retry or a new
    /// session finds a different epoch and must not touch the slot.
    pub async fn remove_if_epoch(&self, user: &UserId, epoch: u64) -> Option<VerificationSession> {
        let mut sessions = self.sessions.lock().await;
        if !sessions.get(user).is_some_and(|entry| entry.epoch == epoch) {
            return None;
        }
        sessions.remove(user).map(|entry| {
            entry.cancel();
            entry.session
        })
    }

    /// Sliding-window retry mutation, guarded by `expect_epoch`.
    ///
    /// Atomically (one lock hold): set attempts, reset `created_at` to
    /// `now`, swap in the new epoch, cancel the previous timer, install the
    /// replacement handle. Returns false (and cancels `timer`) when the
    /// slot no longer belongs to `expect_epoch`.
    pub async fn reset_window(
        &self,
        user: &UserId,
        expect_epoch: u64,
        new_epoch: u64,
        attempts: u32,
        now: Instant,
        timer: JoinHandle<()>,
    ) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(user) {
            Some(entry) if entry.epoch == expect_epoch => {
                entry.timer.abort();
                entry.session.attempts = attempts;
                entry.session.created_at = now;
                entry.epoch = new_epoch;
                entry.timer = timer;
                true
            }
            _ => {
                timer.abort();
                false
            }
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
