//! Verification gate: challenge catalog, session store, state machine,
//! and outcome executor.

mod catalog;
mod machine;
mod outcome;
mod store;

pub use catalog::ChallengeCatalog;
pub use machine::{AnswerOutcome, StartOutcome, Verifier};
pub use outcome::{GrantOutcome, OutcomeExecutor, RemoveOutcome};
pub use store::{SessionStore, VerificationSession};
