//! One inbound message in, one reply out.
//!
//! [`SessionOrchestrator`] ties together the subscription check, the stored
//! conversation and the completion provider. Exchanges for the same user are
//! not ordered unless [`UserLocks`] is enabled.

pub mod locks;
pub mod orchestrator;

pub use locks::{UserLockGuard, UserLocks};
pub use orchestrator::{CompletionSettings, PendingExchange, SessionOrchestrator};
