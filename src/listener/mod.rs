//! Signal listeners and resilience wrappers
//!
//! Application code observes signals through the [`SignalListener`] trait:
//! one method, invoked once per delivered envelope, with a flag telling the
//! listener whether the signal originated from the local connection.
//!
//! A listener signals a *recoverable* failure by returning [`ListenerError`]
//! (typically: the UI consumer behind it is mid-teardown). Two wrapper
//! strategies isolate the rest of the system from such failures, and are
//! interchangeable from the registry's point of view:
//!
//! - [`UnfailingListener`] logs and continues: report the failure, drop that
//!   one invocation, never retry.
//! - [`PausableListener`] suspends and replays: park the failed invocation in
//!   a FIFO queue and replay it on an explicit [`resume`](PausableListener::resume).
//!
//! Both wrappers let the wrapped application listener be hot-swapped without
//! touching the registry, which is what keeps registrations stable while a
//! UI screen implementing the listener is destroyed and recreated.

pub mod pausable;
pub mod unfailing;

use std::sync::Arc;

use async_trait::async_trait;

use crate::signal::SignalEnvelope;

pub use pausable::PausableListener;
pub use unfailing::UnfailingListener;

/// Recoverable failure condition signaled by a listener
///
/// This is the listener telling the relay "I could not take this delivery",
/// not a transport or programming error.
#[derive(Debug, Clone)]
pub enum ListenerError {
    /// The consumer behind the listener is temporarily gone (e.g. a UI
    /// screen being destroyed)
    Unavailable,
    /// The listener failed to process the delivery
    Failed(String),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Unavailable => write!(f, "listener temporarily unavailable"),
            ListenerError::Failed(reason) => write!(f, "listener failed: {}", reason),
        }
    }
}

impl std::error::Error for ListenerError {}

/// Receiver of dispatched signals
///
/// Listeners are expected to return promptly; a slow listener only delays
/// its own dispatch worker, never other listeners. Envelopes arrive behind
/// `Arc` because one envelope fans out to every matching listener (and a
/// suspended delivery keeps its envelope alive for replay).
#[async_trait]
pub trait SignalListener<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Handle one delivered signal
    ///
    /// `is_self` is true when the envelope's source is the local connection.
    async fn on_signal(
        &self,
        envelope: Arc<SignalEnvelope<T>>,
        is_self: bool,
    ) -> Result<(), ListenerError>;
}
