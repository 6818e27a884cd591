//! Log-and-continue listener wrapper

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ListenerError, SignalListener};
use crate::signal::SignalEnvelope;

/// Wrapper that absorbs listener failures by reporting and dropping them
///
/// Every invocation is independent: a failure costs exactly that one
/// delivery and leaves no state behind.
pub struct UnfailingListener<T> {
    inner: RwLock<Option<Arc<dyn SignalListener<T>>>>,
}

impl<T> UnfailingListener<T>
where
    T: Send + Sync + 'static,
{
    /// Wrap an application listener
    pub fn new(inner: Arc<dyn SignalListener<T>>) -> Self {
        Self {
            inner: RwLock::new(Some(inner)),
        }
    }

    /// The currently wrapped listener, if any
    pub fn internal_listener(&self) -> Option<Arc<dyn SignalListener<T>>> {
        self.inner.read().clone()
    }

    /// Swap the wrapped listener without re-registering the wrapper
    ///
    /// Pass `None` while the consumer is torn down; deliveries in that
    /// window are dropped.
    pub fn set_internal_listener(&self, inner: Option<Arc<dyn SignalListener<T>>>) {
        *self.inner.write() = inner;
    }
}

#[async_trait]
impl<T> SignalListener<T> for UnfailingListener<T>
where
    T: Send + Sync + 'static,
{
    async fn on_signal(
        &self,
        envelope: Arc<SignalEnvelope<T>>,
        is_self: bool,
    ) -> Result<(), ListenerError> {
        let Some(inner) = self.inner.read().clone() else {
            return Ok(());
        };
        if let Err(e) = inner.on_signal(envelope.clone(), is_self).await {
            tracing::debug!(signal = %envelope.name, error = %e, "listener failed; dropping delivery");
        }
        Ok(())
    }
}
