//! Suspend-and-replay listener wrapper

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::{ListenerError, SignalListener};
use crate::signal::SignalEnvelope;

/// Pacing between replayed deliveries, tuned to let a UI-bound consumer
/// repaint between events
const DEFAULT_REPLAY_DELAY: Duration = Duration::from_millis(18);

struct PendingDelivery<T> {
    envelope: Arc<SignalEnvelope<T>>,
    is_self: bool,
}

/// Wrapper that parks failed deliveries and replays them on [`resume`]
///
/// On failure the exact invocation (envelope plus `is_self`) is appended to
/// a FIFO pending queue instead of being dropped. [`resume`] drains the
/// queue in order, pacing re-attempts with a small delay; a re-attempt that
/// fails again re-enters the queue rather than being lost.
///
/// [`resume`]: PausableListener::resume
pub struct PausableListener<T> {
    inner: RwLock<Option<Arc<dyn SignalListener<T>>>>,
    pending: Mutex<VecDeque<PendingDelivery<T>>>,
    replay_delay: Duration,
}

impl<T> PausableListener<T>
where
    T: Send + Sync + 'static,
{
    /// Wrap an application listener with the default replay pacing
    pub fn new(inner: Arc<dyn SignalListener<T>>) -> Self {
        Self {
            inner: RwLock::new(Some(inner)),
            pending: Mutex::new(VecDeque::new()),
            replay_delay: DEFAULT_REPLAY_DELAY,
        }
    }

    /// Override the inter-item delay used while replaying
    pub fn replay_delay(mut self, delay: Duration) -> Self {
        self.replay_delay = delay;
        self
    }

    /// The currently wrapped listener, if any
    pub fn internal_listener(&self) -> Option<Arc<dyn SignalListener<T>>> {
        self.inner.read().clone()
    }

    /// Swap the wrapped listener without re-registering the wrapper
    pub fn set_internal_listener(&self, inner: Option<Arc<dyn SignalListener<T>>>) {
        *self.inner.write() = inner;
    }

    /// Number of deliveries currently parked for replay
    pub fn pending_deliveries(&self) -> usize {
        self.pending.lock().len()
    }

    /// Replay parked deliveries in FIFO order
    ///
    /// Each re-attempt is preceded by the replay delay so a consumer that
    /// just came back (e.g. a recreated UI screen) is not flooded. Deliveries
    /// that fail again, including any that cannot be attempted because the
    /// inner listener is unset, go back to the pending queue for the next
    /// resume.
    pub async fn resume(&self) {
        let mut batch = {
            let mut pending = self.pending.lock();
            std::mem::take(&mut *pending)
        };
        if batch.is_empty() {
            return;
        }
        tracing::debug!(pending = batch.len(), "replaying suspended deliveries");

        while let Some(delivery) = batch.pop_front() {
            tokio::time::sleep(self.replay_delay).await;

            let Some(listener) = self.inner.read().clone() else {
                self.pending.lock().push_back(delivery);
                continue;
            };
            if let Err(e) = listener
                .on_signal(Arc::clone(&delivery.envelope), delivery.is_self)
                .await
            {
                tracing::debug!(
                    signal = %delivery.envelope.name,
                    error = %e,
                    "replay failed; suspending delivery again"
                );
                self.pending.lock().push_back(delivery);
            }
        }
    }
}

#[async_trait]
impl<T> SignalListener<T> for PausableListener<T>
where
    T: Send + Sync + 'static,
{
    async fn on_signal(
        &self,
        envelope: Arc<SignalEnvelope<T>>,
        is_self: bool,
    ) -> Result<(), ListenerError> {
        let Some(inner) = self.inner.read().clone() else {
            // Matches the drop-when-unset behavior of the log-and-continue
            // strategy; suspended deliveries only come from actual failures.
            return Ok(());
        };
        if let Err(e) = inner.on_signal(Arc::clone(&envelope), is_self).await {
            tracing::debug!(signal = %envelope.name, error = %e, "suspending failed delivery");
            self.pending.lock().push_back(PendingDelivery { envelope, is_self });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex as SyncMutex;

    use super::*;

    /// Fails the first `fail_first` invocations, then records payloads.
    struct Consumer {
        fail_first: usize,
        attempts: AtomicUsize,
        seen: SyncMutex<Vec<String>>,
    }

    impl Consumer {
        fn new(fail_first: usize) -> Arc<Self> {
            Arc::new(Self {
                fail_first,
                attempts: AtomicUsize::new(0),
                seen: SyncMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SignalListener<String> for Consumer {
        async fn on_signal(
            &self,
            envelope: Arc<SignalEnvelope<String>>,
            _is_self: bool,
        ) -> Result<(), ListenerError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first {
                return Err(ListenerError::Unavailable);
            }
            self.seen.lock().push(envelope.payload.clone());
            Ok(())
        }
    }

    fn envelope(payload: &str) -> Arc<SignalEnvelope<String>> {
        Arc::new(SignalEnvelope::outbound("t", payload.to_string(), None))
    }

    fn fast(listener: Arc<dyn SignalListener<String>>) -> PausableListener<String> {
        PausableListener::new(listener).replay_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_failed_delivery_is_replayed_exactly_once() {
        let consumer = Consumer::new(1);
        let wrapper = fast(consumer.clone());

        assert!(wrapper.on_signal(envelope("hello"), false).await.is_ok());
        assert_eq!(wrapper.pending_deliveries(), 1);
        assert!(consumer.seen.lock().is_empty());

        wrapper.resume().await;

        assert_eq!(wrapper.pending_deliveries(), 0);
        assert_eq!(*consumer.seen.lock(), vec!["hello"]);
        // One failed attempt plus one successful replay, no duplicates.
        assert_eq!(consumer.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_replay_preserves_fifo_order() {
        let consumer = Consumer::new(3);
        let wrapper = fast(consumer.clone());

        for payload in ["a", "b", "c"] {
            wrapper.on_signal(envelope(payload), false).await.unwrap();
        }
        assert_eq!(wrapper.pending_deliveries(), 3);

        wrapper.resume().await;

        assert_eq!(*consumer.seen.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_refailed_replay_reenters_queue() {
        // Fails the original attempt and the first replay.
        let consumer = Consumer::new(2);
        let wrapper = fast(consumer.clone());

        wrapper.on_signal(envelope("stubborn"), false).await.unwrap();
        wrapper.resume().await;

        // Replay failed again: still parked, not lost.
        assert_eq!(wrapper.pending_deliveries(), 1);
        assert!(consumer.seen.lock().is_empty());

        wrapper.resume().await;

        assert_eq!(wrapper.pending_deliveries(), 0);
        assert_eq!(*consumer.seen.lock(), vec!["stubborn"]);
    }

    #[tokio::test]
    async fn test_resume_with_unset_inner_keeps_pending() {
        let consumer = Consumer::new(1);
        let wrapper = fast(consumer.clone());

        wrapper.on_signal(envelope("later"), false).await.unwrap();
        wrapper.set_internal_listener(None);

        wrapper.resume().await;
        assert_eq!(wrapper.pending_deliveries(), 1);

        // The recreated consumer picks the delivery up on the next resume.
        wrapper.set_internal_listener(Some(consumer.clone()));
        wrapper.resume().await;
        assert_eq!(*consumer.seen.lock(), vec!["later"]);
    }

    #[tokio::test]
    async fn test_resume_without_pending_is_noop() {
        let consumer = Consumer::new(0);
        let wrapper = fast(consumer.clone());

        wrapper.resume().await;

        assert_eq!(consumer.attempts.load(Ordering::SeqCst), 0);
    }
}
