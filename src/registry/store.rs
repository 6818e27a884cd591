//! Registry implementation
//!
//! The central directory of signal listeners and the dispatch path that
//! fans received envelopes out to them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::listener::SignalListener;
use crate::pool::{WorkerPool, DEFAULT_MIN_WORKERS};
use crate::signal::{ConnectionId, SignalEnvelope, WILDCARD};

/// Listener identity: the allocation behind the `Arc`, ignoring vtable
/// metadata (which is not stable across codegen units).
fn same_listener<T>(a: &Arc<dyn SignalListener<T>>, b: &Arc<dyn SignalListener<T>>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Publish/subscribe directory of signal listeners
///
/// Listener identity is `Arc` pointer identity: registering the same
/// listener value twice under one name is a no-op, and unregistering removes
/// exactly that value. Directory mutations are atomic with respect to
/// concurrent dispatch reads.
pub struct SignalRegistry<T> {
    listeners: RwLock<HashMap<String, Vec<Arc<dyn SignalListener<T>>>>>,

    /// Pool the delivery closures run on
    pool: WorkerPool,

    /// Connection id of the local participant, once the session established it
    local_connection: RwLock<Option<ConnectionId>>,
}

impl<T> SignalRegistry<T>
where
    T: Send + Sync + 'static,
{
    /// Create a registry with the default dispatch pool floor
    pub fn new() -> Self {
        Self::with_min_workers(DEFAULT_MIN_WORKERS)
    }

    /// Create a registry whose dispatch pool keeps at least `min_workers`
    /// workers alive
    pub fn with_min_workers(min_workers: usize) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            pool: WorkerPool::with_min_workers(min_workers),
            local_connection: RwLock::new(None),
        }
    }

    /// Register `listener` under `signal_name`
    ///
    /// Pass [`WILDCARD`] to have the listener invoked for every signal.
    /// Re-registering the same listener under the same name is a no-op.
    pub fn register(&self, signal_name: &str, listener: Arc<dyn SignalListener<T>>) {
        let mut listeners = self.listeners.write();
        let entries = listeners.entry(signal_name.to_string()).or_default();
        if entries.iter().any(|l| same_listener(l, &listener)) {
            tracing::debug!(signal = signal_name, "listener already registered; ignoring");
            return;
        }
        tracing::debug!(signal = signal_name, "listener registered");
        entries.push(listener);
    }

    /// Remove `listener` from every name it is registered under
    ///
    /// Bulk convenience for tear-down paths where the listener's owner (say,
    /// a destroyed UI screen) no longer knows which names it subscribed to.
    pub fn unregister(&self, listener: &Arc<dyn SignalListener<T>>) {
        let mut listeners = self.listeners.write();
        listeners.retain(|signal_name, entries| {
            let before = entries.len();
            entries.retain(|l| !same_listener(l, listener));
            if entries.len() < before {
                tracing::debug!(signal = %signal_name, "listener unregistered");
            }
            !entries.is_empty()
        });
    }

    /// Remove a single subscription
    ///
    /// When the last subscriber for a name leaves, the name entry itself is
    /// pruned.
    pub fn unregister_from(&self, signal_name: &str, listener: &Arc<dyn SignalListener<T>>) {
        let mut listeners = self.listeners.write();
        if let Some(entries) = listeners.get_mut(signal_name) {
            entries.retain(|l| !same_listener(l, listener));
            if entries.is_empty() {
                listeners.remove(signal_name);
            }
        }
    }

    /// Number of listeners registered under `signal_name`
    pub fn listener_count(&self, signal_name: &str) -> usize {
        self.listeners
            .read()
            .get(signal_name)
            .map_or(0, |entries| entries.len())
    }

    /// Record the local participant's connection id once established
    pub fn set_local_connection(&self, connection: Option<ConnectionId>) {
        *self.local_connection.write() = connection;
    }

    /// The local participant's connection id, if established
    pub fn local_connection(&self) -> Option<ConnectionId> {
        self.local_connection.read().clone()
    }

    /// Fan `envelope` out to wildcard subscribers and name-matched
    /// subscribers; never blocks
    ///
    /// Each matched listener gets its own pool task, so deliveries to
    /// distinct listeners proceed concurrently and independently. A listener
    /// error surfacing here (i.e. one not absorbed by a resilience wrapper)
    /// is logged and dropped.
    pub fn dispatch(&self, envelope: SignalEnvelope<T>) {
        let envelope = Arc::new(envelope);
        let is_self = self.is_self_originated(&envelope);

        let listeners = self.listeners.read();
        let wildcard = listeners.get(WILDCARD).into_iter().flatten();
        let named = listeners.get(&envelope.name).into_iter().flatten();

        let mut matched = 0usize;
        for listener in wildcard.chain(named) {
            matched += 1;
            let listener = Arc::clone(listener);
            let envelope = Arc::clone(&envelope);
            self.pool.submit(async move {
                tracing::trace!(signal = %envelope.name, "delivering signal");
                if let Err(e) = listener.on_signal(Arc::clone(&envelope), is_self).await {
                    tracing::debug!(signal = %envelope.name, error = %e, "listener rejected delivery");
                }
            });
        }

        if matched == 0 {
            tracing::debug!(signal = %envelope.name, "no listeners registered for signal");
        }
    }

    /// Tear down the dispatch pool; queued deliveries are discarded
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// The dispatch pool, exposed for introspection
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    fn is_self_originated(&self, envelope: &SignalEnvelope<T>) -> bool {
        let local = self.local_connection.read();
        match (local.as_ref(), envelope.source.as_ref()) {
            (Some(local), Some(source)) => local == source,
            (None, Some(_)) => {
                // Do not guess at self-origination before the session has a
                // connection id.
                tracing::warn!(
                    signal = %envelope.name,
                    "local connection not yet established; treating signal as remote"
                );
                false
            }
            _ => false,
        }
    }
}

impl<T> Default for SignalRegistry<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::listener::ListenerError;

    struct Recorder {
        seen: Mutex<Vec<(String, bool)>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.seen.lock().len()
        }
    }

    #[async_trait]
    impl SignalListener<String> for Recorder {
        async fn on_signal(
            &self,
            envelope: Arc<SignalEnvelope<String>>,
            is_self: bool,
        ) -> Result<(), ListenerError> {
            self.seen.lock().push((envelope.name.clone(), is_self));
            Ok(())
        }
    }

    fn inbound(name: &str, source: &str) -> SignalEnvelope<String> {
        SignalEnvelope::inbound(
            Some(ConnectionId::new(source)),
            None,
            name,
            "payload".to_string(),
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_named_delivery_only_matches_name() {
        let registry = SignalRegistry::with_min_workers(2);
        assert_eq!(registry.pool().live_workers(), 2);

        let chat = Recorder::new();
        registry.register("chat", chat.clone());

        registry.dispatch(inbound("chat", "conn-1"));
        registry.dispatch(inbound("status", "conn-1"));
        settle().await;

        assert_eq!(chat.count(), 1);
        registry.shutdown();
    }

    #[tokio::test]
    async fn test_wildcard_sees_every_name() {
        let registry = SignalRegistry::with_min_workers(2);
        let all = Recorder::new();
        registry.register(WILDCARD, all.clone());

        registry.dispatch(inbound("chat", "conn-1"));
        registry.dispatch(inbound("status", "conn-1"));
        registry.dispatch(inbound("annotation", "conn-1"));
        settle().await;

        assert_eq!(all.count(), 3);
        registry.shutdown();
    }

    #[tokio::test]
    async fn test_registration_is_idempotent() {
        let registry = SignalRegistry::with_min_workers(2);
        let listener = Recorder::new();
        registry.register("chat", listener.clone());
        registry.register("chat", listener.clone());

        assert_eq!(registry.listener_count("chat"), 1);

        registry.dispatch(inbound("chat", "conn-1"));
        settle().await;

        assert_eq!(listener.count(), 1);
        registry.shutdown();
    }

    #[tokio::test]
    async fn test_unregister_everywhere() {
        let registry = SignalRegistry::with_min_workers(2);
        let listener = Recorder::new();
        let handle: Arc<dyn SignalListener<String>> = listener.clone();
        registry.register("chat", listener.clone());
        registry.register("status", listener.clone());
        registry.register(WILDCARD, listener.clone());

        registry.unregister(&handle);

        assert_eq!(registry.listener_count("chat"), 0);
        assert_eq!(registry.listener_count("status"), 0);
        assert_eq!(registry.listener_count(WILDCARD), 0);

        registry.dispatch(inbound("chat", "conn-1"));
        settle().await;

        assert_eq!(listener.count(), 0);
        registry.shutdown();
    }

    #[tokio::test]
    async fn test_unregister_single_name_prunes_entry() {
        let registry = SignalRegistry::with_min_workers(2);
        let listener = Recorder::new();
        let handle: Arc<dyn SignalListener<String>> = listener.clone();
        registry.register("chat", listener.clone());
        registry.register("status", listener.clone());

        registry.unregister_from("chat", &handle);

        assert_eq!(registry.listener_count("chat"), 0);
        assert_eq!(registry.listener_count("status"), 1);
        registry.shutdown();
    }

    #[tokio::test]
    async fn test_is_self_against_local_connection() {
        let registry = SignalRegistry::with_min_workers(2);
        let listener = Recorder::new();
        registry.register("chat", listener.clone());

        assert_eq!(registry.local_connection(), None);
        registry.set_local_connection(Some(ConnectionId::new("me")));
        assert_eq!(registry.local_connection(), Some(ConnectionId::new("me")));

        registry.dispatch(inbound("chat", "me"));
        registry.dispatch(inbound("chat", "someone-else"));
        settle().await;

        let seen = listener.seen.lock().clone();
        assert!(seen.contains(&("chat".to_string(), true)));
        assert!(seen.contains(&("chat".to_string(), false)));
        registry.shutdown();
    }

    #[tokio::test]
    async fn test_unknown_local_connection_is_never_self() {
        let registry = SignalRegistry::with_min_workers(2);
        let listener = Recorder::new();
        registry.register("chat", listener.clone());

        // No local connection established yet.
        registry.dispatch(inbound("chat", "me"));
        settle().await;

        assert_eq!(*listener.seen.lock(), vec![("chat".to_string(), false)]);
        registry.shutdown();
    }

    #[tokio::test]
    async fn test_listener_on_both_wildcard_and_name_delivered_twice() {
        let registry = SignalRegistry::with_min_workers(2);
        let listener = Recorder::new();
        registry.register(WILDCARD, listener.clone());
        registry.register("chat", listener.clone());

        registry.dispatch(inbound("chat", "conn-1"));
        settle().await;

        // Wildcard and named subscriptions are independent.
        assert_eq!(listener.count(), 2);
        registry.shutdown();
    }

    #[tokio::test]
    async fn test_unregister_does_not_recall_in_flight_deliveries() {
        let registry = SignalRegistry::with_min_workers(2);

        struct Slow {
            delivered: Mutex<usize>,
        }

        #[async_trait]
        impl SignalListener<String> for Slow {
            async fn on_signal(
                &self,
                _envelope: Arc<SignalEnvelope<String>>,
                _is_self: bool,
            ) -> Result<(), ListenerError> {
                tokio::time::sleep(Duration::from_millis(30)).await;
                *self.delivered.lock() += 1;
                Ok(())
            }
        }

        let slow = Arc::new(Slow {
            delivered: Mutex::new(0),
        });
        let handle: Arc<dyn SignalListener<String>> = slow.clone();
        registry.register("chat", slow.clone());

        // In flight when the unregister lands.
        registry.dispatch(inbound("chat", "conn-1"));
        registry.unregister(&handle);
        // Dispatched after the unregister: never delivered.
        registry.dispatch(inbound("chat", "conn-1"));

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(*slow.delivered.lock(), 1);
        registry.shutdown();
    }
}
