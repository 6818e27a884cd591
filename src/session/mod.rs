//! Session façade: transport ↔ pipes ↔ registry
//!
//! [`SignalSession`] owns the whole signal path of one video session. Inbound
//! signals arrive from the transport via [`receive_signal`], pass through an
//! optional input pipe, and fan out to registered listeners via the dispatch
//! pool. Outbound signals leave through [`send`], pass through an optional
//! output pipe, and reach the transport from the pipe runner's delivery task.
//!
//! ```text
//!   transport ──► receive_signal ──► [input pipe ──► runner] ──► registry
//!                                                                   │
//!                                                              worker pool
//!                                                                   │
//!                                                               listeners
//!
//!   application ──► send ──► [output pipe ──► runner] ──► transport
//! ```
//!
//! Both pipes can be installed, hot-swapped, or removed at runtime without
//! losing in-flight signals; the bracketed stages simply disappear when no
//! pipe is configured.
//!
//! [`receive_signal`]: SignalSession::receive_signal
//! [`send`]: SignalSession::send

pub mod config;
pub mod transport;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::listener::SignalListener;
use crate::pipe::{PipeRunner, SignalPipe, SignalSink};
use crate::registry::SignalRegistry;
use crate::signal::{ConnectionId, SignalEnvelope};

pub use config::SessionConfig;
pub use transport::{SendError, SignalTransport};

/// One direction's pipe state: the write-side pipe reference plus the runner
/// draining it. Guarded by a single mutex so a swap can never interleave
/// with a concurrent write.
struct PipeEnd<In, Out> {
    pipe: Option<Arc<dyn SignalPipe<In, Out>>>,
    runner: Option<PipeRunner<In, Out>>,
}

impl<In, Out> PipeEnd<In, Out>
where
    In: Send + Sync + 'static,
    Out: Send + Sync + 'static,
{
    fn empty() -> Self {
        Self {
            pipe: None,
            runner: None,
        }
    }

    /// Install, swap, or remove the pipe, reusing the runner when there is
    /// one (the old pipe is closed and drained before the new one is read).
    fn refresh(
        &mut self,
        pipe: Option<Arc<dyn SignalPipe<In, Out>>>,
        sink: impl FnOnce() -> Arc<dyn SignalSink<Out>>,
    ) {
        self.pipe = pipe.clone();
        self.runner = match self.runner.take() {
            Some(runner) => runner.switch_pipe(pipe),
            None => pipe.map(|p| PipeRunner::spawn(p, sink())),
        };
    }
}

/// Delivers input-pipe output into the registry.
struct DispatchSink<P> {
    registry: Arc<SignalRegistry<P>>,
}

#[async_trait]
impl<P> SignalSink<P> for DispatchSink<P>
where
    P: Send + Sync + 'static,
{
    async fn deliver(&self, envelope: SignalEnvelope<P>) {
        self.registry.dispatch(envelope);
    }
}

/// Delivers output-pipe output to the transport.
struct WireSink {
    transport: Arc<dyn SignalTransport>,
}

#[async_trait]
impl SignalSink<String> for WireSink {
    async fn deliver(&self, envelope: SignalEnvelope<String>) {
        let SignalEnvelope {
            name,
            payload,
            destination,
            ..
        } = envelope;
        if let Err(e) = self
            .transport
            .send_signal(&name, payload, destination.as_ref())
            .await
        {
            tracing::warn!(signal = %name, error = %e, "transport rejected outbound signal");
        }
    }
}

/// Signal relay for one real-time video session
///
/// `P` is the application-visible payload type. Raw wire payloads are always
/// text; when no input pipe is configured inbound payloads are converted with
/// `P: From<String>`, and when no output pipe is configured outbound payloads
/// are serialized with `P: Into<String>`. With pipes installed, those
/// conversions are the pipes' job. For raw signaling, `P = String`.
pub struct SignalSession<P> {
    transport: Arc<dyn SignalTransport>,
    registry: Arc<SignalRegistry<P>>,
    inbound: Mutex<PipeEnd<String, P>>,
    outbound: Mutex<PipeEnd<P, String>>,
}

impl<P> SignalSession<P>
where
    P: Send + Sync + From<String> + Into<String> + 'static,
{
    /// Create a session with default configuration
    pub fn new(transport: Arc<dyn SignalTransport>) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Create a session with custom configuration
    pub fn with_config(transport: Arc<dyn SignalTransport>, config: SessionConfig) -> Self {
        Self {
            transport,
            registry: Arc::new(SignalRegistry::with_min_workers(config.min_workers)),
            inbound: Mutex::new(PipeEnd::empty()),
            outbound: Mutex::new(PipeEnd::empty()),
        }
    }

    /// Register a listener for `signal_name` (or [`WILDCARD`] for all names)
    ///
    /// [`WILDCARD`]: crate::signal::WILDCARD
    pub fn register_listener(&self, signal_name: &str, listener: Arc<dyn SignalListener<P>>) {
        self.registry.register(signal_name, listener);
    }

    /// Remove a listener from every name it is registered under
    pub fn unregister_listener(&self, listener: &Arc<dyn SignalListener<P>>) {
        self.registry.unregister(listener);
    }

    /// Remove a single subscription
    pub fn unregister_listener_from(
        &self,
        signal_name: &str,
        listener: &Arc<dyn SignalListener<P>>,
    ) {
        self.registry.unregister_from(signal_name, listener);
    }

    /// Record the local participant's connection id (pass `None` again on
    /// disconnect)
    ///
    /// Until this is set, no inbound signal is ever reported as
    /// self-originated.
    pub fn set_local_connection(&self, connection: Option<ConnectionId>) {
        self.registry.set_local_connection(connection);
    }

    /// The listener registry, exposed for introspection
    pub fn registry(&self) -> &Arc<SignalRegistry<P>> {
        &self.registry
    }

    /// Send a signal over the session
    ///
    /// With an output pipe configured this only enqueues the envelope; the
    /// transport call then happens from the pipe runner's delivery task,
    /// carrying the envelope's destination. Without one, the transport is
    /// called directly.
    pub async fn send(
        &self,
        name: &str,
        payload: P,
        destination: Option<ConnectionId>,
    ) -> Result<(), SendError> {
        let envelope = SignalEnvelope::outbound(name, payload, destination);

        let envelope = {
            let outbound = self.outbound.lock();
            if let Some(pipe) = &outbound.pipe {
                tracing::trace!(signal = name, "writing signal to output pipe");
                pipe.write(envelope);
                return Ok(());
            }
            envelope
        };

        let SignalEnvelope {
            name,
            payload,
            destination,
            ..
        } = envelope;
        self.transport
            .send_signal(&name, payload.into(), destination.as_ref())
            .await
    }

    /// Feed one raw signal received by the transport into the relay
    ///
    /// Never blocks: with an input pipe this is a queue write, without one
    /// it only submits dispatch tasks to the worker pool. Either way the
    /// transport's delivery thread returns immediately.
    pub fn receive_signal(
        &self,
        source: Option<ConnectionId>,
        destination: Option<ConnectionId>,
        name: &str,
        payload: String,
    ) {
        let envelope = SignalEnvelope::inbound(source, destination, name, payload);

        let envelope = {
            let inbound = self.inbound.lock();
            if let Some(pipe) = &inbound.pipe {
                tracing::trace!(signal = name, "writing signal to input pipe");
                pipe.write(envelope);
                return;
            }
            envelope
        };

        self.registry.dispatch(envelope.map(P::from));
    }

    /// Install, hot-swap, or remove the input pipe
    ///
    /// Pass `None` to go back to receiving raw signals. A swap closes the
    /// previous pipe and drains it completely before the runner turns to the
    /// new one, so signals in flight are neither lost nor duplicated.
    pub fn set_input_pipe(&self, pipe: Option<Arc<dyn SignalPipe<String, P>>>) {
        let registry = Arc::clone(&self.registry);
        self.inbound
            .lock()
            .refresh(pipe, move || Arc::new(DispatchSink { registry }));
    }

    /// Install, hot-swap, or remove the output pipe
    pub fn set_output_pipe(&self, pipe: Option<Arc<dyn SignalPipe<P, String>>>) {
        let transport = Arc::clone(&self.transport);
        self.outbound
            .lock()
            .refresh(pipe, move || Arc::new(WireSink { transport }));
    }

    /// Remove both pipes, draining whatever they still hold
    pub fn cleanup_pipes(&self) {
        self.set_input_pipe(None);
        self.set_output_pipe(None);
    }

    /// Tear the session's signal machinery down
    ///
    /// Removes both pipes and stops the dispatch pool. Listener deliveries
    /// already in flight finish; queued ones are discarded.
    pub fn shutdown(&self) {
        self.cleanup_pipes();
        self.registry.shutdown();
    }
}
