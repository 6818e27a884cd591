//! Threaded reference pipe implementation
//!
//! [`TransformPipe`] buffers input, runs an application-supplied
//! [`SignalTransform`] on its own task, and buffers output. Output order
//! follows input arrival order; a single input may produce zero, one, or
//! several outputs (multipart reassembly, splitting a combined message).

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::protocol::SignalPipe;
use crate::signal::SignalEnvelope;

/// Error produced by a failing [`SignalTransform`]
///
/// A failed transform only ever costs the offending input envelope; the
/// processing loop logs the error and keeps going.
#[derive(Debug, Clone)]
pub struct TransformError {
    message: String,
}

impl TransformError {
    /// Create a new transform error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transform failed: {}", self.message)
    }
}

impl std::error::Error for TransformError {}

/// The transformation extension point run inside a [`TransformPipe`]
///
/// Implementations may keep state across calls (`&mut self`), which is what
/// makes multipart protocols possible: buffer fragments, return an empty
/// vector until the message is complete, then emit the reassembled envelope.
pub trait SignalTransform<In, Out>: Send + 'static
where
    In: Send + Sync + 'static,
    Out: Send + Sync + 'static,
{
    /// Transform one input envelope into zero or more output envelopes
    fn transform(
        &mut self,
        envelope: SignalEnvelope<In>,
    ) -> Result<Vec<SignalEnvelope<Out>>, TransformError>;
}

enum PipeInput<In> {
    Item(SignalEnvelope<In>),
    Close,
}

/// Reference [`SignalPipe`]: two unbounded queues bridged by one processing
/// task
///
/// Created inside a tokio runtime (the processing task is spawned at
/// construction time).
pub struct TransformPipe<In, Out> {
    input_tx: mpsc::UnboundedSender<PipeInput<In>>,
    output_rx: Mutex<mpsc::UnboundedReceiver<SignalEnvelope<Out>>>,
    closed: AtomicBool,
}

impl<In, Out> TransformPipe<In, Out>
where
    In: Send + Sync + 'static,
    Out: Send + Sync + 'static,
{
    /// Create a pipe running the given transform on its own task
    pub fn new<T>(transform: T) -> Self
    where
        T: SignalTransform<In, Out>,
    {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<PipeInput<In>>();
        let (output_tx, output_rx) = mpsc::unbounded_channel::<SignalEnvelope<Out>>();

        tokio::spawn(async move {
            let mut transform = transform;
            while let Some(next) = input_rx.recv().await {
                let envelope = match next {
                    PipeInput::Item(envelope) => envelope,
                    PipeInput::Close => break,
                };
                let name = envelope.name.clone();
                match transform.transform(envelope) {
                    Ok(outputs) => {
                        for output in outputs {
                            if output_tx.send(output).is_err() {
                                // Reader side dropped; nothing left to feed.
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(signal = %name, error = %e, "dropping malformed signal");
                    }
                }
            }
            tracing::debug!("pipe processing task exiting");
            // Dropping output_tx here is what wakes blocked readers with the
            // closed sentinel, after every buffered output has drained.
        });

        Self {
            input_tx,
            output_rx: Mutex::new(output_rx),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<In, Out> SignalPipe<In, Out> for TransformPipe<In, Out>
where
    In: Send + Sync + 'static,
    Out: Send + Sync + 'static,
{
    fn write(&self, envelope: SignalEnvelope<In>) {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(signal = %envelope.name, "write on closed pipe; discarding");
            return;
        }
        let _ = self.input_tx.send(PipeInput::Item(envelope));
    }

    async fn read(&self) -> Option<SignalEnvelope<Out>> {
        self.output_rx.lock().await.recv().await
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.input_tx.send(PipeInput::Close);
        }
    }
}
