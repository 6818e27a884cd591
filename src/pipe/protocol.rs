//! Pipe capability traits
//!
//! [`SignalPipe`] is the bidirectional transformation channel abstraction:
//! envelopes of the input type go in, envelopes of the output type come out,
//! in input order. [`SignalSink`] is the delivery callback a [`PipeRunner`]
//! invokes once per produced envelope.
//!
//! [`PipeRunner`]: crate::pipe::PipeRunner

use async_trait::async_trait;

use crate::signal::SignalEnvelope;

/// A swappable message-transformation channel
///
/// Implementations are free to buffer, reorder nothing, fan one input out
/// into several outputs, or swallow inputs entirely (e.g. while reassembling
/// a multipart message). [`TransformPipe`] is the reference implementation.
///
/// [`TransformPipe`]: crate::pipe::TransformPipe
#[async_trait]
pub trait SignalPipe<In, Out>: Send + Sync
where
    In: Send + Sync + 'static,
    Out: Send + Sync + 'static,
{
    /// Enqueue an envelope for transformation; never blocks, never fails
    /// synchronously
    ///
    /// Writes after [`close`](SignalPipe::close) are silently discarded.
    fn write(&self, envelope: SignalEnvelope<In>);

    /// Pop the next transformed envelope, waiting until one is available
    ///
    /// Returns `None` once the pipe has been closed *and* every buffered
    /// output has been drained; after that no more envelopes will ever be
    /// produced.
    async fn read(&self) -> Option<SignalEnvelope<Out>>;

    /// Signal that no more input will arrive; idempotent
    ///
    /// Previously written envelopes (and any in-flight transformation) still
    /// complete, after which blocked readers observe the closed sentinel.
    fn close(&self);
}

/// Delivery target for envelopes drained from a pipe
///
/// Sinks are expected to be self-contained: a failing delivery must be
/// absorbed (logged, suspended, dropped) inside the sink, never surfaced to
/// the runner draining the pipe.
#[async_trait]
pub trait SignalSink<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Deliver one envelope
    async fn deliver(&self, envelope: SignalEnvelope<T>);
}
