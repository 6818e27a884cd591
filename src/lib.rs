//! # signal-relay
//!
//! Signal dispatch and transformation layer for real-time video sessions.
//!
//! A *signal* is a small named application message carried over a video
//! session's side channel (chat lines, annotations, remote control, custom
//! protocols). This crate is the machinery between the session transport and
//! application listeners:
//!
//! ```text
//!   transport ──► SignalSession::receive_signal
//!                        │
//!               [input SignalPipe ──► PipeRunner]     optional, hot-swappable
//!                        │
//!                  SignalRegistry ──► WorkerPool ──► resilient listeners
//!
//!   SignalSession::send ──► [output SignalPipe ──► PipeRunner] ──► transport
//! ```
//!
//! Design invariants:
//!
//! - the transport delivery thread is never blocked: dispatch hands every
//!   listener invocation to a floor-bounded, dynamically growing
//!   [`WorkerPool`] as its own task;
//! - pipes are swappable mid-flight without losing or duplicating signals
//!   (the old pipe is closed and drained before the new one is read);
//! - failures stay contained: a malformed signal costs only itself, a failing
//!   listener costs only its own delivery (dropped by [`UnfailingListener`]
//!   or parked for replay by [`PausableListener`]), and nothing in this crate
//!   is fatal to the process.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use signal_relay::{
//!     ConnectionId, ListenerError, SendError, SignalEnvelope, SignalListener, SignalSession,
//!     SignalTransport,
//! };
//!
//! struct SdkTransport; // wraps the vendor video SDK
//!
//! #[async_trait]
//! impl SignalTransport for SdkTransport {
//!     async fn send_signal(
//!         &self,
//!         name: &str,
//!         payload: String,
//!         destination: Option<&ConnectionId>,
//!     ) -> Result<(), SendError> {
//!         // hand off to the SDK session here
//!         Ok(())
//!     }
//! }
//!
//! struct ChatListener;
//!
//! #[async_trait]
//! impl SignalListener<String> for ChatListener {
//!     async fn on_signal(
//!         &self,
//!         envelope: Arc<SignalEnvelope<String>>,
//!         is_self: bool,
//!     ) -> Result<(), ListenerError> {
//!         if !is_self {
//!             println!("{}: {}", envelope.name, envelope.payload);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() {
//! let session: SignalSession<String> = SignalSession::new(Arc::new(SdkTransport));
//! session.register_listener("chat", Arc::new(ChatListener));
//! session.send("chat", "hello".to_string(), None).await.unwrap();
//! # }
//! ```

pub mod listener;
pub mod pipe;
pub mod pool;
pub mod registry;
pub mod session;
pub mod signal;

pub use listener::{ListenerError, PausableListener, SignalListener, UnfailingListener};
pub use pipe::{PipeRunner, SignalPipe, SignalSink, SignalTransform, TransformError, TransformPipe};
pub use pool::WorkerPool;
pub use registry::SignalRegistry;
pub use session::{SendError, SessionConfig, SignalSession, SignalTransport};
pub use signal::{ConnectionId, SignalEnvelope, WILDCARD};
