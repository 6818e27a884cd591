//! Swappable signal transformation pipes
//!
//! A pipe is a pluggable, possibly stateful transformation stage sitting
//! between raw wire signals and application-visible signals. The relay never
//! builds protocol logic in; applications supply a [`SignalTransform`] and the
//! relay runs it.
//!
//! # Architecture
//!
//! ```text
//!    write()                 TransformPipe                    PipeRunner
//!   ─────────►  [input queue] ──► transform() ──► [output queue] ──► read()
//!                                  (own task)                         │
//!                                                                     ▼
//!                                                          SignalSink::deliver
//!                                                     (registry dispatch, or
//!                                                      transport send)
//! ```
//!
//! The runner drains the pipe's output on its own task and supports hot
//! swapping the bound pipe via [`PipeRunner::switch_pipe`]: the old pipe is
//! closed and drained to its last buffered envelope before the runner moves
//! on to the new one, so nothing in flight is lost or duplicated.

pub mod protocol;
pub mod runner;
pub mod transform;

pub use protocol::{SignalPipe, SignalSink};
pub use runner::PipeRunner;
pub use transform::{SignalTransform, TransformError, TransformPipe};
