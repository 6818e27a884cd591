//! Signal listener registry and dispatch
//!
//! The registry is a publish/subscribe directory mapping signal name to
//! listener set, with `"*"` as the wildcard key matched against every name.
//! Dispatch fans a received envelope out to every matching listener as an
//! independent task on the registry's [`WorkerPool`], so the transport
//! delivery thread is never blocked and one slow or failing listener cannot
//! delay the others.
//!
//! [`WorkerPool`]: crate::pool::WorkerPool

pub mod store;

pub use store::SignalRegistry;
