//! Signal envelope types
//!
//! A signal is a small, named, addressed application message exchanged over a
//! real-time video session's side channel. This module defines the envelope
//! that carries one signal through the relay: from the transport boundary,
//! optionally through a transformation pipe, and out to registered listeners.
//!
//! Envelopes are immutable after creation; they are constructed once at the
//! transport boundary (or at `send`) and shared behind `Arc` during fan-out.

/// Reserved subscription key matched against every dispatched signal name.
///
/// Never a real topic: registering a listener under `WILDCARD` subscribes it
/// to all signals, regardless of name.
pub const WILDCARD: &str = "*";

/// Identifier of a participant connection in the video session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a new connection id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The unit of dispatch: one named, addressed, payload-carrying signal
///
/// Raw wire payloads are always text, but a transformation pipe may turn the
/// payload into any application value, so the payload type is generic and may
/// differ between the input and output ends of a pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEnvelope<T> {
    /// Originating participant; `None` for self-originated or system signals
    pub source: Option<ConnectionId>,

    /// Targeted participant; `None` means broadcast
    pub destination: Option<ConnectionId>,

    /// Signal topic (never [`WILDCARD`])
    pub name: String,

    /// Signal payload
    pub payload: T,
}

impl<T> SignalEnvelope<T> {
    /// Create an envelope with explicit addressing
    pub fn new(
        source: Option<ConnectionId>,
        destination: Option<ConnectionId>,
        name: impl Into<String>,
        payload: T,
    ) -> Self {
        Self {
            source,
            destination,
            name: name.into(),
            payload,
        }
    }

    /// Create an inbound envelope as received at the transport boundary
    pub fn inbound(
        source: Option<ConnectionId>,
        destination: Option<ConnectionId>,
        name: impl Into<String>,
        payload: T,
    ) -> Self {
        Self::new(source, destination, name, payload)
    }

    /// Create an outbound envelope originated by the local application
    ///
    /// The source is always `None`: the transport stamps the real connection
    /// id on the wire.
    pub fn outbound(name: impl Into<String>, payload: T, destination: Option<ConnectionId>) -> Self {
        Self::new(None, destination, name, payload)
    }

    /// Whether this envelope targets every participant
    pub fn is_broadcast(&self) -> bool {
        self.destination.is_none()
    }

    /// Rewrap the payload, keeping name and addressing intact
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SignalEnvelope<U> {
        SignalEnvelope {
            source: self.source,
            destination: self.destination,
            name: self.name,
            payload: f(self.payload),
        }
    }
}
