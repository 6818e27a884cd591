//! Transport seam
//!
//! The relay never touches the wire itself. The embedding application
//! supplies a [`SignalTransport`] backed by the real video-session SDK; the
//! relay calls it for every outbound signal, either directly or from an
//! output pipe runner's delivery task.

use async_trait::async_trait;

use crate::signal::ConnectionId;

/// Error returned by a transport that could not send a signal
#[derive(Debug, Clone)]
pub enum SendError {
    /// The underlying session is not connected
    NotConnected,
    /// The transport rejected or failed the send
    Transport(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::NotConnected => write!(f, "session not connected"),
            SendError::Transport(reason) => write!(f, "transport send failed: {}", reason),
        }
    }
}

impl std::error::Error for SendError {}

/// Outbound side of the external video-session transport
#[async_trait]
pub trait SignalTransport: Send + Sync {
    /// Send one application signal over the session's side channel
    ///
    /// `destination` of `None` broadcasts to every participant. Wire
    /// payloads are always text.
    async fn send_signal(
        &self,
        name: &str,
        payload: String,
        destination: Option<&ConnectionId>,
    ) -> Result<(), SendError>;
}
