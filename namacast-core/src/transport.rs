//! Chat transport trait seam.

use async_trait::async_trait;

use crate::chat::RawEvent;
use crate::error::Result;
use crate::program::ConnectionCoordinates;

/// One live connection to a message server thread.
#[async_trait]
pub trait ChatConnection: Send {
    /// Ask the server to replay recent backlog comments before streaming
    /// new ones. Called once, immediately after connecting.
    async fn request_backlog(&mut self) -> Result<()>;

    /// Receive the next event from the server.
    ///
    /// Returns `None` when the server closes the stream. Must be
    /// cancellation safe: dropping the future before it resolves must not
    /// lose an event.
    async fn recv(&mut self) -> Option<Result<RawEvent>>;
}

/// Trait for establishing chat connections to a message server.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Open a connection to the room identified by `coordinates`.
    async fn connect(&self, coordinates: &ConnectionCoordinates)
        -> Result<Box<dyn ChatConnection>>;
}
