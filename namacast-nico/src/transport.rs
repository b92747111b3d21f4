//! WebSocket transport for the niconico comment message server.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use namacast_core::{
    ChatConnection, ChatPayload, ChatTransport, ConnectionCoordinates, CoreError, RawEvent, Result,
    ThreadResult,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

/// Number of backlog comments requested when joining a thread.
const BACKLOG_COMMENTS: i64 = 150;
/// Thread protocol version expected by the message server.
const THREAD_VERSION: &str = "20061206";

/// Opens WebSocket connections to message server rooms.
#[derive(Debug, Default)]
pub struct NicoChatTransport;

impl NicoChatTransport {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatTransport for NicoChatTransport {
    async fn connect(&self, coordinates: &ConnectionCoordinates) -> Result<Box<dyn ChatConnection>> {
        let url = Url::parse(&coordinates.room_url)
            .map_err(|e| CoreError::InvalidUrl(format!("{}: {e}", coordinates.room_url)))?;

        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| CoreError::Transport {
                reason: e.to_string(),
            })?;
        debug!("Message server handshake status: {}", response.status());

        Ok(Box::new(NicoChatConnection {
            stream,
            thread_id: coordinates.room_thread_id.clone(),
        }))
    }
}

struct NicoChatConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    thread_id: String,
}

#[async_trait]
impl ChatConnection for NicoChatConnection {
    async fn request_backlog(&mut self) -> Result<()> {
        debug!("Joining thread {}", self.thread_id);
        let frame = backlog_request_frame(&self.thread_id);
        self.stream
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| CoreError::Transport {
                reason: e.to_string(),
            })
    }

    // `StreamExt::next` only consumes a frame when it yields one, so
    // dropping this future between polls cannot lose an event.
    async fn recv(&mut self) -> Option<Result<RawEvent>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                    ParsedFrame::Event(event) => return Some(Ok(event)),
                    ParsedFrame::Heartbeat => {}
                    ParsedFrame::Unrecognized => {
                        debug!("Skipping unrecognized frame: {text}");
                    }
                },
                Some(Ok(Message::Close(_))) => return None,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Some(Err(CoreError::Transport {
                        reason: e.to_string(),
                    }));
                }
                None => return None,
            }
        }
    }
}

/// Thread-join request. The surrounding pings let the server echo back
/// markers that bracket the replayed backlog.
fn backlog_request_frame(thread_id: &str) -> serde_json::Value {
    json!([
        { "ping": { "content": "rs:0" } },
        { "ping": { "content": "ps:0" } },
        {
            "thread": {
                "thread": thread_id,
                "version": THREAD_VERSION,
                "user_id": "guest",
                "res_from": -BACKLOG_COMMENTS,
                "with_global": 1,
                "scores": 1,
                "nicoru": 0,
            }
        },
        { "ping": { "content": "pf:0" } },
        { "ping": { "content": "rf:0" } },
    ])
}

/// One frame as sent by the message server, keyed by its single top-level
/// field.
#[derive(Debug, Deserialize)]
enum ServerFrame {
    #[serde(rename = "thread")]
    Thread(ThreadResult),
    #[serde(rename = "chat")]
    Chat(ChatPayload),
    #[serde(rename = "leave_thread")]
    Leave(serde_json::Value),
    #[serde(rename = "ping")]
    Ping(serde_json::Value),
}

enum ParsedFrame {
    Event(RawEvent),
    Heartbeat,
    Unrecognized,
}

fn parse_frame(text: &str) -> ParsedFrame {
    match serde_json::from_str::<ServerFrame>(text) {
        Ok(ServerFrame::Thread(result)) => ParsedFrame::Event(RawEvent::Thread(result)),
        Ok(ServerFrame::Chat(payload)) => ParsedFrame::Event(RawEvent::Chat(payload)),
        Ok(ServerFrame::Leave(_)) => ParsedFrame::Event(RawEvent::Leave),
        Ok(ServerFrame::Ping(_)) => ParsedFrame::Heartbeat,
        Err(_) => ParsedFrame::Unrecognized,
    }
}
