//! Comment stream engine and its append-only chat log.
//!
//! The engine follows the program engine's state notifications: whenever a
//! state change carries connection coordinates it tears down any existing
//! chat connection and opens a fresh one. Incoming events are coalesced over
//! a short window, classified, numbered, and appended to the [`ChatLog`];
//! stream failures become synthetic log entries rather than errors.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chat::{
    ChatClassifier, ChatKind, ChatPayload, ChatValue, RawEvent, SyntheticNotice, WrappedChat,
};
use crate::engine::{ProgramEngine, ProgramEvent};
use crate::error::CoreError;
use crate::program::ConnectionCoordinates;
use crate::time::now_unix;
use crate::transport::{ChatConnection, ChatTransport};

/// How long incoming events are coalesced before being appended as a batch.
pub const CHAT_FLUSH_WINDOW: Duration = Duration::from_millis(100);

/// Synthetic notice appended whenever a stream terminates.
pub const NOTICE_CONNECTION_ENDED: &str = "connection ended";

/// Synthetic notice appended when the thread refuses us or detaches us.
pub const NOTICE_RETRIEVAL_FAILED: &str = "failed to retrieve comments";

struct ChatLogInner {
    entries: Vec<WrappedChat>,
    next_seq: u64,
}

/// Ordered, append-only log of classified chat entries.
///
/// Sequence numbers start at zero and keep increasing for the lifetime of
/// the log; reconnects and [`clear`](ChatLog::clear) never rewind them.
pub struct ChatLog {
    inner: RwLock<ChatLogInner>,
    tx: broadcast::Sender<Vec<WrappedChat>>,
}

impl ChatLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(256);
        Arc::new(Self {
            inner: RwLock::new(ChatLogInner {
                entries: Vec::new(),
                next_seq: 0,
            }),
            tx,
        })
    }

    /// Subscribe to appended batches.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<WrappedChat>> {
        self.tx.subscribe()
    }

    /// Append a batch of received messages in order, assigning sequence
    /// numbers. An empty batch appends and notifies nothing.
    pub async fn append_received(&self, batch: Vec<(ChatKind, ChatPayload)>) {
        if batch.is_empty() {
            return;
        }

        let mut inner = self.inner.write().await;
        let mut appended = Vec::with_capacity(batch.len());
        for (kind, payload) in batch {
            let entry = WrappedChat {
                seq_id: inner.next_seq,
                kind,
                value: ChatValue::Received(payload),
            };
            inner.next_seq += 1;
            appended.push(entry.clone());
            inner.entries.push(entry);
        }
        drop(inner);

        let _ = self.tx.send(appended);
    }

    /// Append one synthetic notice stamped with the current wall-clock time.
    pub async fn append_synthetic(&self, content: impl Into<String>) {
        let notice = SyntheticNotice {
            content: content.into(),
            date: now_unix(),
        };

        let mut inner = self.inner.write().await;
        let entry = WrappedChat {
            seq_id: inner.next_seq,
            kind: ChatKind::Synthetic,
            value: ChatValue::Synthetic(notice),
        };
        inner.next_seq += 1;
        inner.entries.push(entry.clone());
        drop(inner);

        let _ = self.tx.send(vec![entry]);
    }

    /// Append the standard pair of notices for a failed connection.
    pub async fn append_connection_error(&self, error: &CoreError) {
        self.append_synthetic(format!("an error occurred: {error}"))
            .await;
        self.append_synthetic(NOTICE_CONNECTION_ENDED).await;
    }

    /// Get a copy of all entries.
    pub async fn snapshot(&self) -> Vec<WrappedChat> {
        self.inner.read().await.entries.clone()
    }

    /// Number of entries currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the log holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Drop all entries. The sequence counter keeps counting, so entries
    /// appended afterwards never reuse an already-issued number.
    pub async fn clear(&self) {
        self.inner.write().await.entries.clear();
    }
}

struct ActiveConnection {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Engine that mirrors the tracked program's comment stream into a log.
pub struct CommentEngine {
    program: Arc<ProgramEngine>,
    transport: Arc<dyn ChatTransport>,
    classifier: Arc<dyn ChatClassifier>,
    log: Arc<ChatLog>,
    active: Mutex<Option<ActiveConnection>>,
    cancel_token: CancellationToken,
}

impl CommentEngine {
    /// Create a new comment engine
    ///
    /// # Arguments
    /// * `program` - Program engine to follow for connection coordinates
    /// * `transport` - Transport used to reach the message server
    /// * `classifier` - Classifier assigning a kind to each received message
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    pub fn new(
        program: Arc<ProgramEngine>,
        transport: Arc<dyn ChatTransport>,
        classifier: Arc<dyn ChatClassifier>,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            program,
            transport,
            classifier,
            log: ChatLog::new(),
            active: Mutex::new(None),
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    /// Get the chat log this engine appends to
    #[must_use]
    pub fn log(&self) -> Arc<ChatLog> {
        self.log.clone()
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Whether a chat connection is currently being pumped
    pub async fn is_connected(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    /// Start the comment engine in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the notification loop
    async fn run(&self) {
        info!("Initializing comment stream handler");

        let mut rx = self.program.subscribe();

        // The program may already expose a room by the time we start
        let state = self.program.snapshot().await;
        if let Some(room) = state.room {
            self.reconnect(&room).await;
        }

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Comment stream engine shutting down");
                    self.disconnect().await;
                    break;
                }
                event = rx.recv() => {
                    match event {
                        Ok(ProgramEvent::StateChanged { state }) => {
                            if let Some(room) = state.room {
                                self.reconnect(&room).await;
                            }
                        }
                        Ok(ProgramEvent::StatisticsUpdated { .. }) => {
                            // Statistics never move the room
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            break;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("comment engine lagged behind program events, skipped {skipped}");
                        }
                    }
                }
            }
        }
    }

    /// Tear down any existing connection and open a fresh one, requesting
    /// the message backlog before streaming.
    ///
    /// Connection failures are not surfaced to the caller; they appear in
    /// the log as synthetic entries like any other stream failure.
    async fn reconnect(&self, room: &ConnectionCoordinates) {
        self.disconnect().await;

        let mut conn = match self.transport.connect(room).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("chat connection failed: {e}");
                self.log.append_connection_error(&e).await;
                return;
            }
        };

        if let Err(e) = conn.request_backlog().await {
            warn!("backlog request failed: {e}");
            self.log.append_connection_error(&e).await;
            return;
        }

        debug!("chat connection established, thread {}", room.room_thread_id);

        let token = self.cancel_token.child_token();
        let handle = tokio::spawn(pump_connection(
            conn,
            self.classifier.clone(),
            self.log.clone(),
            token.clone(),
        ));
        *self.active.lock().await = Some(ActiveConnection { token, handle });
    }

    /// Cancel the active connection's pump and wait for it to wind down.
    async fn disconnect(&self) {
        let Some(active) = self.active.lock().await.take() else {
            return;
        };
        active.token.cancel();
        if let Err(e) = active.handle.await {
            warn!("chat pump task failed: {e}");
        }
    }
}

/// Pump one connection until it terminates or is cancelled.
///
/// Received chats are coalesced into `pending` and flushed to the log on a
/// fixed tick; terminal conditions flush whatever is pending first, then
/// append their synthetic notices with real wall-clock timestamps.
async fn pump_connection(
    mut conn: Box<dyn ChatConnection>,
    classifier: Arc<dyn ChatClassifier>,
    log: Arc<ChatLog>,
    token: CancellationToken,
) {
    let mut pending: Vec<(ChatKind, ChatPayload)> = Vec::new();
    // First flush a full window after connecting, then on every window
    let mut flush = tokio::time::interval_at(
        tokio::time::Instant::now() + CHAT_FLUSH_WINDOW,
        CHAT_FLUSH_WINDOW,
    );
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => {
                // Torn down by the engine: no synthetic entries
                log.append_received(std::mem::take(&mut pending)).await;
                return;
            }
            _ = flush.tick() => {
                if !pending.is_empty() {
                    log.append_received(std::mem::take(&mut pending)).await;
                }
            }
            event = conn.recv() => {
                match event {
                    Some(Ok(RawEvent::Chat(payload))) => {
                        let kind = classifier.classify(&payload);
                        let disconnect = payload.is_disconnect_command();
                        pending.push((kind, payload));

                        if disconnect {
                            // The command itself is appended like any other
                            // message; only the connection goes away
                            info!("in-band disconnect command received");
                            log.append_received(std::mem::take(&mut pending)).await;
                            return;
                        }
                    }
                    Some(Ok(RawEvent::Thread(result))) => {
                        if result.result_code == 0 {
                            debug!("thread join acknowledged");
                        } else {
                            warn!("thread join refused, result code {}", result.result_code);
                            log.append_received(std::mem::take(&mut pending)).await;
                            log.append_synthetic(NOTICE_RETRIEVAL_FAILED).await;
                            log.append_synthetic(NOTICE_CONNECTION_ENDED).await;
                            return;
                        }
                    }
                    Some(Ok(RawEvent::Leave)) => {
                        warn!("detached from thread by the server");
                        log.append_received(std::mem::take(&mut pending)).await;
                        log.append_synthetic(NOTICE_RETRIEVAL_FAILED).await;
                        log.append_synthetic(NOTICE_CONNECTION_ENDED).await;
                        return;
                    }
                    Some(Err(e)) => {
                        warn!("chat stream error: {e}");
                        log.append_received(std::mem::take(&mut pending)).await;
                        log.append_connection_error(&e).await;
                        return;
                    }
                    None => {
                        log.append_received(std::mem::take(&mut pending)).await;
                        log.append_synthetic(NOTICE_CONNECTION_ENDED).await;
                        return;
                    }
                }
            }
        }
    }
}
