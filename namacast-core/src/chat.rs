//! Comment stream message types and classification.

use serde::Deserialize;

/// Broadcaster command that asks the viewer to drop its chat connection.
pub const DISCONNECT_COMMAND: &str = "/disconnect";

/// Minimum `premium` level that marks a message as provider-originated.
///
/// Levels 2 and 3 are reserved for the message server itself and for
/// broadcaster-side tooling; ordinary viewers are 0 (free) or 1 (premium).
pub const PREMIUM_SYSTEM_THRESHOLD: i32 = 2;

/// One chat message as delivered by the message server.
///
/// Every field is optional on the wire, so all fields default.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ChatPayload {
    /// Thread the message belongs to
    #[serde(default)]
    pub thread: String,
    /// Comment number within the thread
    #[serde(default)]
    pub no: i64,
    /// Playback position in centiseconds from program start
    #[serde(default)]
    pub vpos: i64,
    /// Unix time the message was posted
    #[serde(default)]
    pub date: i64,
    /// Sub-second component of `date` in microseconds
    #[serde(default)]
    pub date_usec: i64,
    /// Raw command string ("mail") attached by the poster
    #[serde(default)]
    pub mail: String,
    /// Poster identifier (numeric or anonymized hash)
    #[serde(default)]
    pub user_id: String,
    /// Poster class: 0 free, 1 premium, 2 and 3 system
    #[serde(default)]
    pub premium: i32,
    /// 1 when the poster is anonymized
    #[serde(default)]
    pub anonymity: i32,
    /// Message body
    #[serde(default)]
    pub content: String,
}

impl ChatPayload {
    /// Whether this message is a system-issued disconnect order.
    ///
    /// Only the message server and broadcaster tooling may issue it; the
    /// same text from an ordinary viewer is just a comment.
    #[must_use]
    pub fn is_disconnect_command(&self) -> bool {
        self.content == DISCONNECT_COMMAND && self.premium >= PREMIUM_SYSTEM_THRESHOLD
    }
}

/// Acknowledgement sent by the message server when a thread is joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ThreadResult {
    /// Zero on success; any other value means the thread was refused
    #[serde(rename = "resultcode", default)]
    pub result_code: i32,
}

/// One event decoded off the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// Thread join acknowledgement
    Thread(ThreadResult),
    /// A chat message
    Chat(ChatPayload),
    /// The server is detaching us from the thread
    Leave,
}

/// Classified category of a chat entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatKind {
    /// Ordinary viewer comment
    Normal,
    /// Broadcaster-side comment
    Operator,
    /// Advertisement notice
    Nicoad,
    /// Gift notice
    Gift,
    /// Score/ranking notice
    Spi,
    /// Quotation notice
    Quote,
    /// Cruise notice
    Cruise,
    /// General informational notice
    Info,
    /// System message of an unrecognized kind
    Unknown,
    /// Locally generated status line, never received from the server
    Synthetic,
}

impl ChatKind {
    /// Get the string identifier used in logs and rendered output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Operator => "operator",
            Self::Nicoad => "nicoad",
            Self::Gift => "gift",
            Self::Spi => "spi",
            Self::Quote => "quote",
            Self::Cruise => "cruise",
            Self::Info => "info",
            Self::Unknown => "unknown",
            Self::Synthetic => "synthetic",
        }
    }
}

impl std::fmt::Display for ChatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locally generated status line inserted into the chat log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticNotice {
    /// Status text
    pub content: String,
    /// Unix time the notice was generated
    pub date: i64,
}

/// Body of a chat log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatValue {
    /// A message received from the message server
    Received(ChatPayload),
    /// A locally generated status line
    Synthetic(SyntheticNotice),
}

/// One entry of the chat log: a received message or synthetic notice,
/// classified and stamped with a log-wide sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedChat {
    /// Position in the chat log, starting from zero
    pub seq_id: u64,
    /// Classified category
    pub kind: ChatKind,
    /// Entry body
    pub value: ChatValue,
}

impl WrappedChat {
    /// Text content of the entry.
    #[must_use]
    pub fn content(&self) -> &str {
        match &self.value {
            ChatValue::Received(payload) => &payload.content,
            ChatValue::Synthetic(notice) => &notice.content,
        }
    }

    /// Unix time the entry was posted or generated.
    #[must_use]
    pub const fn date(&self) -> i64 {
        match &self.value {
            ChatValue::Received(payload) => payload.date,
            ChatValue::Synthetic(notice) => notice.date,
        }
    }
}

/// Trait for provider-specific chat message classification.
pub trait ChatClassifier: Send + Sync {
    /// Decide the category of a received message.
    fn classify(&self, payload: &ChatPayload) -> ChatKind;
}
