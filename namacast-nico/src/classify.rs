//! Slash-command grammar for classifying comment stream messages.

use namacast_core::chat::PREMIUM_SYSTEM_THRESHOLD;
use namacast_core::{ChatClassifier, ChatKind, ChatPayload};

/// `premium` level of broadcaster-authored comments.
const OPERATOR_PREMIUM: i32 = 3;

/// Classifies comments by the niconico slash-command grammar.
#[derive(Debug, Default)]
pub struct NicoClassifier;

impl NicoClassifier {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn command_kind(command: &str) -> Option<ChatKind> {
    match command {
        "/nicoad" => Some(ChatKind::Nicoad),
        "/gift" => Some(ChatKind::Gift),
        "/spi" => Some(ChatKind::Spi),
        "/quote" => Some(ChatKind::Quote),
        "/cruise" => Some(ChatKind::Cruise),
        "/info" => Some(ChatKind::Info),
        _ => None,
    }
}

impl ChatClassifier for NicoClassifier {
    fn classify(&self, payload: &ChatPayload) -> ChatKind {
        let first_token = payload.content.split_whitespace().next().unwrap_or("");
        if first_token.starts_with('/') {
            if let Some(kind) = command_kind(first_token) {
                return kind;
            }
            // A command only carries weight when the server or broadcaster
            // tooling sent it; a viewer typing a slash is just chatting.
            if payload.premium >= PREMIUM_SYSTEM_THRESHOLD {
                return ChatKind::Unknown;
            }
            return ChatKind::Normal;
        }
        if payload.premium == OPERATOR_PREMIUM {
            return ChatKind::Operator;
        }
        ChatKind::Normal
    }
}
