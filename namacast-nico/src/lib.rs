//! niconico adapters for namacast.
//!
//! This crate binds the provider-agnostic engines in `namacast-core` to the
//! real niconico services: the user-program ("unama") HTTP API, the
//! community profile API, the nicoad statistics API, and the comment
//! message server reachable over WebSocket.
//!
//! Authentication is a `user_session` cookie taken from a logged-in
//! niconico web session.

mod api;
mod classify;
mod transport;

pub use api::NicoApi;
pub use classify::NicoClassifier;
pub use transport::NicoChatTransport;
