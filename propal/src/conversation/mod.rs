//! Client side of the chat stream.

pub mod controller;
pub mod message;
pub mod transport;

pub use controller::{ChatError, ChatStatus, ConversationController, TurnOutcome};
pub use message::{apply_event, tool_calls_settled};
pub use transport::{ChatTransport, EventStream, HttpChatTransport, TransportError};
