//! Conversation domain: remote thread model, message contracts, the
//! transport and responder seams, and reply sanitization.

pub mod message;
pub mod model;
pub mod responder;
pub mod sanitizer;
pub mod transport;

pub use message::{MessageResponse, OutboundUserMessage, Provenance, ResponseMetadata};
pub use model::{
    AssistantInfo, MessageContent, MessageRole, RunJob, RunStatus, ThreadHandle, ThreadMessage,
};
pub use responder::{APOLOGY_TEXT, LocalResponder};
pub use sanitizer::sanitize;
pub use transport::AssistantsTransport;
