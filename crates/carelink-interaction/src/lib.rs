//! Remote and local collaborators of the hybrid assistant.

pub mod assistants_api_client;
pub mod availability;
pub mod local_responder;
pub mod session_client;

pub use assistants_api_client::AssistantsApiClient;
pub use availability::{AvailabilityProber, ProbeStrategy};
pub use local_responder::{KnowledgeRule, Portal, RuleBasedResponder};
pub use session_client::RemoteSessionClient;
