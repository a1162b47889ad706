//! Application layer: the hybrid orchestrator that decides between the
//! remote assistant and the local responder.

pub mod hybrid_chat_service;
pub mod remote_health;

pub use hybrid_chat_service::HybridChatService;
pub use remote_health::RemoteHealth;
