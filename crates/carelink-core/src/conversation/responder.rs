//! Local deterministic responder seam.

use super::message::OutboundUserMessage;
use crate::error::Result;

/// Text shown when the local responder fails.
pub const APOLOGY_TEXT: &str = "Desculpe, não consegui processar sua mensagem agora. \
Tente novamente em instantes ou fale com a equipe de suporte.";

/// Produces a reply from the message text and its context, without network I/O.
///
/// Implementations should never fail, but the orchestrator still maps an
/// `Err` (or a panic) to [`APOLOGY_TEXT`].
#[async_trait::async_trait]
pub trait LocalResponder: Send + Sync {
    async fn generate(&self, message: &OutboundUserMessage) -> Result<String>;
}
