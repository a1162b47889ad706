//! Availability Prober: a cheap check that the remote assistant is reachable
//! and the credential is accepted.

use carelink_core::config::AssistantConfig;
use carelink_core::conversation::AssistantsTransport;
use std::sync::Arc;
use std::time::Duration;

/// Which remote call proves availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeStrategy {
    /// Look up the configured assistant. No side effects.
    #[default]
    AssistantLookup,
    /// Create a thread and delete it again. Leaves a stray thread behind if
    /// the delete fails.
    ThrowawayThread,
}

pub struct AvailabilityProber {
    transport: Option<Arc<dyn AssistantsTransport>>,
    strategy: ProbeStrategy,
    timeout: Duration,
}

impl AvailabilityProber {
    /// Creates a prober. Without a credential in `config` the transport is
    /// never touched and every probe reports `false`.
    pub fn new(transport: Arc<dyn AssistantsTransport>, config: &AssistantConfig) -> Self {
        Self {
            transport: config.has_credential().then_some(transport),
            strategy: ProbeStrategy::default(),
            timeout: config.timeout(),
        }
    }

    /// A prober that always reports the remote service as unavailable.
    pub fn disabled() -> Self {
        Self {
            transport: None,
            strategy: ProbeStrategy::default(),
            timeout: Duration::ZERO,
        }
    }

    pub fn with_strategy(mut self, strategy: ProbeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Returns whether the remote service answered the probe successfully.
    ///
    /// Never fails: errors and timeouts map to `false`.
    pub async fn probe(&self) -> bool {
        let Some(transport) = &self.transport else {
            return false;
        };

        let check = async {
            match self.strategy {
                ProbeStrategy::AssistantLookup => transport.retrieve_assistant().await.map(|_| ()),
                ProbeStrategy::ThrowawayThread => {
                    let thread = transport.create_thread().await?;
                    if let Err(e) = transport.delete_thread(&thread).await {
                        tracing::debug!(thread_id = %thread, error = %e, "Could not delete probe thread");
                    }
                    Ok(())
                }
            }
        };

        match tokio::time::timeout(self.timeout, check).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::info!(error = %e, "Remote assistant probe failed");
                false
            }
            Err(_) => {
                tracing::info!(timeout = ?self.timeout, "Remote assistant probe timed out");
                false
            }
        }
    }
}
