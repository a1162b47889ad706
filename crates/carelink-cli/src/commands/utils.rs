use anyhow::{Context, Result};
use carelink_application::HybridChatService;
use carelink_core::conversation::{MessageResponse, OutboundUserMessage, Provenance};
use carelink_infrastructure::{AssistantConfigLoader, CarelinkPaths};
use carelink_interaction::RuleBasedResponder;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Global flags shared by every command.
pub struct ServiceOptions {
    pub config_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

impl ServiceOptions {
    pub fn paths(&self) -> CarelinkPaths {
        CarelinkPaths::new(self.config_dir.as_deref())
    }
}

/// Loads the configuration and builds the orchestrator with the rule-based
/// local responder.
pub async fn build_service(options: &ServiceOptions) -> Result<HybridChatService> {
    let loader = AssistantConfigLoader::new(&options.paths())
        .context("Failed to locate the configuration directory")?;
    let mut config = loader
        .load()
        .await
        .context("Failed to load assistant configuration")?;

    if let Some(secs) = options.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let service = HybridChatService::from_config(config, Arc::new(RuleBasedResponder::default()))
        .context("Failed to build the chat service")?;
    Ok(service)
}

pub fn build_message(
    text: impl Into<String>,
    caller: Option<&str>,
    location: Option<&str>,
) -> OutboundUserMessage {
    let mut message = OutboundUserMessage::new(text);
    if let Some(caller) = caller {
        message = message.with_caller_id(caller);
    }
    if let Some(location) = location {
        message = message.with_location(location);
    }
    message
}

/// Prints a response, tagged and colored by provenance.
pub fn print_response(response: &MessageResponse) {
    let tag = match response.provenance {
        Provenance::Remote => "[remote]".bright_magenta(),
        Provenance::Local => "[local]".bright_yellow(),
    };
    println!("{}", tag);
    for line in response.text.lines() {
        println!("{}", line.bright_blue());
    }

    let metadata = &response.metadata;
    let mut details = vec![format!("{} ms", metadata.duration.as_millis())];
    if let Some(model) = &metadata.model {
        details.push(model.clone());
    }
    if let Some(reason) = &metadata.fallback_reason {
        details.push(format!("fallback: {}", reason));
    }
    println!("{}", details.join(" · ").bright_black());
}
