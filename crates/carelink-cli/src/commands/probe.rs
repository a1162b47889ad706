use anyhow::Result;
use carelink_interaction::ProbeStrategy;
use colored::Colorize;

use super::utils::{ServiceOptions, build_service};

pub async fn run(options: &ServiceOptions, throwaway_thread: bool) -> Result<()> {
    let strategy = if throwaway_thread {
        ProbeStrategy::ThrowawayThread
    } else {
        ProbeStrategy::AssistantLookup
    };
    let service = build_service(options).await?.with_probe_strategy(strategy);

    if !service.remote_enabled() {
        println!("{}", "No credential configured: local responses only.".yellow());
        return Ok(());
    }

    if service.is_remote_available().await {
        println!("{}", "Remote assistant is available.".bright_green());
    } else {
        println!("{}", "Remote assistant is unavailable.".red());
        std::process::exit(1);
    }

    Ok(())
}
