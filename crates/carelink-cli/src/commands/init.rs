use anyhow::{Context, Result};
use colored::Colorize;

use super::utils::ServiceOptions;

pub fn run(options: &ServiceOptions) -> Result<()> {
    let path = options
        .paths()
        .ensure_secret_file()
        .context("Failed to create secret file")?;

    println!("{}", format!("Secret file: {}", path.display()).bright_green());
    println!(
        "{}",
        "Fill in assistant.api_key and assistant.assistant_id to enable the remote assistant."
            .bright_black()
    );
    Ok(())
}
