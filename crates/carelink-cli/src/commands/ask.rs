use anyhow::{Context, Result};

use super::utils::{ServiceOptions, build_message, build_service, print_response};

pub async fn run(
    options: &ServiceOptions,
    text: String,
    caller: Option<String>,
    location: Option<String>,
    json: bool,
) -> Result<()> {
    let service = build_service(options).await?;
    let message = build_message(text, caller.as_deref(), location.as_deref());

    let response = service.send_message(message).await;

    if json {
        let rendered =
            serde_json::to_string_pretty(&response).context("Failed to serialize response")?;
        println!("{}", rendered);
    } else {
        print_response(&response);
    }

    Ok(())
}
