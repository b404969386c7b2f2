//! Run a single pipeline in-process and print the outcome.

use std::path::Path;

use anyhow::{Context, Result, bail};

use pipewright::config::Config;
use pipewright::handlers::v1::RunResponse;
use pipewright::pipeline::RunRequest;

pub async fn run(config_path: &str, url: &str, email: &str, secret: Option<String>) -> Result<()> {
    let config = Config::load(config_path).await?;
    let Some(secret) = secret.or_else(|| config.server.secret.clone()) else {
        bail!("No secret configured; set server.secret or pass --secret");
    };

    let (orchestrator, _store) = super::build_orchestrator(&config, Path::new(config_path))?;
    let request = RunRequest {
        email: email.to_string(),
        secret,
        url: url.to_string(),
    };

    let report = orchestrator.run(&request).await?;
    let response = RunResponse::from(report);
    let json = serde_json::to_string_pretty(&response).context("Failed to serialize result")?;
    println!("{json}");
    Ok(())
}
