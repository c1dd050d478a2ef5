//! Motorcrew command implementations

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use motorcrew_agent::tools::register_default_tools;
use motorcrew_agent::ToolRegistry;
use motorcrew_config::{self, Config};
use motorcrew_crew::automobile::{self, Roster};
use motorcrew_provider::OpenAiProvider;

pub struct RunOptions {
    pub subject: Option<String>,
    pub config: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

/// Research a vehicle and print the final report
pub async fn run_command(options: RunOptions) -> Result<()> {
    let mut config = Config::load_with(options.config.as_deref()).await?;
    if let Some(dir) = options.output_dir {
        config.crew.output_dir = dir.to_string_lossy().into_owned();
    }
    config.validate()?;

    let subject = options
        .subject
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| config.crew.default_subject.clone());

    let output_dir = config.output_dir();
    if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
        warn!("◆ CANNOT CREATE OUTPUT DIR {}: {}", output_dir.display(), e);
    }

    let provider = OpenAiProvider::new(
        config.model.api_key.clone(),
        config.model.api_base.clone(),
        Some(config.model.name.clone()),
    )
    .with_timeout(Duration::from_secs(config.model.timeout_secs))
    .with_max_retries(config.model.max_retries);

    let mut registry = ToolRegistry::new();
    register_default_tools(&mut registry, &config)?;

    let roster = Roster::build(Arc::new(provider), Arc::new(registry), &config)?;
    let crew = automobile::crew_for(&subject, &roster, &config)?;

    let token = crew.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("◆ INTERRUPTED, STOPPING CREW");
            token.cancel();
        }
    });

    let output = crew
        .kickoff(&subject)
        .await
        .with_context(|| format!("research on {} did not complete", subject))?;
    automobile::review_report(&output).await;

    println!("{}", output.result);

    match &output.persistence {
        Some(e) => eprintln!("{}", e),
        None => {
            for path in &output.artifacts {
                info!("◆ CHECK THE GENERATED REPORT: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Write a default config file
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing Motorcrew...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = motorcrew_config::init().await?;
    let path = motorcrew_config::config_path();

    println!("Config:   {}", path.display());
    println!("Model:    {}", config.model.name);
    println!("Subject:  {}", config.crew.default_subject);

    println!("\n◆ Motorcrew initialized");
    println!("\nNext steps:");
    println!(
        "  1. Add your API key to {} or set {}",
        path.display(),
        motorcrew_config::API_KEY_ENV
    );
    println!("  2. Run a crew: motorcrew \"Tesla Model 3\"");

    Ok(())
}

/// Show configuration and credential status
pub async fn status_command(config_path: Option<&Path>) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(motorcrew_config::config_path);

    println!("◆ Motorcrew Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Config:   {} {}",
        path.display(),
        if path.exists() { "[OK]" } else { "[Missing]" }
    );

    let config = Config::load_with(config_path)
        .await
        .context("failed to load configuration")?;

    println!("Model:    {}", config.model.name);
    println!(
        "API Base: {}",
        config
            .model
            .api_base
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
    );
    println!(
        "API Key:  {}",
        if config.has_api_key() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!("Process:  {}", config.crew.process);
    println!("Output:   {}", config.output_dir().display());
    println!("Subject:  {}", config.crew.default_subject);

    match config.validate() {
        Ok(()) => println!("\n◆ Ready"),
        Err(e) => println!("\n{}", e),
    }

    Ok(())
}
