//! Overheard CLI entry point.
//!
//! Provides `start` to run the bot and `check` to validate configuration
//! and credentials without connecting to Discord's gateway.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use overheard::bluesky::BlueskyClient;
use overheard::config::{self, Config};
use overheard::credentials::{self, Credentials};
use overheard::discord::{self, DiscordPlatform};
use overheard::export::ExportFlow;
use overheard::logging;
use overheard::platform::{ChatPlatform, HttpAttachmentStore};

/// Consent-gated Discord to Bluesky cross-poster.
#[derive(Parser)]
#[command(name = "overheard", version, about)]
struct Cli {
    /// Path to `config.toml` (default: `~/.overheard/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Connect to Discord and Bluesky and process reactions.
    Start,
    /// Validate config and credentials, log in to Bluesky, then exit.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_dir = config::config_dir()?;
    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::load_default_config()?,
    };

    match cli.command {
        Command::Start => handle_start(&config, &config_dir).await,
        Command::Check => handle_check(&config, &config_dir).await,
    }
}

fn load_credentials(config: &Config, config_dir: &Path) -> anyhow::Result<Credentials> {
    // A `.env` in the working directory takes precedence over the config dir.
    let local = PathBuf::from(".env");
    let env_file = if local.exists() {
        local
    } else {
        config_dir.join(".env")
    };
    credentials::load_for(config, &env_file)
        .with_context(|| format!("failed to load credentials from {}", env_file.display()))
}

async fn login_bluesky(config: &Config, credentials: &Credentials) -> anyhow::Result<BlueskyClient> {
    let username = credentials.require(&config.bluesky.username_env)?;
    let password = credentials.require(&config.bluesky.password_env)?;
    BlueskyClient::login(
        &config.bluesky.service,
        &username,
        &password,
        config.bluesky.langs.clone(),
    )
    .await
    .context("bluesky login failed")
}

/// Run the bot until Ctrl+C.
async fn handle_start(config: &Config, config_dir: &Path) -> anyhow::Result<()> {
    let level = config.logging.level.as_deref().unwrap_or("info");
    let logs_dir = config
        .logging
        .dir
        .clone()
        .unwrap_or_else(|| config_dir.join("logs"));
    let _logging_guard = logging::init_production(&logs_dir, level)?;

    let credentials = load_credentials(config, config_dir)?;
    let token = credentials.require(&config.discord.token_env)?;

    let publisher = login_bluesky(config, &credentials).await?;
    let platform = DiscordPlatform::connect(&token)
        .await
        .context("discord login failed")?;
    let bot_user_id = platform.bot_user_id();

    let flow = Arc::new(ExportFlow::new(
        Arc::new(platform),
        Arc::new(HttpAttachmentStore::new()),
        Arc::new(publisher),
        config.export_settings(),
        config.assembly_limits(),
    ));

    info!(
        trigger = %config.export.trigger_glyph,
        consent = %config.export.consent_glyph,
        threshold = config.export.trigger_threshold,
        "overheard starting"
    );
    discord::run(&token, flow, bot_user_id).await
}

/// Validate everything that can be validated offline, plus Bluesky login.
async fn handle_check(config: &Config, config_dir: &Path) -> anyhow::Result<()> {
    logging::init_cli(config.logging.level.as_deref().unwrap_or("info"));

    let credentials = load_credentials(config, config_dir)?;
    credentials.require(&config.discord.token_env)?;

    let client = login_bluesky(config, &credentials).await?;
    info!(
        handle = %client.handle()?,
        did = %client.did()?,
        "configuration OK"
    );
    Ok(())
}
