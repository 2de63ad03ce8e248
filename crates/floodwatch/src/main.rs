//! `floodwatch` - Is the road open?
//!
//! This binary serves the status page, or checks the status once from the
//! command line.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use floodwatch::cli::{CheckCommand, Cli, Command, ConfigCommand, ServeCommand};
use floodwatch::server::{self, format_published, StatusReport};
use floodwatch::{init_logging, Config, StatusMerger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match cli.command {
        Command::Serve(cmd) => handle_serve(cli.config, cmd).await,
        Command::Check(cmd) => handle_check(cli.config, cmd).await,
        Command::Config(cmd) => handle_config(cli.config, cmd),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Config::load_from(path).context("failed to load configuration")
}

async fn handle_serve(path: Option<PathBuf>, cmd: ServeCommand) -> anyhow::Result<()> {
    let mut config = load_config(path)?;
    if let Some(bind) = cmd.bind {
        config.server.bind = bind;
    }
    if let Some(override_status) = cmd.override_status {
        config.override_status = override_status.into();
    }
    config.validate().context("invalid command-line options")?;

    server::run(&config).await.context("server failed")
}

async fn handle_check(path: Option<PathBuf>, cmd: CheckCommand) -> anyhow::Result<()> {
    let mut config = load_config(path)?;
    if let Some(override_status) = cmd.override_status {
        config.override_status = override_status.into();
    }
    let tz = config.tz()?;

    let merger = StatusMerger::from_config(&config)?;
    let record = merger
        .status_within(config.request_deadline())
        .await
        .with_context(|| format!("failed to determine the status of {}", merger.road()))?;

    if cmd.json {
        let report = StatusReport {
            road: merger.road(),
            record,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} is {}", merger.road(), record.state_label());
        if record.has_detail() {
            println!("  {}", record.detail);
        }
        if !record.link.is_empty() {
            println!("  {}", record.link);
        }
        if let Some(at) = record.published_at {
            println!("  Updated at {}", format_published(at, tz));
        }
    }
    Ok(())
}

fn handle_config(path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = load_config(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print_config(&config);
            }
        }
        ConfigCommand::Path => {
            println!(
                "{}",
                path.unwrap_or_else(Config::default_config_path).display()
            );
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_file(&path).context("configuration is invalid")?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}

fn print_config(config: &Config) {
    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("  Road:               {}", config.road);
    println!("  Timezone:           {}", config.timezone);
    println!("  Override:           {}", config.override_status);
    println!();
    println!("[Feed]");
    println!("  URL:                {}", config.feed.url);
    println!("  Timeout (secs):     {}", config.feed.timeout_secs);
    println!();
    println!("[Analyzer]");
    println!("  Enabled:            {}", config.analyzer.is_enabled());
    println!("  Model:              {}", config.analyzer.model);
    println!("  Cameras:            {}", config.analyzer.camera_urls.len());
    println!("  Cache TTL (secs):   {}", config.analyzer.cache_ttl_secs);
    println!();
    println!("[Server]");
    println!("  Bind:               {}", config.server.bind);
}
