use std::collections::BTreeMap;

use anyhow::Context;
use clap::Parser;
use lpvault_common::models::parameters::{StrategyParameters, Template};
use lpvault_core::{
    chain::{clock::ManualClock, Chain},
    cli::{CheckConfigArgs, Cli, Command, TemplatesArgs},
    config::DeploymentConfig,
    strategy::templates::template_defaults,
};
use strum::IntoEnumIterator;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), anyhow::Error> {
    let cli: Cli = Cli::parse();
    create_tracing_subscriber(cli.args().verbose);
    match cli.command() {
        Command::Templates(args) => print_templates(args)?,
        Command::CheckConfig(args) => check_config(args)?,
    };
    Ok(())
}

fn create_tracing_subscriber(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let format = tracing_subscriber::fmt::format()
        .with_level(true)
        .with_target(false)
        .compact();
    tracing_subscriber::fmt()
        .event_format(format)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_templates(args: TemplatesArgs) -> Result<(), anyhow::Error> {
    let tables: BTreeMap<String, StrategyParameters> = match args.template {
        Some(template) => BTreeMap::from([(template.to_string(), *template_defaults(template))]),
        None => Template::iter()
            .filter(|t| *t != Template::None)
            .map(|t| (t.to_string(), *template_defaults(t)))
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&tables)?);
    Ok(())
}

fn check_config(args: CheckConfigArgs) -> Result<(), anyhow::Error> {
    let config = DeploymentConfig::from_yaml(&args.config)
        .with_context(|| format!("Failed to load deployment config {}", args.config))?;
    let mut chain = match config.genesis_timestamp {
        Some(timestamp) => Chain::with_clock(ManualClock::new(timestamp)),
        None => Chain::new(),
    };
    let deployment = chain
        .deploy_core(&config)
        .context("Deployment rejected")?;
    info!(config = %args.config, timestamp = chain.timestamp(), "Config deployed cleanly");
    println!("{}", serde_json::to_string_pretty(&deployment)?);
    Ok(())
}
