// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod serve;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AdmissionConfig;

/// Chat admission gateway
#[derive(Parser, Debug)]
#[command(name = "chat-admission")]
#[command(version)]
#[command(about = "Admission control in front of a chat backend", long_about = None)]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP gateway
    Serve(serve::ServeArgs),

    /// Print the effective admission configuration and exit
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// TOML file with an [admission] table
    #[arg(long, env = "ADMISSION_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => serve::run(args).await,
        Commands::CheckConfig(args) => check_config(args),
    }
}

fn check_config(args: CheckConfigArgs) -> Result<()> {
    let config = AdmissionConfig::load(args.config.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
