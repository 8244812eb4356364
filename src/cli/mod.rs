//! CLI module for the user store
//!
//! Provides operator subcommands over the configured PostgreSQL table:
//! - `schema create|drop`: manage the user table
//! - `put`: insert or update a user
//! - `get id|username`: look a user up by id or username
//! - `authenticate`: check a username and password
//! - `json-schema`: print the record contract

mod commands;

use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::config::{AppConfig, HashingScheme};
use crate::infrastructure::logging;

/// User store - validated, hashed credentials in PostgreSQL
#[derive(Parser)]
#[command(name = "user-store")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Database URL, overrides `database.url`
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Hashing scheme, overrides `hashing.scheme`
    #[arg(long, global = true)]
    pub scheme: Option<HashingScheme>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create or drop the user table
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },

    /// Insert a user, or update it when --id is given
    Put(PutArgs),

    /// Look up a user
    Get {
        #[command(subcommand)]
        by: GetBy,
    },

    /// Check a username and password
    Authenticate(AuthenticateArgs),

    /// Print the JSON schema user records are validated against
    JsonSchema,
}

#[derive(Subcommand, Clone, Copy)]
pub enum SchemaAction {
    Create,
    Drop,
}

#[derive(Args)]
pub struct PutArgs {
    #[arg(long)]
    pub id: Option<i64>,

    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Subcommand)]
pub enum GetBy {
    /// Look up by id
    Id { id: i64 },

    /// Look up by username
    Username { username: String },
}

#[derive(Args)]
pub struct AuthenticateArgs {
    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub password: String,
}

/// Load configuration, apply command line overrides and run the command
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().context("Failed to load configuration")?;

    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    if let Some(scheme) = cli.scheme {
        config.hashing.scheme = scheme;
    }

    logging::init_logging(&config.logging);

    commands::execute(&config, cli.command).await
}
