use std::process::ExitCode;

use serde::Serialize;
use serde_json::Value;

use crate::config::AppConfig;
use crate::domain::user::{Credentials, User, UserInput};
use crate::domain::{DomainError, ErrorResponse};
use crate::PostgresUserService;

use super::{Command, GetBy, PutArgs, SchemaAction};

/// What a successful command prints on stdout
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Output {
    Done { ok: bool },
    User(User),
    Authenticated { authenticated: bool },
    Schema(Value),
}

pub(super) async fn execute(config: &AppConfig, command: Command) -> anyhow::Result<ExitCode> {
    // The pool is lazy; commands that never query open no connection
    let users = crate::connect_with_config(config).await?;
    let result = dispatch(&users, command).await;
    users.end().await;

    match result {
        Ok(output) => {
            print_json(&output)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&e))?);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn dispatch(users: &PostgresUserService, command: Command) -> Result<Output, DomainError> {
    match command {
        Command::Schema { action } => {
            match action {
                SchemaAction::Create => users.create_schema().await?,
                SchemaAction::Drop => users.drop_schema().await?,
            }
            Ok(Output::Done { ok: true })
        }
        Command::Put(PutArgs {
            id,
            username,
            password,
        }) => {
            let input = UserInput {
                id,
                username: Some(username),
                password,
            };
            // The plaintext echo stays out of terminal output
            let user = users.put(input).await?.without_password();
            Ok(Output::User(user))
        }
        Command::Get { by: GetBy::Id { id } } => Ok(Output::User(users.get_by_id(id).await?)),
        Command::Get {
            by: GetBy::Username { username },
        } => Ok(Output::User(users.get_by_username(&username).await?)),
        Command::Authenticate(args) => {
            let authenticated = users
                .authenticate(Credentials::new(args.username, args.password))
                .await?;
            Ok(Output::Authenticated { authenticated })
        }
        Command::JsonSchema => Ok(Output::Schema(users.json_schema().clone())),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
