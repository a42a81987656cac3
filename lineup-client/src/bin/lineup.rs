//! Lineup command-line client.
//!
//! ```text
//! lineup --config lineup.toml <command> [args]
//!
//!   login <email> <password>   print the session token
//!   me
//!   players                    coach roster
//!   player <id>
//!   matches                    coach match list
//!   trainings                  the signed-in player's sessions
//!   stats                      coach season totals
//! ```
//!
//! Commands other than `login` read the bearer token from `LINEUP_TOKEN`.

use lineup_cache::{Credential, InMemoryIdentity};
use lineup_client::{init_tracing, ClientConfig, ClientError, ClientResult, TeamClient};
use lineup_core::{Credentials, PlayerId};
use serde::Serialize;
use std::sync::Arc;

const TOKEN_ENV_VAR: &str = "LINEUP_TOKEN";

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = ClientConfig::load()?;
    init_tracing(&config.log)?;

    let identity = Arc::new(match std::env::var(TOKEN_ENV_VAR) {
        Ok(token) if !token.trim().is_empty() => InMemoryIdentity::with_credential(Credential::new(token)),
        _ => InMemoryIdentity::new(),
    });
    let client = TeamClient::from_config(&config, identity)?;

    let command = command_args(std::env::args().skip(1));
    run(&client, &command).await
}

async fn run(client: &TeamClient, command: &[String]) -> ClientResult<()> {
    let words: Vec<&str> = command.iter().map(String::as_str).collect();
    match words.as_slice() {
        ["login", email, password] => {
            let credentials = Credentials {
                email: email.to_string(),
                password: password.to_string(),
            };
            let auth = client.login(&credentials).await?;
            println!("{}", auth.token);
            Ok(())
        }
        ["me"] => print_json(&client.me().await?),
        ["players"] => print_json(&client.coach_players().await?),
        ["player", id] => {
            let id = parse_id(id)?;
            print_json(&client.coach_player(PlayerId::new(id)).await?)
        }
        ["matches"] => print_json(&client.coach_matches().await?),
        ["trainings"] => print_json(&client.player_trainings().await?),
        ["stats"] => print_json(&client.coach_stats().await?),
        _ => Err(ClientError::Usage(
            "lineup --config <path> <login|me|players|player|matches|trainings|stats> [args]".to_string(),
        )),
    }
}

/// Positional arguments with `--config <path>` removed.
fn command_args(args: impl Iterator<Item = String>) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--config" {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--config=") {
            continue;
        }
        out.push(arg);
    }
    out
}

fn parse_id(raw: &str) -> ClientResult<i64> {
    raw.parse()
        .map_err(|_| ClientError::Usage(format!("'{}' is not a numeric id", raw)))
}

fn print_json<T: Serialize>(value: &T) -> ClientResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args_strip_config() {
        let args = ["--config", "lineup.toml", "player", "42"].map(String::from);
        assert_eq!(command_args(args.into_iter()), vec!["player", "42"]);

        let args = ["players", "--config=lineup.toml"].map(String::from);
        assert_eq!(command_args(args.into_iter()), vec!["players"]);
    }

    #[test]
    fn test_parse_id_rejects_text() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(matches!(parse_id("abc"), Err(ClientError::Usage(_))));
    }
}
