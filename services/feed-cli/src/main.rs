//! Feedstream session CLI
//!
//! Thin command-line front end over the session manager, mostly useful for
//! exercising a deployment: log in, inspect the current user, keep the
//! session alive, log out. The feed itself lives in the graphical client.

mod config;

use anyhow::{Context, Result, bail};
use common::Secret;
use feed_auth::{LoginRequest, RegisterRequest};
use feed_session::{ProfileUpdate, SessionManager};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

const USAGE: &str = "usage: feedstream [--config <path>] <command>

commands:
  register <username> <password> [email]
  login <username> <password>
  whoami
  update-email <email>
  logout
  watch";

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs with LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (cli_config_path, command) = split_args(&args);

    let config_path = Config::resolve_path(cli_config_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let http_client = reqwest::Client::new();
    let manager = SessionManager::new(config.session_config(), http_client)
        .await
        .context("failed to open token store")?;

    match command.as_slice() {
        ["register", username, password] | ["register", username, password, _] => {
            let email = command.get(3).map(|s| s.to_string()).unwrap_or_default();
            let profile = manager
                .register(&RegisterRequest {
                    username: username.to_string(),
                    password: Secret::new(password.to_string()),
                    email,
                })
                .await
                .context("registration failed")?;
            println!("registered and logged in as {}", profile.username);
        }
        ["login", username, password] => {
            let profile = manager
                .login(&LoginRequest {
                    username: username.to_string(),
                    password: Secret::new(password.to_string()),
                })
                .await
                .context("login failed")?;
            println!("logged in as {} (id {})", profile.username, profile.id);
        }
        ["whoami"] => {
            let profile = if manager.restore().await {
                manager.current_user().await
            } else {
                None
            };
            match profile {
                Some(profile) => {
                    println!("{} <{}> (id {})", profile.username, profile.email, profile.id)
                }
                None => println!("not logged in"),
            }
        }
        ["update-email", email] => {
            if !manager.restore().await {
                bail!("not logged in");
            }
            let profile = manager
                .update_profile(&ProfileUpdate {
                    email: Some(email.to_string()),
                    ..Default::default()
                })
                .await
                .context("profile update failed")?;
            println!("email updated to {}", profile.email);
        }
        ["logout"] => {
            manager.logout().await;
            println!("logged out");
        }
        ["watch"] => {
            // Keep the session alive until interrupted
            manager.init().await;
            if !manager.is_authenticated().await {
                manager.dispose();
                bail!("no session to watch, log in first");
            }
            info!("watching session, press ctrl-c to stop");
            tokio::signal::ctrl_c().await.context("signal handler")?;
            manager.dispose();
        }
        _ => bail!("{USAGE}"),
    }

    Ok(())
}

/// Split `[--config <path>]` off the front of the argument list.
fn split_args(args: &[String]) -> (Option<&str>, Vec<&str>) {
    if args.first().map(String::as_str) == Some("--config") {
        let path = args.get(1).map(String::as_str);
        (path, args.iter().skip(2).map(String::as_str).collect())
    } else {
        (None, args.iter().map(String::as_str).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn split_args_without_config_flag() {
        let args = strings(&["login", "alice", "pw"]);
        let (path, command) = split_args(&args);
        assert!(path.is_none());
        assert_eq!(command, vec!["login", "alice", "pw"]);
    }

    #[test]
    fn split_args_with_config_flag() {
        let args = strings(&["--config", "/etc/feedstream.toml", "whoami"]);
        let (path, command) = split_args(&args);
        assert_eq!(path, Some("/etc/feedstream.toml"));
        assert_eq!(command, vec!["whoami"]);
    }
}
