//! wanauth - thin CLI driver for the login client core.
//!
//! All rules live in the library; this binary only wires the store, cache,
//! API client, and coordinator together and prints the resulting state.

use std::io::{self, Write};

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wanauth::{AuthApiClient, AuthCoordinator, Config, CredentialStore, SessionCookieCache};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("wanauth starting");

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("status");

    let mut config = Config::load().unwrap_or_default();
    let store = CredentialStore::new(config.data_dir()?);
    let cookies = std::sync::Arc::new(SessionCookieCache::new(store));
    cookies.initialize();

    let api = AuthApiClient::new(&config.api_base_url, std::sync::Arc::clone(&cookies))?;
    let coordinator = AuthCoordinator::new(api, cookies);

    match command {
        "status" => {}
        "login" => {
            let username = username_arg(&args, &config)?;
            let password = rpassword::prompt_password("Password: ")?;
            coordinator.login(&username, &password).await;
            remember_username(&mut config, &username);
        }
        "register" => {
            let username = username_arg(&args, &config)?;
            let password = rpassword::prompt_password("Password: ")?;
            let repassword = rpassword::prompt_password("Confirm password: ")?;
            coordinator.register(&username, &password, &repassword).await;
            remember_username(&mut config, &username);
        }
        "logout" => {
            coordinator.logout();
        }
        other => {
            eprintln!("Unknown command '{}'", other);
            eprintln!("Usage: wanauth [status|login [user]|register [user]|logout]");
            std::process::exit(2);
        }
    }

    let state = coordinator.state();
    println!("logged in: {}", state.is_logged_in);
    if let Some(ref message) = state.login_message {
        println!("login: {}", message);
    }
    if let Some(ref message) = state.register_message {
        println!("register: {}", message);
    }

    Ok(())
}

/// Username from argv, falling back to a prompt pre-filled with the last one
fn username_arg(args: &[String], config: &Config) -> Result<String> {
    if let Some(username) = args.get(2) {
        return Ok(username.clone());
    }

    match config.last_username {
        Some(ref last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    if input.is_empty() {
        Ok(config.last_username.clone().unwrap_or_default())
    } else {
        Ok(input.to_string())
    }
}

fn remember_username(config: &mut Config, username: &str) {
    config.last_username = Some(username.to_string());
    if let Err(e) = config.save() {
        tracing::warn!(error = %e, "Failed to save config");
    }
}
