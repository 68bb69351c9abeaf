use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use finmind_client::guard::Location;
use finmind_client::{load_config, FinMindClient, RequestOptions};
use serde_json::{json, Value};
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "finmind", about = "FinMind API client with persistent sessions")]
struct Cli {
    /// JSON configuration file
    #[arg(long, env = "FINMIND_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Override the configured backend URL
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        email: String,
        #[arg(env = "FINMIND_PASSWORD")]
        password: String,
    },
    /// Create an account and sign in
    Register {
        email: String,
        #[arg(env = "FINMIND_PASSWORD")]
        password: String,
    },
    /// Show the signed-in user
    Me,
    /// GET any API path with the stored session
    Get { path: String },
    /// Revoke the session and forget the tokens
    Logout,
    /// Check whether a protected route would render
    Status {
        #[arg(default_value = "/dashboard")]
        path: String,
    },
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }

    let client = FinMindClient::from_config(config).context("Failed to build client")?;

    match cli.command {
        Command::Login { email, password } => {
            client.auth().sign_in(&email, &password).await?;
            print_json(&json!({ "signed_in": true, "email": email }))?;
        }
        Command::Register { email, password } => {
            client.auth().sign_up(&email, &password).await?;
            print_json(&json!({ "registered": true, "email": email }))?;
        }
        Command::Me => {
            let me = client.auth().me().await?;
            print_json(&serde_json::to_value(me)?)?;
        }
        Command::Get { path } => {
            let body = client.api().request(&path, RequestOptions::get()).await?;
            print_json(&body.into_json())?;
        }
        Command::Logout => {
            client.auth().sign_out().await?;
            print_json(&json!({ "signed_in": false }))?;
        }
        Command::Status { path } => {
            let mut mounted = client.route_guard().mount(Location::new(&path));
            let state = mounted.resolved().await;
            print_json(&json!({
                "path": path,
                "state": state,
                "signed_in": client.tokens().has_access_token(),
            }))?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    let env_file_path = dotenvy::dotenv().ok();

    // Initialize the tracing subscriber for structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "finmind_client=debug,finmind=debug,warn".into()
            } else {
                "finmind_client=info,finmind=info,warn".into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();

    match env_file_path {
        Some(path) => info!("Loaded environment variables from {}", path.display()),
        None => debug!("No .env file found. Using existing environment variables."),
    };

    run(Cli::parse()).await
}
