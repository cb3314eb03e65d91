//! DB User Provider - command line entry point.
//!
//! Runs one repository operation against the configured database and prints
//! the result as JSON on stdout. Logs go to stderr.

use db_user_provider::config::{Command, Config};
use db_user_provider::db::{ConnectionProvider, QueryExecutor};
use db_user_provider::error::StoreError;
use db_user_provider::repository::UserRepository;
use serde_json::{Value, json};
use std::io::BufRead;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// First line of stdin without its line terminator.
fn read_password() -> std::io::Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn run(repository: &UserRepository, command: &Command) -> Result<Value, StoreError> {
    let output = match command {
        Command::Count { search } => json!({
            "count": repository.count_users(search.as_deref()).await?
        }),
        Command::FindId { id } => json!(repository.find_by_id(id).await?),
        Command::FindUsername { username } => {
            json!(repository.find_by_username(username).await?)
        }
        Command::Search { search, .. } => {
            let pageable = command.pageable();
            json!(
                repository
                    .find_users(search.as_deref(), pageable.as_ref())
                    .await?
            )
        }
        Command::Validate { username } => {
            let password = read_password()
                .map_err(|e| StoreError::internal(format!("Failed to read password: {}", e)))?;
            json!({
                "username": username,
                "valid": repository.validate_credentials(username, &password).await?
            })
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    info!("Starting DB User Provider v{}", env!("CARGO_PKG_VERSION"));

    let query_config = Arc::new(config.query_config()?);
    let connection_config = config.connection_config()?;

    let provider = Arc::new(ConnectionProvider::new());
    if let Err(e) = provider.configure_with(&connection_config).await {
        error!(
            error = %e,
            suggestion = e.suggestion().unwrap_or_default(),
            "Failed to configure database connection"
        );
        return Err(e.into());
    }

    let executor = QueryExecutor::with_timeout(provider.clone(), config.query_timeout_duration());
    let repository = UserRepository::with_executor(query_config, executor)?;

    let result = run(&repository, &config.command).await;
    provider.shutdown().await;

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!(
                error = %e,
                suggestion = e.suggestion().unwrap_or_default(),
                "Command failed"
            );
            Err(e.into())
        }
    }
}
