mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;
use verdict::client::Clients;
use verdict::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    if let Commands::ShowConfig = cli.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let clients = Clients::from_config(&config)?;
    let metrics = clients.metrics.clone();

    let mut runner = commands::Runner::start(clients)?;

    let result = match cli.command {
        Commands::Users => commands::users(&mut runner).await,
        Commands::LookupUser(args) => commands::lookup_user(&mut runner, args).await,
        Commands::Task(args) => commands::task(&mut runner, args).await,
        Commands::CheckUpdate => commands::check_update(&mut runner).await,
        Commands::Submit(args) => commands::submit(&mut runner, args).await,
        Commands::Upload(args) => commands::upload(&mut runner, args).await,
        Commands::ShowConfig => Ok(()),
    };

    runner.shutdown();

    let snapshot = metrics.snapshot();
    tracing::debug!(
        requests_sent = snapshot.requests_sent,
        requests_failed = snapshot.requests_failed,
        rate_limit_warnings = snapshot.rate_limit_warnings,
        "Request counters"
    );

    result
}
