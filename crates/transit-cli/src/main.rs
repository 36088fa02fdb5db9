//! CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use transit_cli::handlers::fetch::FetchArgs;
use transit_cli::{Cli, CliConfig, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = CliConfig::from_cli(&cli);
    let ctx = bootstrap(&config)?;

    match cli.command {
        Commands::Fetch {
            url,
            name,
            compressed,
            quiet,
        } => {
            let args = FetchArgs {
                url,
                name,
                compressed,
                quiet,
            };
            let path = handlers::fetch::execute(&ctx, args).await?;
            println!("{}", path.display());
        }
        Commands::Status { json } => handlers::status::execute(&ctx, json)?,
    }

    Ok(())
}
