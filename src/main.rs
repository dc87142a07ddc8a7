//! elicit-relay binary entry point.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use elicit_relay::cli::{Cli, Commands, CommonArgs, ServeArgs};
use elicit_relay::error::RelayError;
use elicit_relay::service::{create_executor, Relay};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elicit_relay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Serve(args) => handle_serve(args).await,
        Commands::Tools(args) => handle_tools(args).await,
    };

    if let Err(e) = result {
        error!(error = %e, "elicit-relay failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_serve(args: ServeArgs) -> Result<(), RelayError> {
    let config = args.load_config()?;
    let relay = Relay::from_config(&config)?;
    elicit_relay::server::serve(relay, &config.bind).await
}

async fn handle_tools(args: CommonArgs) -> Result<(), RelayError> {
    let config = args.load_config()?;
    let executor = create_executor(&config)?;
    let tools = executor.list_tools().await?;
    if tools.is_empty() {
        eprintln!("No tools offered by the {} executor.", executor.name());
        return Ok(());
    }
    for tool in tools {
        println!("{:<24} {}", tool.name, tool.description);
    }
    Ok(())
}
