use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use calbot_bot::{run_console, BotServices, ConsoleNotifier, ConsoleOutput};
use calbot_core::{AppError, Config, ConfigError};
use clap::Parser;

#[derive(Parser)]
#[command(name = "calbot")]
#[command(about = "Chat bot that lists calendar events and sends reminders before they start")]
struct Cli {
    /// Configuration file (created with defaults when missing)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    calbot_core::init()?;

    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(e.exit_code());
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let path = cli.config.unwrap_or_else(Config::default_path);
    let (config, is_new) = Config::load_validated(&path)
        .map_err(|e| ConfigError::Invalid(format!("{:#}", e)))?;
    if is_new {
        return Err(ConfigError::Created(path.display().to_string()).into());
    }

    let out = ConsoleOutput::stdout();
    let services =
        BotServices::from_config(&config, Arc::new(ConsoleNotifier::new(out.clone()))).await?;
    services.start().await;
    tracing::info!("Calbot started, reading commands from stdin");

    let handler = services.handler();
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let console = run_console(
        &handler,
        &config.console,
        input,
        &out,
        services.subscribe_shutdown(),
    );

    let result = tokio::select! {
        result = console => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            Ok(())
        }
    };

    services.shutdown().await;
    result.map_err(AppError::Other)
}
