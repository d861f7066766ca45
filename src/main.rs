//! Kolosal Vision - Main Entry Point
//!
//! Image classification prediction server with offline CLI commands.

use clap::Parser;
use kolosal_vision::cli::{cmd_info, cmd_predict, cmd_serve, Cli, Commands, ServeArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_vision=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { host, port, model_dir, timeout_ms, max_concurrency }) => {
            cmd_serve(ServeArgs { host, port, model_dir, timeout_ms, max_concurrency }).await?;
        }
        Some(Commands::Predict { model_dir, image, no_resize, raw }) => {
            cmd_predict(&model_dir, &image, no_resize, raw)?;
        }
        Some(Commands::Info { model_dir }) => {
            cmd_info(&model_dir)?;
        }
        None => {
            cmd_serve(ServeArgs::default()).await?;
        }
    }

    Ok(())
}
