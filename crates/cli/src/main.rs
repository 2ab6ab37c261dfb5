use anyhow::Context;
use catalog_kernel::settings::{Settings, StoreBackend};
use clap::{Parser, Subcommand};

/// Book catalog service command line
#[derive(Debug, Parser)]
#[command(name = "catalog", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Connect to the configured document store and ping it
    Ping,
    /// Print the effective configuration with credentials redacted
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load catalog settings")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            catalog_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "catalog serve");
            catalog_app::run(settings).await
        }
        Command::Ping => ping(&settings).await,
        Command::Config => {
            let mut shown = settings.clone();
            shown.database.uri = settings.database.redacted_uri();
            println!("{}", serde_json::to_string_pretty(&shown)?);
            Ok(())
        }
    }
}

async fn ping(settings: &Settings) -> anyhow::Result<()> {
    match settings.database.backend {
        StoreBackend::Memory => {
            println!("memory backend configured; nothing to ping");
        }
        StoreBackend::Mongodb => {
            catalog_db::connect(&settings.database).await?;
            println!(
                "MongoDB at {} answered ping",
                settings.database.redacted_uri()
            );
        }
    }
    Ok(())
}
