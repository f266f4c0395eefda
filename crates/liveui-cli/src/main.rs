mod demo;
mod logging;

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use liveui_core::config::Config;
use liveui_gateway::App;

#[derive(Parser)]
#[command(
    name = "liveui",
    about = "Server-driven UI with live WebSocket updates",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: ~/.liveui/config.json)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the demo app server
    Serve {
        /// Interface to bind (default: localhost)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default: 8501)
        #[arg(long)]
        port: Option<u16>,

        /// Page title
        #[arg(long)]
        title: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Query a running server's health endpoint
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Check the configuration for errors
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let mut config = Config::load(&config_path)?;

    logging::init(&config.logging(), cli.verbose);

    match cli.command {
        Commands::Serve { host, port, title } => {
            config.set_server(host, port);
            if let Some(title) = title {
                config.set_title(title);
            }

            let (warnings, errors) = config.validate();
            for warning in &warnings {
                tracing::warn!("Config: {warning}");
            }
            if !errors.is_empty() {
                bail!("invalid configuration: {}", errors.join("; "));
            }

            tracing::info!(
                config = %config_path.display(),
                "Starting LiveUI v{}",
                env!("CARGO_PKG_VERSION")
            );
            let app = App::new(config);
            demo::build(&app);
            app.run().await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Path => println!("{}", config_path.display()),
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for warning in &warnings {
                    println!("warning: {warning}");
                }
                for error in &errors {
                    println!("error: {error}");
                }
                if !errors.is_empty() {
                    bail!("{} error(s) in {}", errors.len(), config_path.display());
                }
                println!("Config OK");
            }
        },
        Commands::Status => {
            let url = format!("http://{}/health", config.address());
            println!("LiveUI v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            match reqwest::get(&url).await {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("Server: running at {}", config.address());
                    println!("Connections: {}", body["connections"]);
                    println!("Sessions: {}", body["sessions"]);
                }
                Err(_) => println!("Server: not running at {}", config.address()),
            }
        }
    }

    Ok(())
}
