//! drift-mcp - Tusk Drift traffic analysis as MCP tools
//!
//! Subcommands:
//! - `drift-mcp stdio` - Serve MCP over stdin/stdout (default)
//! - `drift-mcp serve` - Serve MCP over streamable HTTP at `/mcp`
//! - `drift-mcp services` - Show which services discovery finds
//! - `drift-mcp config` - Print the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use drift_mcp::handler::DriftHandler;
use drift_mcp::{serve, stdio, telemetry};
use driftconf::DriftConfig;

#[derive(Parser)]
#[command(name = "drift-mcp")]
#[command(about = "MCP server for querying Tusk Drift recorded traffic")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./drift-mcp.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Tusk API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Default service id when a call omits observableServiceId
    #[arg(long, global = true)]
    service_id: Option<String>,

    /// Workspace root to scan for .tusk/config.yaml (repeatable)
    #[arg(long = "root", global = true)]
    roots: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdin/stdout
    Stdio,

    /// Serve MCP over streamable HTTP
    Serve {
        /// HTTP port to bind
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run discovery and print the services found
    Services,

    /// Print the effective configuration and where it came from
    Config,
}

impl Cli {
    /// CLI flags are the last override layer.
    fn apply(&self, config: &mut DriftConfig) {
        if let Some(ref url) = self.api_url {
            config.api.url = url.clone();
        }
        if let Some(ref id) = self.service_id {
            config.service.default_id = Some(id.clone());
        }
        if !self.roots.is_empty() {
            config.service.workspace_roots = self.roots.clone();
        }
        if let Some(Commands::Serve { port, bind }) = &self.command {
            if let Some(port) = port {
                config.http.port = *port;
            }
            if let Some(bind) = bind {
                config.http.bind = bind.clone();
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = DriftConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut config);

    if let Some(Commands::Config) = cli.command {
        print!("{}", config.to_toml());
        println!();
        println!("# files: {:?}", sources.files);
        println!("# env: {:?}", sources.env_overrides);
        return Ok(());
    }

    let telemetry = telemetry::init(&config.telemetry)?;
    info!(
        files = ?sources.files,
        env = ?sources.env_overrides,
        "Configuration loaded"
    );

    let handler = Arc::new(DriftHandler::from_config(&config).await?);

    let result = match cli.command.unwrap_or(Commands::Stdio) {
        Commands::Stdio => stdio::run(handler).await,
        Commands::Serve { .. } => serve::run(handler, serve::ServeConfig::from(&config.http)).await,
        Commands::Services => {
            print_services(&handler);
            Ok(())
        }
        Commands::Config => Ok(()),
    };

    telemetry.shutdown();
    result
}

fn print_services(handler: &DriftHandler) {
    let resolver = handler.resolver();
    println!("{}", resolver.services_description());

    let services = resolver.services();
    if !services.is_empty() {
        println!();
        for service in services.iter() {
            println!("{}\t{}\t{}", service.id, service.name, service.config_path.display());
        }
    }
}
