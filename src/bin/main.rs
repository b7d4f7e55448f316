use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mcp_hub::config::CONFIG_PATH_ENV;
use mcp_hub::server::serve_stdio;
use mcp_hub::{HubResult, HubServer, McpHub, SearchScope, ServerCatalogs, ToolDescriptor, create_hub};

#[derive(Parser)]
#[command(name = "mcp-hub")]
#[command(about = "Connect to many MCP servers and expose their tools through one")]
struct Cli {
    /// Path to the MCP servers configuration file
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as an MCP stdio server (default)
    Stdio,
    /// List the connected servers
    ListServers,
    /// List tools of every server, or of one server
    ListTools {
        #[arg(short, long)]
        server: Option<String>,
    },
    /// Search tools with a regular expression
    Find {
        pattern: String,
        #[arg(long, default_value_t = SearchScope::Both)]
        search_in: SearchScope,
        #[arg(long, default_value_t = false)]
        case_sensitive: bool,
        #[arg(short, long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP stream in stdio mode.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mcp_hub=info,rmcp=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let hub = create_hub(cli.config_path.as_deref()).await?;

    let outcome = run(&hub, cli.command.unwrap_or(Commands::Stdio)).await;

    for e in hub.disconnect_all().await {
        warn!("{}", e);
    }
    outcome
}

async fn run(hub: &McpHub, command: Commands) -> Result<()> {
    match command {
        Commands::Stdio => {
            info!("Starting MCP stdio server with {} server(s)", hub.list_names().len());
            let server = HubServer::new(hub.clone());
            tokio::select! {
                served = serve_stdio(server) => served?,
                _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
            }
        }
        Commands::ListServers => {
            for name in hub.list_names() {
                println!("{}", name);
            }
        }
        Commands::ListTools { server: Some(server) } => {
            print_tools(&hub.list_in_server(&server).await?);
        }
        Commands::ListTools { server: None } => {
            print_catalogs(&hub.list_all().await);
        }
        Commands::Find {
            pattern,
            search_in,
            case_sensitive,
            server,
        } => match server {
            Some(server) => {
                let found = hub
                    .find_in_server(&server, &pattern, search_in, case_sensitive)
                    .await?;
                print_tools(&found);
            }
            None => {
                let found = hub.find(&pattern, search_in, case_sensitive).await?;
                print_catalogs(&found);
            }
        },
    }
    Ok(())
}

fn print_catalogs(catalogs: &ServerCatalogs) {
    if catalogs.is_empty() {
        println!("No connected servers.");
        return;
    }
    for (name, catalog) in catalogs {
        print_catalog(name, catalog);
    }
}

fn print_catalog(name: &str, catalog: &HubResult<Vec<ToolDescriptor>>) {
    match catalog {
        Ok(tools) => {
            println!("{}:", name);
            print_tools(tools);
        }
        Err(e) => println!("{}: error: {}", name, e),
    }
}

fn print_tools(tools: &[ToolDescriptor]) {
    if tools.is_empty() {
        println!("  (no tools)");
    }
    for tool in tools {
        match &tool.description {
            Some(description) => println!("  {} - {}", tool.name, description),
            None => println!("  {}", tool.name),
        }
    }
}
