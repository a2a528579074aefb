//! Twilio MCP Server - Rust Implementation
//!
//! Serves the Twilio tool set over stdio or HTTP (stateless endpoint + SSE).

use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use twilio_mcp_rs::config::{Args, Config, Transport};
use twilio_mcp_rs::error::{Error, Result};
use twilio_mcp_rs::mcp::{McpServer, StdioTransport};
use twilio_mcp_rs::metrics::GatewayMetrics;
use twilio_mcp_rs::twilio::TwilioClient;
use twilio_mcp_rs::{tools, SERVER_NAME, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let dotenv = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize logging; stdout belongs to the stdio transport
    let filter = EnvFilter::try_new(&args.log_level)
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", args.log_level, e)))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to set tracing subscriber: {}", e)))?;

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    // Build configuration from args
    let config: Config = args.into();

    info!("Twilio MCP Server v{}", VERSION);
    info!("Transport: {:?}", config.transport);

    if config.account_sid.is_none() {
        warn!("TWILIO_ACCOUNT_SID is not set; every tool call will fail");
    }
    if config.auth_token.is_none() {
        info!("No default auth token; calls must supply auth_token or x-auth-token");
    }

    let client = Arc::new(TwilioClient::new(&config)?);
    let router = Arc::new(tools::build_router(client, GatewayMetrics::new())?);
    info!("Registered {} tools", router.catalog().len());

    match config.transport {
        Transport::Stdio => {
            info!("Starting stdio transport...");
            let server = McpServer::new(router, SERVER_NAME);
            server.run(StdioTransport::new()).await?;
        }
        Transport::Http => {
            info!("Starting HTTP transport on port {}...", config.port);
            twilio_mcp_rs::http::start_server(&config, router).await?;
        }
    }

    Ok(())
}
