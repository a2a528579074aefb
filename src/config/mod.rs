//! Configuration management for the Twilio MCP gateway.

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Default Twilio REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.twilio.com";

/// Command-line arguments for the gateway.
#[derive(Parser, Debug, Clone)]
#[command(name = "twilio-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP gateway exposing Twilio messaging, voice, number and account tools")]
pub struct Args {
    /// Transport mode: stdio or http
    #[arg(short, long, default_value = "http", env = "TWILIO_MCP_TRANSPORT")]
    pub transport: Transport,

    /// Port to listen on for HTTP
    #[arg(short, long, default_value = "5000", env = "TWILIO_MCP_SERVER_PORT")]
    pub port: u16,

    /// Address to bind for HTTP
    #[arg(long, default_value = "0.0.0.0", env = "TWILIO_MCP_SERVER_HOST")]
    pub host: String,

    /// Logging level or filter directive (e.g. debug, info, twilio_mcp_rs=trace)
    #[arg(short, long, default_value = "info", env = "TWILIO_MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Answer SSE session messages in the HTTP response instead of the event stream
    #[arg(long, env = "TWILIO_MCP_JSON_RESPONSE")]
    pub json_response: bool,

    /// Twilio account SID
    #[arg(long, env = "TWILIO_ACCOUNT_SID")]
    pub account_sid: Option<String>,

    /// Default Twilio auth token, used when a call supplies none
    #[arg(long, env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Twilio API base URL
    #[arg(long, default_value = DEFAULT_API_URL, env = "TWILIO_API_URL")]
    pub api_url: String,

    /// Timeout for each Twilio API request, in seconds
    #[arg(long, default_value = "30", env = "TWILIO_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,
}

/// Transport mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    #[default]
    Http,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transport mode
    pub transport: Transport,
    /// HTTP port
    pub port: u16,
    /// HTTP bind address
    pub host: String,
    /// Log filter
    pub log_level: String,
    /// Synchronous JSON replies for SSE sessions
    pub json_response: bool,
    /// Twilio account SID
    pub account_sid: Option<String>,
    /// Default auth token
    #[serde(skip_serializing, default)]
    pub auth_token: Option<String>,
    /// Twilio API base URL
    pub api_url: String,
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Config {
    /// `host:port` for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            transport: args.transport,
            port: args.port,
            host: args.host,
            log_level: args.log_level,
            json_response: args.json_response,
            account_sid: args.account_sid.filter(|s| !s.is_empty()),
            auth_token: args.auth_token.filter(|s| !s.is_empty()),
            api_url: args.api_url,
            request_timeout_secs: args.request_timeout_secs,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: Transport::Http,
            port: 5000,
            host: "0.0.0.0".to_string(),
            log_level: "info".to_string(),
            json_response: false,
            account_sid: None,
            auth_token: None,
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}
