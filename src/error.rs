//! Error types for the Twilio MCP gateway.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the gateway.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Twilio API Errors =====
    #[error("API error: {status} {status_text} - {message}")]
    Api {
        status: u16,
        status_text: String,
        message: String,
    },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Credentials not found: {0}")]
    CredentialsNotFound(String),

    // ===== Dispatch Errors =====
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    /// Handler failure whose text is surfaced verbatim.
    #[error("{0}")]
    Tool(String),

    #[error("Tool catalog and handler registry disagree: {0}")]
    CatalogMismatch(String),

    // ===== Transport Errors =====
    /// Unparseable or unsupported request; never reaches the router.
    #[error("{0}")]
    MalformedRequest(String),

    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    // ===== I/O Errors =====
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // ===== Internal Errors =====
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an API error from HTTP response details.
    pub fn api(status: u16, status_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            status_text: status_text.into(),
            message: message.into(),
        }
    }

    /// Create a handler failure carrying `message` verbatim.
    pub fn tool(message: impl Into<String>) -> Self {
        Self::Tool(message.into())
    }

    /// Create an invalid-argument error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidToolArguments(message.into())
    }

    /// Whether this error is a client-side request problem rather than a fault.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::MalformedRequest(_) | Self::UnknownTool(_))
    }
}
