//! Twilio MCP Server - Rust Implementation
//!
//! A Model Context Protocol (MCP) gateway exposing Twilio messaging, voice,
//! phone number and account operations as schema-described tools.
//!
//! # Architecture
//!
//! The server follows a layered architecture:
//!
//! 1. **Twilio Layer** (`twilio`) - REST client, basic auth, response shaping
//! 2. **Tools Layer** (`tools`) - 16 tools: static descriptors plus handlers
//! 3. **Gateway Layer** (`gateway`) - catalog, handler registry, call context, dispatch
//! 4. **Transport Layer** (`mcp`, `http`) - MCP sessions over stdio/SSE and a
//!    stateless JSON endpoint
//!
//! # Call isolation
//!
//! A call's bearer token travels in a task-local scope set up by the
//! dispatch router, so overlapping calls never see each other's token.

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod mcp;
pub mod metrics;
pub mod tools;
pub mod twilio;

pub use error::{Error, Result};

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name reported to clients
pub const SERVER_NAME: &str = "twilio-mcp-server";
