//! Model Context Protocol (MCP) streaming session transport.
//!
//! # Architecture
//!
//! - `protocol` - Core MCP types and message definitions
//! - `server` - Session server answering initialize, tools/list and tools/call
//! - `transport` - Transport layer (stdio, in-process channels for SSE)

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::*;
pub use server::McpServer;
pub use transport::{ChannelTransport, Message, StdioTransport, Transport};
