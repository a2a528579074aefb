//! Tool-invocation gateway.
//!
//! # Architecture
//!
//! - `catalog` - ordered tool descriptors advertised to clients
//! - `registry` - tool name to async handler table
//! - `context` - task-scoped auth token for the call in flight
//! - `router` - dispatch and outcome normalization shared by all transports

pub mod catalog;
pub mod context;
pub mod registry;
pub mod router;

pub use catalog::{ToolCatalog, ToolDescriptor, ToolSummary};
pub use registry::{Arguments, FnHandler, HandlerRegistry, ToolHandler};
pub use router::{DispatchRouter, ResponseEnvelope, AUTH_TOKEN_ARG};
