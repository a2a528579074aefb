//! Handler registry: tool name to async handler, built once at startup.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Keyword arguments passed to a handler.
pub type Arguments = HashMap<String, Value>;

/// Async handler for a single tool.
///
/// Handlers return a JSON value or fail; wrapping the outcome for the
/// transports is the router's job.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Arguments) -> Result<Value>;
}

/// Adapter turning an async closure into a [`ToolHandler`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn call(&self, arguments: Arguments) -> Result<Value> {
        (self.f)(arguments).await
    }
}

/// Registry of tool handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under `name`. Each name may be registered once.
    pub fn register<H: ToolHandler + 'static>(&mut self, name: impl Into<String>, handler: H) -> Result<()> {
        self.register_arc(name, Arc::new(handler))
    }

    /// Register a handler (Arc version).
    pub fn register_arc(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) -> Result<()> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(Error::CatalogMismatch(format!(
                "handler registered twice: {}",
                name
            )));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Register an async closure as a handler.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.register(name, FnHandler::new(f))
    }

    /// Resolve a handler by tool name.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Helper to extract a required string argument.
pub fn get_string_arg(args: &Arguments, name: &str) -> Result<String> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| Error::invalid_args(format!("Missing required argument: {}", name)))
}

/// Helper to extract an optional string argument.
///
/// Present-but-wrong-typed values are an error rather than silently ignored.
pub fn get_optional_string_arg(args: &Arguments, name: &str) -> Result<Option<String>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::invalid_args(format!("Argument '{}' must be a string", name))),
    }
}

/// Optional string argument where an empty string counts as absent.
pub fn get_filter_arg(args: &Arguments, name: &str) -> Result<Option<String>> {
    Ok(get_optional_string_arg(args, name)?.filter(|s| !s.is_empty()))
}

/// Helper to extract an optional integer argument with a default.
pub fn get_int_arg(args: &Arguments, name: &str, default: i64) -> Result<i64> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| Error::invalid_args(format!("Argument '{}' must be an integer", name))),
    }
}

/// Helper to extract a boolean argument with a default.
pub fn get_bool_arg(args: &Arguments, name: &str, default: bool) -> Result<bool> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| Error::invalid_args(format!("Argument '{}' must be a boolean", name))),
    }
}

/// Helper to extract a string array argument.
pub fn get_string_array_arg(args: &Arguments, name: &str) -> Result<Vec<String>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(String::from).ok_or_else(|| {
                    Error::invalid_args(format!("Argument '{}' must be a list of strings", name))
                })
            })
            .collect(),
        Some(_) => Err(Error::invalid_args(format!(
            "Argument '{}' must be a list of strings",
            name
        ))),
    }
}

/// Reject argument names the tool does not accept.
pub fn reject_unknown_args(args: &Arguments, tool: &str, allowed: &[&str]) -> Result<()> {
    let mut unexpected: Vec<&str> = args
        .keys()
        .map(String::as_str)
        .filter(|k| !allowed.contains(k))
        .collect();
    unexpected.sort_unstable();
    match unexpected.first() {
        Some(key) => Err(Error::invalid_args(format!(
            "unexpected argument '{}' for tool {}",
            key, tool
        ))),
        None => Ok(()),
    }
}
