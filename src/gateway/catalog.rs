//! Tool catalog: the ordered, immutable list of advertised tools.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{Error, Result};

/// Tool descriptor as advertised to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Create a descriptor.
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Name and description only, as listed by the stateless transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

impl From<&ToolDescriptor> for ToolSummary {
    fn from(tool: &ToolDescriptor) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
        }
    }
}

/// Ordered catalog of tool descriptors, fixed for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Build a catalog, rejecting duplicate names.
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(Error::CatalogMismatch(format!(
                    "duplicate catalog entry: {}",
                    tool.name
                )));
            }
        }
        Ok(Self { tools })
    }

    /// All descriptors in catalog order.
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Name/description pairs in catalog order.
    pub fn summaries(&self) -> Vec<ToolSummary> {
        self.tools.iter().map(ToolSummary::from).collect()
    }

    /// Look up a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Tool names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Helper macro for creating object input schemas.
#[macro_export]
macro_rules! tool_schema {
    ({ $($props:tt)* }, [$($required:expr),* $(,)?]) => {
        serde_json::json!({
            "type": "object",
            "properties": { $($props)* },
            "required": [$($required),*]
        })
    };
}
