//! Tool descriptors exposed to the reasoning backend.
//!
//! The set of tools is fixed: each descriptor pairs a name and a
//! description with a zero-argument inspection function. Dispatch goes
//! through a name map built once when the [`ToolSet`] is created.

use crate::inspector::PackageInspector;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// A single inspection tool.
#[derive(Clone, Copy)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub invoke: fn(&PackageInspector) -> String,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Tool definition for Ollama's tool-calling API.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDescriptor {
    /// Render as an Ollama function definition. All tools take no arguments.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name.to_string(),
                description: self.description.to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
        }
    }
}

/// The four inspection tools, in the order they are advertised.
pub const INSPECTION_TOOLS: [ToolDescriptor; 4] = [
    ToolDescriptor {
        name: "inspect_metadata",
        description: "Extracts and returns the package metadata (e.g., name, author, URL).",
        invoke: PackageInspector::inspect_metadata,
    },
    ToolDescriptor {
        name: "inspect_setup_py",
        description: "Returns the content of setup.py if present.",
        invoke: PackageInspector::inspect_setup_py,
    },
    ToolDescriptor {
        name: "inspect_init_py",
        description: "Returns the content of __init__.py from the package directory.",
        invoke: PackageInspector::inspect_init_py,
    },
    ToolDescriptor {
        name: "inspect_project_structure",
        description: "Returns the directory structure of the package.",
        invoke: PackageInspector::inspect_project_structure,
    },
];

/// Tools bound to one package.
pub struct ToolSet {
    inspector: PackageInspector,
    tools: Vec<ToolDescriptor>,
    by_name: HashMap<&'static str, ToolDescriptor>,
}

impl ToolSet {
    /// Bind the standard inspection tools to `inspector`.
    pub fn new(inspector: PackageInspector) -> Self {
        Self::with_tools(inspector, INSPECTION_TOOLS.to_vec())
    }

    /// Bind an explicit list of tools. Later duplicates of a name are ignored.
    pub fn with_tools(inspector: PackageInspector, tools: Vec<ToolDescriptor>) -> Self {
        let mut by_name = HashMap::with_capacity(tools.len());
        let mut kept = Vec::with_capacity(tools.len());
        for tool in tools {
            if by_name.contains_key(tool.name) {
                warn!("Duplicate tool name {} ignored", tool.name);
                continue;
            }
            by_name.insert(tool.name, tool);
            kept.push(tool);
        }

        Self {
            inspector,
            tools: kept,
            by_name,
        }
    }

    /// Advertised tools, in order.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Ollama function definitions for every advertised tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolDescriptor::definition).collect()
    }

    /// Run the tool called `name`. Unknown names produce an observation, not an error.
    pub fn invoke(&self, name: &str) -> String {
        match self.by_name.get(name) {
            Some(tool) => {
                debug!("Executing tool: {}", name);
                (tool.invoke)(&self.inspector)
            }
            None => {
                warn!("Backend requested unknown tool: {}", name);
                format!("Unknown tool: {}", name)
            }
        }
    }

    pub fn inspector(&self) -> &PackageInspector {
        &self.inspector
    }
}
