//! Tools module for Rentaldesk
//!
//! This module contains the tool descriptors loaded from the tool server
//! manifest, the HTTP client for the tool server, the database tool executor
//! and the immutable tool registry handed to every agent.

pub mod database_tool;
pub mod manifest;
pub mod registry_builder;
pub mod toolbox;

pub use database_tool::DatabaseTool;
pub use manifest::{ParameterSpec, ParameterType, ToolDescriptor, ToolManifest};
pub use registry_builder::build_registry;
pub use toolbox::{ConnectivityCheck, ToolboxClient};

use crate::error::{Result, RentaldeskError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Tool result structure
///
/// Represents the result of a tool execution with truncation support.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Whether the tool execution succeeded
    pub success: bool,
    /// Output from the tool
    pub output: String,
    /// Error message if execution failed
    pub error: Option<String>,
    /// Whether the output was truncated
    pub truncated: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            truncated: false,
        }
    }

    /// Create a failed tool result
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            truncated: false,
        }
    }

    /// Truncate output if it exceeds the maximum size
    ///
    /// Truncation happens on a character boundary so multi-byte output
    /// (film titles, emoji) never splits.
    pub fn truncate_if_needed(mut self, max_size: usize) -> Self {
        if self.output.len() > max_size {
            let mut cut = max_size;
            while !self.output.is_char_boundary(cut) {
                cut -= 1;
            }
            self.output.truncate(cut);
            self.output.push_str("\n... (truncated)");
            self.truncated = true;
        }
        self
    }

    /// Convert to a message string for the conversation
    pub fn to_message(&self) -> String {
        if self.success {
            if self.truncated {
                format!("{}\n(Output truncated to fit context window)", self.output)
            } else {
                self.output.clone()
            }
        } else {
            format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("Unknown error")
            )
        }
    }
}

/// Tool executor trait for implementing tool execution logic
///
/// # Examples
///
/// ```no_run
/// use rentaldesk::tools::{ToolExecutor, ToolResult};
/// use rentaldesk::error::Result;
/// use async_trait::async_trait;
/// use serde_json::Value;
///
/// struct CountFilms;
///
/// #[async_trait]
/// impl ToolExecutor for CountFilms {
///     fn tool_definition(&self) -> Value {
///         serde_json::json!({
///             "name": "count-films",
///             "description": "Counts every film in the catalogue",
///             "parameters": {"type": "object", "properties": {}}
///         })
///     }
///
///     async fn execute(&self, _args: Value) -> Result<ToolResult> {
///         Ok(ToolResult::success("1000"))
///     }
/// }
/// ```
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Returns the tool definition as a JSON value
    ///
    /// The definition carries `name`, `description` and a JSON schema under
    /// `parameters`.
    fn tool_definition(&self) -> serde_json::Value;

    /// Executes the tool with the given named arguments
    ///
    /// # Errors
    ///
    /// Returns error if the tool cannot be reached at all; failures reported
    /// by the tool itself come back as a failed [`ToolResult`]
    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult>;
}

/// Tool registry shared by every agent
///
/// Tools are keyed by name. Registration validates the tool definition and
/// rejects duplicates; once built the registry is wrapped in an `Arc` and
/// never mutated again.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool executor in the registry
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::Tool` if the name is empty, already taken,
    /// or does not match the name in the executor's definition, or if the
    /// definition lacks an object parameter schema
    ///
    /// # Examples
    ///
    /// ```
    /// use rentaldesk::tools::{DatabaseTool, ToolDescriptor, ToolRegistry, ToolboxClient};
    /// use rentaldesk::config::ToolboxConfig;
    /// use std::sync::Arc;
    ///
    /// let client = Arc::new(ToolboxClient::new(&ToolboxConfig::default()).unwrap());
    /// let descriptor = ToolDescriptor::new("get-film-categories", "List every film category");
    ///
    /// let mut registry = ToolRegistry::new();
    /// let tool = DatabaseTool::new(descriptor.clone(), client.clone());
    /// registry.register("get-film-categories", Arc::new(tool)).unwrap();
    /// assert!(registry
    ///     .register("get-film-categories", Arc::new(DatabaseTool::new(descriptor, client)))
    ///     .is_err());
    /// ```
    pub fn register(
        &mut self,
        name: impl Into<String>,
        executor: Arc<dyn ToolExecutor>,
    ) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RentaldeskError::Tool("Tool name must not be empty".to_string()).into());
        }
        if self.tools.contains_key(&name) {
            return Err(RentaldeskError::Tool(format!("Duplicate tool name: {}", name)).into());
        }

        let definition = executor.tool_definition();
        let declared = definition.get("name").and_then(|n| n.as_str());
        if declared != Some(name.as_str()) {
            return Err(RentaldeskError::Tool(format!(
                "Tool registered as '{}' declares name {:?}",
                name, declared
            ))
            .into());
        }
        let schema_type = definition
            .get("parameters")
            .and_then(|p| p.get("type"))
            .and_then(|t| t.as_str());
        if schema_type != Some("object") {
            return Err(RentaldeskError::Tool(format!(
                "Tool '{}' must declare an object parameter schema",
                name
            ))
            .into());
        }

        tracing::debug!(tool = %name, "Registered tool");
        self.tools.insert(name, executor);
        Ok(())
    }

    /// Get a tool executor by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions, ordered by tool name
    pub fn all_definitions(&self) -> Vec<serde_json::Value> {
        self.tools
            .values()
            .map(|executor| executor.tool_definition())
            .collect()
    }

    /// Registered tool names, ordered
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockToolExecutor {
        name: String,
        schema_type: &'static str,
    }

    impl MockToolExecutor {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                schema_type: "object",
            })
        }
    }

    #[async_trait]
    impl ToolExecutor for MockToolExecutor {
        fn tool_definition(&self) -> serde_json::Value {
            serde_json::json!({
                "name": self.name,
                "description": "Mock tool",
                "parameters": {"type": self.schema_type}
            })
        }

        async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult> {
            Ok(ToolResult::success("mock output"))
        }
    }

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success("output");
        assert!(result.success);
        assert_eq!(result.output, "output");
        assert!(result.error.is_none());
        assert!(!result.truncated);
    }

    #[test]
    fn test_tool_result_truncation() {
        let result = ToolResult::success("a".repeat(1000)).truncate_if_needed(100);
        assert!(result.truncated);
        assert!(result.output.len() <= 120);
        assert!(result.output.contains("truncated"));
    }

    #[test]
    fn test_tool_result_truncation_respects_char_boundary() {
        let result = ToolResult::success("🎬🎬🎬").truncate_if_needed(5);
        assert!(result.truncated);
        assert!(result.output.starts_with("🎬\n"));
    }

    #[test]
    fn test_tool_result_to_message() {
        assert_eq!(ToolResult::success("output").to_message(), "output");
        assert_eq!(ToolResult::error("failed").to_message(), "Error: failed");
        let truncated = ToolResult::success("output").truncate_if_needed(3);
        assert!(truncated.to_message().contains("truncated"));
    }

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry
            .register("films-by-year", MockToolExecutor::new("films-by-year"))
            .unwrap();
        registry
            .register("count-films-by-year", MockToolExecutor::new("count-films-by-year"))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("films-by-year").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["count-films-by-year", "films-by-year"]);
        assert_eq!(registry.all_definitions().len(), 2);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = ToolRegistry::new();
        registry
            .register("list-customers", MockToolExecutor::new("list-customers"))
            .unwrap();
        let err = registry
            .register("list-customers", MockToolExecutor::new("list-customers"))
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_rejects_mismatched_name() {
        let mut registry = ToolRegistry::new();
        assert!(registry
            .register("create-rental", MockToolExecutor::new("return-rental"))
            .is_err());
        assert!(registry.register("  ", MockToolExecutor::new("  ")).is_err());
    }

    #[test]
    fn test_registry_rejects_non_object_schema() {
        let mut registry = ToolRegistry::new();
        let tool = Arc::new(MockToolExecutor {
            name: "broken".to_string(),
            schema_type: "array",
        });
        assert!(registry.register("broken", tool).is_err());
    }
}
