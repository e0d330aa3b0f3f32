//! Tool executor backed by a tool server SQL statement

use crate::error::{Result, RentaldeskError};
use crate::tools::{ToolDescriptor, ToolExecutor, ToolResult, ToolboxClient};

use async_trait::async_trait;
use std::sync::Arc;

/// Executes one named database operation through the tool server
///
/// Arguments from the model are bound to the descriptor's parameters in
/// declared order and coerced to their declared types before the call.
/// Binding problems and failures reported by the tool server come back to
/// the model as failed results so it can correct itself; an unreachable
/// tool server fails the whole turn.
pub struct DatabaseTool {
    descriptor: ToolDescriptor,
    client: Arc<ToolboxClient>,
}

impl DatabaseTool {
    /// Create a tool for the given descriptor
    pub fn new(descriptor: ToolDescriptor, client: Arc<ToolboxClient>) -> Self {
        Self { descriptor, client }
    }

    /// The descriptor this tool executes
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl ToolExecutor for DatabaseTool {
    fn tool_definition(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.descriptor.name,
            "description": self.descriptor.description,
            "parameters": self.descriptor.json_schema(),
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult> {
        let bound = match self.descriptor.bind_arguments(&args) {
            Ok(values) => values,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        let named: serde_json::Map<String, serde_json::Value> = self
            .descriptor
            .parameters
            .iter()
            .map(|p| p.name.clone())
            .zip(bound)
            .collect();

        match self.client.invoke(&self.descriptor.name, &named).await {
            Ok(text) => Ok(ToolResult::success(text)),
            Err(e) => match e.downcast_ref::<RentaldeskError>() {
                Some(RentaldeskError::Tool(_)) => Ok(ToolResult::error(e.to_string())),
                _ => Err(e),
            },
        }
    }
}
