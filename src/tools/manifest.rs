//! Tool descriptors and the tool server manifest
//!
//! The tool server is configured with a YAML manifest holding `sources`,
//! `tools` and `toolsets`. Each tool is a parameterized SQL statement whose
//! positional placeholders (`$1`, `$2`, ...) are bound from the declared
//! parameters in order. This module parses that manifest into immutable
//! [`ToolDescriptor`]s and validates them before anything is registered.

use crate::error::{Result, RentaldeskError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

/// Declared type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// Free text
    String,
    /// Whole number
    Integer,
    /// Floating point number
    Float,
    /// True or false
    Boolean,
}

impl ParameterType {
    /// JSON schema type name used in tool definitions
    pub fn json_type(self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Float => "number",
            ParameterType::Boolean => "boolean",
        }
    }

    /// Coerces a model-supplied argument into this type
    ///
    /// Models frequently send numbers as strings (`"2005"`) and the other way
    /// round, so lossless conversions are accepted.
    pub fn coerce(self, value: &serde_json::Value) -> Option<serde_json::Value> {
        use serde_json::Value;

        match (self, value) {
            (ParameterType::String, Value::String(_)) => Some(value.clone()),
            (ParameterType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (ParameterType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (ParameterType::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Value::from),
            (ParameterType::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().ok().map(Value::from)
            }
            (ParameterType::Float, Value::Number(n)) => n.as_f64().map(Value::from),
            (ParameterType::Float, Value::String(s)) => {
                s.trim().parse::<f64>().ok().map(Value::from)
            }
            (ParameterType::Boolean, Value::Bool(_)) => Some(value.clone()),
            (ParameterType::Boolean, Value::String(s)) => {
                match s.trim().to_ascii_lowercase().as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Float => "float",
            ParameterType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// One declared tool parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name, unique within its tool
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// Description shown to the model
    #[serde(default)]
    pub description: String,
}

impl ParameterSpec {
    /// Create a new parameter spec
    pub fn new(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
        }
    }
}

/// Static metadata for one callable database operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name
    pub name: String,
    /// Natural-language description used by the model for tool selection
    pub description: String,
    /// Parameters in placeholder order
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    /// SQL statement, when loaded from a local manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_template: Option<String>,
}

impl ToolDescriptor {
    /// Create a descriptor without parameters
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            statement_template: None,
        }
    }

    /// Append a parameter
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Attach the SQL statement
    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement_template = Some(statement.into());
        self
    }

    /// Validates the descriptor
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::Manifest` if the name is empty, a parameter
    /// name is empty or repeated, or the statement's positional placeholders
    /// are not exactly `$1..$n` for `n` declared parameters
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(
                RentaldeskError::Manifest("Tool name must not be empty".to_string()).into(),
            );
        }

        let mut seen = HashSet::new();
        for parameter in &self.parameters {
            if parameter.name.trim().is_empty() {
                return Err(RentaldeskError::Manifest(format!(
                    "Tool '{}' has a parameter without a name",
                    self.name
                ))
                .into());
            }
            if !seen.insert(parameter.name.as_str()) {
                return Err(RentaldeskError::Manifest(format!(
                    "Tool '{}' declares parameter '{}' twice",
                    self.name, parameter.name
                ))
                .into());
            }
        }

        if let Some(statement) = &self.statement_template {
            let used = placeholders(statement)?;
            let expected: BTreeSet<usize> = (1..=self.parameters.len()).collect();
            if used != expected {
                return Err(RentaldeskError::Manifest(format!(
                    "Tool '{}' declares {} parameter(s) but its statement uses placeholders {:?}",
                    self.name,
                    self.parameters.len(),
                    used.iter().map(|n| format!("${}", n)).collect::<Vec<_>>()
                ))
                .into());
            }
        }

        Ok(())
    }

    /// JSON schema describing the parameters
    pub fn json_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    serde_json::json!({
                        "type": p.param_type.json_type(),
                        "description": p.description,
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = self.parameters.iter().map(|p| p.name.as_str()).collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Binds named arguments to the declared parameters, in declared order
    ///
    /// The returned values line up with the statement's `$1..$n`
    /// placeholders. Unknown arguments are ignored.
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::Tool` when an argument is missing or cannot
    /// be coerced to its declared type
    pub fn bind_arguments(&self, args: &serde_json::Value) -> Result<Vec<serde_json::Value>> {
        let empty = serde_json::Map::new();
        let object = match args {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => &empty,
            other => {
                return Err(RentaldeskError::Tool(format!(
                    "Arguments for '{}' must be an object, got {}",
                    self.name, other
                ))
                .into())
            }
        };

        self.parameters
            .iter()
            .map(|p| -> Result<serde_json::Value> {
                let raw = object.get(&p.name).ok_or_else(|| {
                    RentaldeskError::Tool(format!(
                        "Missing argument '{}' for tool '{}'",
                        p.name, self.name
                    ))
                })?;
                let value = p.param_type.coerce(raw).ok_or_else(|| {
                    RentaldeskError::Tool(format!(
                        "Argument '{}' for tool '{}' must be {}, got {}",
                        p.name, self.name, p.param_type, raw
                    ))
                })?;
                Ok(value)
            })
            .collect()
    }
}

fn placeholders(statement: &str) -> Result<BTreeSet<usize>> {
    let pattern = Regex::new(r"\$(\d+)")
        .map_err(|e| RentaldeskError::Manifest(format!("Invalid placeholder pattern: {}", e)))?;
    Ok(pattern
        .captures_iter(statement)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().parse().ok())
        .collect())
}

/// One tool entry in the manifest
#[derive(Debug, Clone, Deserialize)]
struct ManifestTool {
    kind: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Vec<ParameterSpec>,
    #[serde(default)]
    statement: Option<String>,
}

/// Parsed tool server manifest
#[derive(Debug, Clone, Deserialize)]
pub struct ToolManifest {
    /// Data sources, kept opaque
    #[serde(default)]
    pub sources: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    tools: BTreeMap<String, ManifestTool>,
    /// Named groups of tools
    #[serde(default)]
    pub toolsets: BTreeMap<String, Vec<String>>,
}

impl ToolManifest {
    /// Parses and validates a manifest from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed (including repeated tool
    /// names) or any tool fails validation
    ///
    /// # Examples
    ///
    /// ```
    /// use rentaldesk::tools::ToolManifest;
    ///
    /// let manifest = ToolManifest::from_yaml(r#"
    /// tools:
    ///   films-by-year:
    ///     kind: postgres-sql
    ///     description: Films released in a given year
    ///     parameters:
    ///       - name: year
    ///         type: integer
    ///         description: Release year
    ///     statement: SELECT title FROM film WHERE release_year = $1;
    /// "#).unwrap();
    ///
    /// assert_eq!(manifest.descriptors(None).unwrap().len(), 1);
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: ToolManifest = serde_yaml::from_str(yaml)
            .map_err(|e| RentaldeskError::Manifest(format!("Invalid tool manifest: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reads, parses and validates a manifest file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RentaldeskError::Manifest(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let manifest = Self::from_yaml(&contents)?;
        tracing::info!(
            path = %path.display(),
            tools = manifest.tools.len(),
            "Loaded tool manifest"
        );
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        for (name, tool) in &self.tools {
            if let Some(source) = &tool.source {
                if !self.sources.is_empty() && !self.sources.contains_key(source) {
                    return Err(RentaldeskError::Manifest(format!(
                        "Tool '{}' references unknown source '{}'",
                        name, source
                    ))
                    .into());
                }
            }
            if tool.kind.ends_with("-sql") && tool.statement.is_none() {
                return Err(RentaldeskError::Manifest(format!(
                    "Tool '{}' of kind '{}' has no statement",
                    name, tool.kind
                ))
                .into());
            }
            self.descriptor(name, tool).validate()?;
        }

        for (toolset, members) in &self.toolsets {
            let mut seen = HashSet::new();
            for member in members {
                if !self.tools.contains_key(member) {
                    return Err(RentaldeskError::Manifest(format!(
                        "Toolset '{}' references unknown tool '{}'",
                        toolset, member
                    ))
                    .into());
                }
                if !seen.insert(member) {
                    return Err(RentaldeskError::Manifest(format!(
                        "Toolset '{}' lists '{}' twice",
                        toolset, member
                    ))
                    .into());
                }
            }
        }

        Ok(())
    }

    fn descriptor(&self, name: &str, tool: &ManifestTool) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
            statement_template: tool.statement.clone(),
        }
    }

    /// Number of tools declared
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the manifest declares no tools
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors for a toolset, or every tool when `toolset` is `None`
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::Manifest` if the named toolset does not exist
    pub fn descriptors(&self, toolset: Option<&str>) -> Result<Vec<ToolDescriptor>> {
        match toolset {
            None => Ok(self
                .tools
                .iter()
                .map(|(name, tool)| self.descriptor(name, tool))
                .collect()),
            Some(set) => {
                let members = self.toolsets.get(set).ok_or_else(|| {
                    RentaldeskError::Manifest(format!("Unknown toolset '{}'", set))
                })?;
                Ok(members
                    .iter()
                    .filter_map(|name| {
                        self.tools.get(name).map(|tool| self.descriptor(name, tool))
                    })
                    .collect())
            }
        }
    }
}
