//! HTTP client for the database tool server
//!
//! The tool server owns the database connection and the SQL statements. It
//! publishes tool metadata under `GET /api/toolset[/{name}]` and executes a
//! tool under `POST /api/tool/{name}/invoke` with named arguments, answering
//! with `{"result": ...}`.

use crate::config::ToolboxConfig;
use crate::error::{Result, RentaldeskError};
use crate::tools::{ParameterSpec, ToolDescriptor};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Something whose reachability `/health` reports
#[async_trait]
pub trait ConnectivityCheck: Send + Sync {
    /// Succeeds when the collaborator answers
    ///
    /// # Errors
    ///
    /// Returns the failure that made the collaborator unreachable
    async fn check(&self) -> Result<()>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsetManifest {
    #[serde(default)]
    server_version: Option<String>,
    #[serde(default)]
    tools: BTreeMap<String, ToolsetTool>,
}

#[derive(Debug, Deserialize)]
struct ToolsetTool {
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Vec<ParameterSpec>,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    result: serde_json::Value,
}

/// Client for the tool server
#[derive(Debug, Clone)]
pub struct ToolboxClient {
    client: Client,
    base_url: Url,
    toolset: Option<String>,
}

impl ToolboxClient {
    /// Create a client for the configured tool server
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::Config` for an unparsable URL and
    /// `RentaldeskError::Toolbox` if the HTTP client cannot be built
    pub fn new(config: &ToolboxConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url).map_err(|e| {
            RentaldeskError::Config(format!("Invalid toolbox URL '{}': {}", config.url, e))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                RentaldeskError::Toolbox(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            toolset: config.toolset.clone(),
        })
    }

    /// Base URL of the tool server
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// Fetches tool descriptors for a toolset, or the default toolset
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::Toolbox` if the server is unreachable,
    /// answers with an error status, or sends an unreadable manifest
    pub async fn load_toolset(&self, name: Option<&str>) -> Result<Vec<ToolDescriptor>> {
        let url = self.endpoint(&format!("api/toolset/{}", name.unwrap_or_default()));

        let response = self.client.get(&url).send().await.map_err(|e| {
            RentaldeskError::Toolbox(format!("Cannot reach tool server at {}: {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RentaldeskError::Toolbox(format!(
                "Loading toolset failed with {}: {}",
                status, body
            ))
            .into());
        }

        let manifest: ToolsetManifest = response.json().await.map_err(|e| {
            RentaldeskError::Toolbox(format!("Unreadable toolset manifest: {}", e))
        })?;

        tracing::info!(
            server_version = manifest.server_version.as_deref().unwrap_or("unknown"),
            tools = manifest.tools.len(),
            "Loaded toolset from tool server"
        );

        Ok(manifest
            .tools
            .into_iter()
            .map(|(name, tool)| ToolDescriptor {
                name,
                description: tool.description,
                parameters: tool.parameters,
                statement_template: None,
            })
            .collect())
    }

    /// Invokes a tool with named arguments and returns its textual result
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::Toolbox` when the server cannot be reached
    /// and `RentaldeskError::Tool` when it reports a failed invocation
    pub async fn invoke(
        &self,
        tool: &str,
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String> {
        let url = self.endpoint(&format!("api/tool/{}/invoke", tool));
        tracing::debug!(tool, "Invoking tool");

        let response = self.client.post(&url).json(args).send().await.map_err(|e| {
            RentaldeskError::Toolbox(format!("Cannot reach tool server at {}: {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(tool, %status, "Tool invocation failed");
            return Err(RentaldeskError::Tool(format!(
                "'{}' failed with {}: {}",
                tool, status, body
            ))
            .into());
        }

        let body: InvokeResponse = response.json().await.map_err(|e| {
            RentaldeskError::Toolbox(format!("Unreadable response from '{}': {}", tool, e))
        })?;

        Ok(match body.result {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        })
    }
}

#[async_trait]
impl ConnectivityCheck for ToolboxClient {
    async fn check(&self) -> Result<()> {
        self.load_toolset(self.toolset.as_deref()).await.map(|_| ())
    }
}
