/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `serve` runs the HTTP chat backend
- `tools` lists and validates the tool descriptors

Both wire the library components together: providers, the tool registry,
agents, sessions and the request handler.
*/

use crate::config::Config;
use crate::error::Result;
use crate::tools::ToolboxClient;
use std::sync::Arc;

// HTTP backend command handler
pub mod serve {
    //! Backend startup.
    //!
    //! Builds the provider, loads the tool registry once, and serves the
    //! HTTP API until Ctrl-C. Startup fails if the tools cannot be loaded.

    use super::*;
    use crate::agent::AssistantFactory;
    use crate::config::EvictionKind;
    use crate::handler::RequestHandler;
    use crate::providers::create_provider;
    use crate::server::{self, AppState};
    use crate::session::{eviction, SessionRegistry};
    use crate::tools::build_registry;
    use std::time::Duration;

    /// Run the chat backend
    ///
    /// # Errors
    ///
    /// Returns error if the provider, tool registry or listener cannot be set up
    pub async fn run_server(config: Config) -> Result<()> {
        let provider = create_provider(&config.provider)?;
        let client = Arc::new(ToolboxClient::new(&config.toolbox)?);
        let tools = build_registry(&config.toolbox, client.clone()).await?;

        tracing::info!(
            provider = provider.name(),
            tools = tools.len(),
            toolbox = %client.base_url(),
            "Assistant configured"
        );

        let factory = Arc::new(AssistantFactory::new(provider, tools, config.agent.clone()));
        let registry = Arc::new(SessionRegistry::with_policy(
            factory,
            eviction::from_config(&config.sessions),
        ));

        let sweeper = (config.sessions.eviction != EvictionKind::None).then(|| {
            registry.spawn_sweeper(Duration::from_secs(config.sessions.sweep_interval_seconds))
        });

        let handler = Arc::new(RequestHandler::from_config(registry, &config.handler));
        let state = AppState::new(handler, client);

        let result = server::serve(&config.server, state).await;

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        result
    }
}

// Tool listing command handler
pub mod tools {
    //! Prints the tools the assistant would be given.

    use super::*;
    use crate::tools::registry_builder::{load_descriptors, registry_from_descriptors};
    use crate::tools::{ToolDescriptor, ToolManifest};
    use std::path::PathBuf;

    /// List tool descriptors from a manifest or the tool server
    ///
    /// Descriptors are registered into a throwaway registry first, so
    /// anything the backend would reject at startup is reported here too.
    ///
    /// # Errors
    ///
    /// Returns error if the descriptors cannot be loaded or are invalid
    pub async fn list_tools(config: &Config, manifest: Option<PathBuf>, json: bool) -> Result<()> {
        let client = Arc::new(ToolboxClient::new(&config.toolbox)?);
        let toolset = config.toolbox.toolset.as_deref();

        let descriptors = match manifest {
            Some(path) => ToolManifest::load(path)?.descriptors(toolset)?,
            None => load_descriptors(&config.toolbox, &client).await?,
        };
        registry_from_descriptors(descriptors.clone(), client)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&descriptors)?);
        } else {
            print!("{}", render(&descriptors));
        }
        Ok(())
    }

    fn render(descriptors: &[ToolDescriptor]) -> String {
        if descriptors.is_empty() {
            return "No tools available\n".to_string();
        }

        let mut out = format!("\nAvailable tools ({}):\n\n", descriptors.len());
        for descriptor in descriptors {
            let params: Vec<String> = descriptor
                .parameters
                .iter()
                .map(|p| format!("{}: {}", p.name, p.param_type))
                .collect();
            out.push_str(&format!("  {}({})\n", descriptor.name, params.join(", ")));
            if !descriptor.description.is_empty() {
                out.push_str(&format!("      {}\n", descriptor.description.trim()));
            }
        }
        out.push('\n');
        out
    }

}
