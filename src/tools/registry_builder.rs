//! Tool registry construction
//!
//! Descriptors come from a local manifest when `toolbox.manifest_path` is
//! set, otherwise from the live tool server's toolset. Either way every
//! descriptor is validated and registered as a [`DatabaseTool`] once, at
//! startup.

use std::sync::Arc;

use crate::config::ToolboxConfig;
use crate::error::Result;
use crate::tools::{DatabaseTool, ToolDescriptor, ToolManifest, ToolRegistry, ToolboxClient};

/// Loads the descriptors the registry will expose
///
/// # Errors
///
/// Returns error if the manifest is invalid or the tool server cannot
/// provide the toolset
pub async fn load_descriptors(
    config: &ToolboxConfig,
    client: &ToolboxClient,
) -> Result<Vec<ToolDescriptor>> {
    match &config.manifest_path {
        Some(path) => ToolManifest::load(path)?.descriptors(config.toolset.as_deref()),
        None => client.load_toolset(config.toolset.as_deref()).await,
    }
}

/// Registers a [`DatabaseTool`] for each descriptor
///
/// # Errors
///
/// Returns error on the first invalid or duplicate descriptor
pub fn registry_from_descriptors(
    descriptors: Vec<ToolDescriptor>,
    client: Arc<ToolboxClient>,
) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for descriptor in descriptors {
        descriptor.validate()?;
        let name = descriptor.name.clone();
        registry.register(name, Arc::new(DatabaseTool::new(descriptor, client.clone())))?;
    }
    Ok(registry)
}

/// Builds the immutable registry shared by every session
///
/// # Errors
///
/// Returns error if descriptors cannot be loaded or fail validation
pub async fn build_registry(
    config: &ToolboxConfig,
    client: Arc<ToolboxClient>,
) -> Result<Arc<ToolRegistry>> {
    let descriptors = load_descriptors(config, &client).await?;
    let registry = registry_from_descriptors(descriptors, client)?;

    if registry.is_empty() {
        tracing::warn!("Tool registry is empty; the assistant cannot query the database");
    } else {
        tracing::info!(tools = registry.len(), "Tool registry ready");
    }

    Ok(Arc::new(registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParameterSpec, ParameterType};
    use std::io::Write;

    fn client() -> Arc<ToolboxClient> {
        Arc::new(ToolboxClient::new(&ToolboxConfig::default()).unwrap())
    }

    #[test]
    fn test_registry_from_descriptors_rejects_duplicates() {
        let descriptors = vec![
            ToolDescriptor::new("list-customers", "List customers"),
            ToolDescriptor::new("list-customers", "List customers again"),
        ];
        assert!(registry_from_descriptors(descriptors, client()).is_err());
    }

    #[test]
    fn test_registry_from_descriptors_validates() {
        let descriptor = ToolDescriptor::new("films-by-year", "Films in a year")
            .with_parameter(ParameterSpec::new("year", ParameterType::Integer, ""))
            .with_statement("SELECT title FROM film");
        assert!(registry_from_descriptors(vec![descriptor], client()).is_err());
    }

    #[tokio::test]
    async fn test_build_registry_from_manifest_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
tools:
  get-film-categories:
    kind: postgres-sql
    description: List categories
    statement: SELECT name FROM category;
  films-by-year:
    kind: postgres-sql
    description: Films in a year
    parameters:
      - name: year
        type: integer
    statement: SELECT title FROM film WHERE release_year = $1;
"#
        )
        .unwrap();

        let config = ToolboxConfig {
            manifest_path: Some(file.path().display().to_string()),
            ..Default::default()
        };
        let registry = build_registry(&config, client()).await.unwrap();
        assert_eq!(registry.names(), vec!["films-by-year", "get-film-categories"]);
    }
}
