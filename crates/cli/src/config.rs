//! Loads the YAML routing configuration.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use routing::{RelayConfig, RoutingTable};

/// Reads, parses and validates the configuration at `path`.
pub fn load_routing_table(path: &Path) -> Result<RoutingTable> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_routing_table(&text)
        .with_context(|| format!("invalid config file {}", path.display()))
}

/// Parses and validates a configuration document.
pub fn parse_routing_table(text: &str) -> Result<RoutingTable> {
    let config: RelayConfig = serde_yaml::from_str(text).context("failed to parse YAML")?;
    let table = config.validate()?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const EXAMPLE: &str = r#"
access:
  repo_plugins:
    org1: [p1]
    org1/repo1: [p2]
  plugins:
    - name: p1
      endpoint: http://e1.internal:8080/hook
      events: ["Issue Hook"]
    - name: p2
      endpoint: https://e2.internal/hook
"#;

    fn write(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_example_file() {
        let file = write(EXAMPLE);
        let table = load_routing_table(file.path()).unwrap();

        assert_eq!(table.destinations().len(), 2);
        assert_eq!(table.scope_count(), 2);
        let endpoints = table.resolve("org1", "repo1", "Push Hook");
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].url.as_str(), "https://e2.internal/hook");
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let err = load_routing_table(&path).unwrap_err();
        assert!(format!("{err:#}").contains("absent.yaml"));
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        let file = write("access: [unclosed");
        let err = load_routing_table(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse YAML"));
    }

    #[test]
    fn unknown_destination_is_rejected() {
        let err = parse_routing_table(
            r#"
access:
  repo_plugins:
    org1: [p2]
  plugins:
    - name: p1
      endpoint: http://e1.internal/hook
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("p2"));
    }

    #[test]
    fn empty_document_is_an_empty_table() {
        let table = parse_routing_table("{}").unwrap();
        assert!(table.destinations().is_empty());
    }
}
