//! YAML parsing with error handling

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use walkdir::WalkDir;

use crate::yaml::diagnostics::{YamlError, YamlSyntaxError};

/// Parse YAML content into a typed value, keeping the source for diagnostics
pub fn parse_yaml<T: DeserializeOwned>(content: &str, filename: &str) -> Result<T, YamlError> {
    serde_yml::from_str(content).map_err(|e| {
        YamlError::Syntax(YamlSyntaxError::from_serde_error(&e, content, filename))
    })
}

/// Parse YAML from a file path
pub fn parse_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T, YamlError> {
    let content = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();
    parse_yaml(&content, &filename)
}

/// Whether a path names a YAML file
pub fn is_yaml_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// YAML files under `path`, sorted; a file path yields itself
///
/// Hidden directories are skipped.
pub fn yaml_files(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') || e.depth() == 0
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_yaml_file(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Port {
        name: String,
        positions: u16,
    }

    #[test]
    fn test_parse_valid_yaml() {
        let port: Port = parse_yaml("name: Rear 1\npositions: 4", "port.yaml").unwrap();
        assert_eq!(port.name, "Rear 1");
        assert_eq!(port.positions, 4);
    }

    #[test]
    fn test_parse_invalid_yaml_returns_error() {
        let result: Result<Port, _> = parse_yaml("name: x\n  bad indentation", "port.yaml");
        assert!(matches!(result, Err(YamlError::Syntax(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result: Result<Port, _> = parse_yaml_file(Path::new("/nonexistent/port.yaml"));
        assert!(matches!(result, Err(YamlError::Io(_))));
    }

    #[test]
    fn test_yaml_files_walks_sorted_and_skips_hidden() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".cache")).unwrap();
        std::fs::create_dir(dir.path().join("site")).unwrap();
        std::fs::write(dir.path().join("b.yaml"), "").unwrap();
        std::fs::write(dir.path().join("site/a.yml"), "").unwrap();
        std::fs::write(dir.path().join(".cache/c.yaml"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = yaml_files(dir.path());
        assert_eq!(
            files,
            vec![dir.path().join("b.yaml"), dir.path().join("site/a.yml")]
        );
    }
}
