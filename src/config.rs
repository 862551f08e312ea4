use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CodemodError;
use crate::telemetry::normalize_identity;

/// Default file name looked up in the working directory.
pub const CONFIG_FILE: &str = "codemod.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodemodConfig {
    /// Root that template identities and the helper path are relative to
    pub project_root: PathBuf,
    /// Runtime stub location, relative to `project_root`
    pub helper_path: PathBuf,
    /// Template file extensions eligible for either pass
    pub extensions: Vec<String>,
    /// Rewrite files even when a pass changed nothing
    pub write_unchanged: bool,
}

impl Default for CodemodConfig {
    fn default() -> Self {
        CodemodConfig {
            project_root: PathBuf::from("."),
            helper_path: PathBuf::from("app/helpers/-probe-is-component.js"),
            extensions: vec!["hbs".to_string()],
            write_unchanged: false,
        }
    }
}

impl CodemodConfig {
    pub fn load(path: &Path) -> Result<Self, CodemodError> {
        let json = fs::read_to_string(path).map_err(|e| CodemodError::io(path, e))?;
        serde_json::from_str(&json).map_err(|e| CodemodError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// `path` if given, otherwise `codemod.json` when present, otherwise defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, CodemodError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.is_file() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn helper_file(&self) -> PathBuf {
        self.project_root.join(&self.helper_path)
    }

    pub fn is_eligible(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|allowed| allowed == ext))
            .unwrap_or(false)
    }

    /// Telemetry join key for a file: its path relative to the project root.
    pub fn identity_for(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.project_root).unwrap_or(path);
        normalize_identity(&relative.to_string_lossy())
    }

    /// File a telemetry identity refers to.
    pub fn resolve(&self, identity: &str) -> PathBuf {
        let path = Path::new(identity);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CodemodConfig::default();
        assert_eq!(config.extensions, vec!["hbs"]);
        assert!(!config.write_unchanged);
        assert_eq!(
            config.helper_file(),
            PathBuf::from("./app/helpers/-probe-is-component.js")
        );
    }

    #[test]
    fn test_load_fills_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("codemod.json");
        fs::write(&path, r#"{"projectRoot": "web", "writeUnchanged": true}"#).unwrap();

        let config = CodemodConfig::load(&path).unwrap();
        assert_eq!(config.project_root, PathBuf::from("web"));
        assert!(config.write_unchanged);
        assert_eq!(config.extensions, vec!["hbs"]);
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("codemod.json");
        fs::write(&path, r#"{"extensions": "hbs"}"#).unwrap();
        let err = CodemodConfig::load(&path).unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_CONFIG);
    }

    #[test]
    fn test_eligibility_and_identity() {
        let config = CodemodConfig {
            project_root: PathBuf::from("/srv/app"),
            ..CodemodConfig::default()
        };
        assert!(config.is_eligible(Path::new("/srv/app/templates/a.hbs")));
        assert!(!config.is_eligible(Path::new("/srv/app/templates/a.js")));
        assert!(!config.is_eligible(Path::new("/srv/app/Makefile")));
        assert_eq!(
            config.identity_for(Path::new("/srv/app/templates/a.hbs")),
            "templates/a.hbs"
        );
        assert_eq!(
            config.resolve("templates/a.hbs"),
            PathBuf::from("/srv/app/templates/a.hbs")
        );
    }
}
