//! core::config
//!
//! Raw configuration loading and layer merging.
//!
//! # Design
//!
//! A workstation is described by a root YAML file plus optional overlay
//! layers under `layers/*.yaml`. Layers are merged map-wise (deep merge,
//! last layer wins for scalars and sequences), and each top-level section
//! remembers the last layer that touched it so drift can be attributed
//! back to a layer file.
//!
//! Schema validation of section contents is the owning provider's job;
//! this module only guarantees a well-formed top-level mapping.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading a configuration file.
    #[error("config i/o error for {path}: {source}")]
    Io {
        /// The file that failed to read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// YAML parse error.
    #[error("config parse error for {path}: {source}")]
    Yaml {
        /// The file that failed to parse.
        path: PathBuf,
        /// Underlying error.
        source: serde_yaml::Error,
    },

    /// The document root is not a mapping.
    #[error("config root of {0} must be a mapping")]
    NotAMapping(PathBuf),

    /// A top-level key is not a string.
    #[error("config {0} has a non-string top-level key")]
    NonStringKey(PathBuf),
}

/// Name given to the root configuration file's layer.
pub const BASE_LAYER: &str = "base";

/// The merged raw configuration: top-level sections keyed by provider
/// name, each remembering its owning layer.
///
/// # Example
///
/// ```
/// use preflight::core::config::RawConfig;
///
/// let mut config = RawConfig::new();
/// config.merge_layer("base", serde_yaml::from_str("files:\n  link:\n    zshrc: dotfiles/zshrc\n").unwrap()).unwrap();
/// config.merge_layer("work", serde_yaml::from_str("brew:\n  formulae: [ripgrep]\n").unwrap()).unwrap();
///
/// let sections: Vec<&str> = config.sections().map(|(k, _)| k).collect();
/// assert_eq!(sections, vec!["brew", "files"]);
/// assert_eq!(config.layer_of("brew"), Some("work"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    sections: BTreeMap<String, Value>,
    section_layers: BTreeMap<String, String>,
}

impl RawConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the root config file and any `layers/*.yaml` overlays beside
    /// it. Overlays merge in filename order, last wins.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        config.merge_file(BASE_LAYER, config_path)?;

        let layers_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("layers");
        if layers_dir.is_dir() {
            let mut layer_files: Vec<PathBuf> = fs::read_dir(&layers_dir)
                .map_err(|source| ConfigError::Io {
                    path: layers_dir.clone(),
                    source,
                })?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    matches!(
                        path.extension().and_then(|e| e.to_str()),
                        Some("yaml") | Some("yml")
                    )
                })
                .collect();
            layer_files.sort();

            for path in layer_files {
                let layer = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(BASE_LAYER)
                    .to_string();
                config.merge_file(&layer, &path)?;
            }
        }

        Ok(config)
    }

    fn merge_file(&mut self, layer: &str, path: &Path) -> Result<(), ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(());
        }
        let doc: Value = serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        let mapping = match doc {
            Value::Mapping(m) => m,
            Value::Null => Mapping::new(),
            _ => return Err(ConfigError::NotAMapping(path.to_path_buf())),
        };
        self.merge_mapping(layer, mapping)
            .map_err(|_| ConfigError::NonStringKey(path.to_path_buf()))
    }

    /// Merge a parsed top-level mapping as one layer.
    pub fn merge_layer(&mut self, layer: &str, mapping: Mapping) -> Result<(), ConfigError> {
        self.merge_mapping(layer, mapping)
            .map_err(|_| ConfigError::NonStringKey(PathBuf::from(layer)))
    }

    fn merge_mapping(&mut self, layer: &str, mapping: Mapping) -> Result<(), ()> {
        for (key, value) in mapping {
            let Some(key) = key.as_str().map(str::to_string) else {
                return Err(());
            };
            match self.sections.get_mut(&key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    self.sections.insert(key.clone(), value);
                }
            }
            self.section_layers.insert(key, layer.to_string());
        }
        Ok(())
    }

    /// Iterate top-level sections sorted by key.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up one section's fragment.
    pub fn section(&self, key: &str) -> Option<&Value> {
        self.sections.get(key)
    }

    /// The last layer that touched a section.
    pub fn layer_of(&self, key: &str) -> Option<&str> {
        self.section_layers.get(key).map(String::as_str)
    }

    /// Whether the configuration has no sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Deep merge an overlay value into a base value. Mappings merge
/// key-wise; scalars and sequences are replaced by the overlay.
fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn yaml(s: &str) -> Mapping {
        serde_yaml::from_str(s).expect("valid yaml mapping")
    }

    #[test]
    fn empty_config() {
        let config = RawConfig::new();
        assert!(config.is_empty());
        assert_eq!(config.sections().count(), 0);
    }

    #[test]
    fn sections_sorted_by_key() {
        let mut config = RawConfig::new();
        config
            .merge_layer("base", yaml("zsh: {}\napt: {}\nbrew: {}\n"))
            .unwrap();
        let keys: Vec<&str> = config.sections().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["apt", "brew", "zsh"]);
    }

    #[test]
    fn later_layer_wins_scalars() {
        let mut config = RawConfig::new();
        config
            .merge_layer("base", yaml("git:\n  user: alice\n  email: a@example.com\n"))
            .unwrap();
        config.merge_layer("work", yaml("git:\n  user: bob\n")).unwrap();

        let git = config.section("git").unwrap();
        assert_eq!(git.get("user"), Some(&Value::from("bob")));
        // Untouched nested keys survive the merge.
        assert_eq!(git.get("email"), Some(&Value::from("a@example.com")));
        assert_eq!(config.layer_of("git"), Some("work"));
    }

    #[test]
    fn sequences_replaced_not_appended() {
        let mut config = RawConfig::new();
        config
            .merge_layer("base", yaml("brew:\n  formulae: [fd, jq]\n"))
            .unwrap();
        config
            .merge_layer("work", yaml("brew:\n  formulae: [ripgrep]\n"))
            .unwrap();

        let formulae = config.section("brew").unwrap().get("formulae").unwrap();
        assert_eq!(formulae.as_sequence().unwrap().len(), 1);
    }

    #[test]
    fn load_with_layers_dir() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("preflight.yaml"), "files:\n  link:\n    zshrc: dotfiles/zshrc\n")
            .unwrap();
        fs::create_dir(root.join("layers")).unwrap();
        fs::write(root.join("layers/work.yaml"), "brew:\n  formulae: [ripgrep]\n").unwrap();

        let config = RawConfig::load(&root.join("preflight.yaml")).unwrap();
        assert!(config.section("files").is_some());
        assert!(config.section("brew").is_some());
        assert_eq!(config.layer_of("files"), Some("base"));
        assert_eq!(config.layer_of("brew"), Some("work"));
    }

    #[test]
    fn load_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("preflight.yaml");
        fs::write(&path, "").unwrap();
        let config = RawConfig::load(&path).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn load_rejects_non_mapping_root() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("preflight.yaml");
        fs::write(&path, "- just\n- a\n- list\n").unwrap();
        let err = RawConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::NotAMapping(_)));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = RawConfig::load(Path::new("/nonexistent/preflight.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
