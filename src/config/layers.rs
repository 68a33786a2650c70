//! Layered key/value sources behind [`RunConfig`](super::RunConfig).
//!
//! Lookup order: process environment, project env file, user settings file.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::utils::settings::Settings;

/// Prefix shared by every configuration key.
pub const KEY_PREFIX: &str = "PRV_";

/// Default env file name, looked up in the repository root.
pub const DEFAULT_ENV_FILE: &str = ".pr-validator.env";

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// A process environment variable.
    Environment,
    /// The project env file.
    EnvFile,
    /// `~/.pr-validator/settings.json`.
    Settings,
}

/// Snapshot of all configuration sources below the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayers {
    /// `PRV_*` variables of the process environment.
    pub environment: HashMap<String, String>,
    /// Entries of the project env file.
    pub env_file: HashMap<String, String>,
    /// Entries of the user settings file.
    pub settings: HashMap<String, String>,
    /// Env file that was read, if any.
    pub env_file_path: Option<PathBuf>,
}

impl ConfigLayers {
    /// Loads every layer.
    ///
    /// `explicit_env_file` must exist when given; the default env file in
    /// `repo_root` is optional.
    pub fn load(repo_root: &Path, explicit_env_file: Option<&Path>) -> Result<Self> {
        let environment = env::vars()
            .filter(|(key, _)| key.starts_with(KEY_PREFIX))
            .collect();

        // A broken settings file should not block validation.
        let settings = match Settings::load() {
            Ok(settings) => settings.env,
            Err(e) => {
                tracing::warn!("Ignoring user settings: {e:#}");
                HashMap::new()
            }
        };

        Self::from_sources(repo_root, explicit_env_file, environment, settings)
    }

    /// Builds the layers from explicit environment and settings maps, reading
    /// only the env file from disk.
    pub fn from_sources(
        repo_root: &Path,
        explicit_env_file: Option<&Path>,
        environment: HashMap<String, String>,
        settings: HashMap<String, String>,
    ) -> Result<Self> {
        let (env_file, env_file_path) = match explicit_env_file {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Env file not found: {}", path.display());
                }
                (read_env_file(path)?, Some(path.to_path_buf()))
            }
            None => {
                let path = repo_root.join(DEFAULT_ENV_FILE);
                if path.exists() {
                    (read_env_file(&path)?, Some(path))
                } else {
                    (HashMap::new(), None)
                }
            }
        };

        Ok(Self {
            environment,
            env_file,
            settings,
            env_file_path,
        })
    }

    /// Looks a key up through the layers; blank values count as unset.
    pub fn get(&self, key: &str) -> Option<(&str, ValueSource)> {
        let layers = [
            (&self.environment, ValueSource::Environment),
            (&self.env_file, ValueSource::EnvFile),
            (&self.settings, ValueSource::Settings),
        ];

        layers.into_iter().find_map(|(map, source)| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| (v, source))
        })
    }

    /// Looks a key up and returns only the value.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).map(|(value, _)| value)
    }
}

/// Reads `KEY=VALUE` lines without touching the process environment.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to open env file: {}", path.display()))?;

    let mut values = HashMap::new();
    for item in iter {
        let (key, value) =
            item.with_context(|| format!("Failed to parse env file: {}", path.display()))?;
        values.insert(key, value);
    }

    tracing::debug!("Loaded {} value(s) from {}", values.len(), path.display());
    Ok(values)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn environment_wins_over_files() {
        let layers = ConfigLayers {
            environment: map(&[("PRV_TARGET_BRANCH", "develop")]),
            env_file: map(&[("PRV_TARGET_BRANCH", "release"), ("PRV_ORG_ALIAS", "qa")]),
            settings: map(&[("PRV_ORG_ALIAS", "dev"), ("PRV_JS_EXT", ".mjs")]),
            env_file_path: None,
        };

        assert_eq!(
            layers.get("PRV_TARGET_BRANCH"),
            Some(("develop", ValueSource::Environment))
        );
        assert_eq!(
            layers.get("PRV_ORG_ALIAS"),
            Some(("qa", ValueSource::EnvFile))
        );
        assert_eq!(
            layers.get("PRV_JS_EXT"),
            Some((".mjs", ValueSource::Settings))
        );
        assert_eq!(layers.get("PRV_TESTS"), None);
    }

    #[test]
    fn blank_values_fall_through() {
        let layers = ConfigLayers {
            environment: map(&[("PRV_ORG_ALIAS", "  ")]),
            env_file: map(&[("PRV_ORG_ALIAS", "uat")]),
            ..Default::default()
        };
        assert_eq!(layers.value("PRV_ORG_ALIAS"), Some("uat"));
    }

    #[test]
    fn env_file_parsing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_ENV_FILE);
        fs::write(
            &path,
            "# defaults for CI\nPRV_TARGET_BRANCH=develop\nPRV_ORG_ALIAS=\"ci sandbox\"\n",
        )
        .unwrap();

        let values = read_env_file(&path).unwrap();
        assert_eq!(values.get("PRV_TARGET_BRANCH").unwrap(), "develop");
        assert_eq!(values.get("PRV_ORG_ALIAS").unwrap(), "ci sandbox");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn default_env_file_is_optional() {
        let temp_dir = TempDir::new().unwrap();
        let layers =
            ConfigLayers::from_sources(temp_dir.path(), None, HashMap::new(), HashMap::new())
                .unwrap();
        assert!(layers.env_file.is_empty());
        assert!(layers.env_file_path.is_none());
    }

    #[test]
    fn default_env_file_is_picked_up() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(DEFAULT_ENV_FILE),
            "PRV_PMD_RULESET=config/pmd.xml\n",
        )
        .unwrap();

        let layers =
            ConfigLayers::from_sources(temp_dir.path(), None, HashMap::new(), HashMap::new())
                .unwrap();
        assert_eq!(
            layers.env_file.get("PRV_PMD_RULESET").map(String::as_str),
            Some("config/pmd.xml")
        );
        assert!(layers.env_file_path.is_some());
    }

    #[test]
    fn explicit_env_file_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.env");
        assert!(ConfigLayers::load(temp_dir.path(), Some(&missing)).is_err());
    }

    #[test]
    fn injected_sources_keep_precedence() {
        let temp_dir = TempDir::new().unwrap();
        let env_path = temp_dir.path().join("ci.env");
        fs::write(&env_path, "PRV_ORG_ALIAS=from-file\nPRV_SF_BIN=sf-file\n").unwrap();

        let layers = ConfigLayers::from_sources(
            temp_dir.path(),
            Some(&env_path),
            map(&[("PRV_ORG_ALIAS", "from-env")]),
            map(&[("PRV_SF_BIN", "sf-settings"), ("PRV_JS_EXT", ".mjs")]),
        )
        .unwrap();

        assert_eq!(
            layers.get("PRV_ORG_ALIAS"),
            Some(("from-env", ValueSource::Environment))
        );
        assert_eq!(layers.get("PRV_SF_BIN"), Some(("sf-file", ValueSource::EnvFile)));
        assert_eq!(layers.get("PRV_JS_EXT"), Some((".mjs", ValueSource::Settings)));
        assert_eq!(layers.env_file_path.as_deref(), Some(env_path.as_path()));
    }
}
