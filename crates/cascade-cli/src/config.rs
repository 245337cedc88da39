//! CLI settings management.

use anyhow::{Context, anyhow, bail};
use cascade_emit::EmitSettings;
use cascade_matrix::{AssemblerSettings, DEFAULT_RAW_CONTENT_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Owner for packages that do not name one.
    pub default_owner: String,
    /// Base URL package configs are fetched from.
    pub raw_content_url: String,
    pub fetch_timeout_secs: u64,
    pub fetch_concurrency: usize,
    /// Command generated setup jobs run.
    pub setup_command: String,
    pub ci_repository: String,
    pub ci_repository_ref: String,
    pub fragments_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        let emit = EmitSettings::default();
        let assembler = AssemblerSettings::default();
        Self {
            default_owner: emit.default_owner,
            raw_content_url: DEFAULT_RAW_CONTENT_URL.to_string(),
            fetch_timeout_secs: assembler.fetch_timeout.as_secs(),
            fetch_concurrency: assembler.fetch_concurrency,
            setup_command: emit.setup_command,
            ci_repository: emit.ci_repository,
            ci_repository_ref: emit.ci_repository_ref,
            fragments_file: emit.fragments_file,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the user config file when no path is given.
    ///
    /// A missing user config file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings: Option<Self> = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing settings in {}", path.display()))?;
        Ok(settings.unwrap_or_default())
    }

    /// Save settings to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Get the user configuration file path.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("dev", "cascade", "cascade")
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(dirs.config_dir().join("cascade.yaml"))
    }

    /// Set a configuration value.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "default_owner" => self.default_owner = value.to_string(),
            "raw_content_url" => self.raw_content_url = value.to_string(),
            "fetch_timeout_secs" => {
                self.fetch_timeout_secs = value
                    .parse()
                    .map_err(|_| anyhow!("Invalid timeout: {}", value))?;
            }
            "fetch_concurrency" => {
                let concurrency: usize = value
                    .parse()
                    .map_err(|_| anyhow!("Invalid concurrency: {}", value))?;
                if concurrency == 0 {
                    bail!("fetch_concurrency must be at least 1");
                }
                self.fetch_concurrency = concurrency;
            }
            "setup_command" => self.setup_command = value.to_string(),
            "ci_repository" => self.ci_repository = value.to_string(),
            "ci_repository_ref" => self.ci_repository_ref = value.to_string(),
            "fragments_file" => self.fragments_file = value.to_string(),
            _ => bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    pub fn emit(&self) -> EmitSettings {
        EmitSettings {
            default_owner: self.default_owner.clone(),
            setup_command: self.setup_command.clone(),
            ci_repository: self.ci_repository.clone(),
            ci_repository_ref: self.ci_repository_ref.clone(),
            fragments_file: self.fragments_file.clone(),
        }
    }

    pub fn assembler(&self) -> AssemblerSettings {
        AssemblerSettings {
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            fetch_concurrency: self.fetch_concurrency,
        }
    }
}
