//! Language catalog.
//!
//! Immutable table from language id to the image, command and file extension
//! used to run code of that language. Built once at startup and shared by
//! reference.

use std::collections::BTreeMap;

use sandbox_mcp_core::{Error, LanguageConfig, Result};

/// Read-only lookup of supported languages.
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    languages: BTreeMap<String, LanguageConfig>,
}

impl LanguageCatalog {
    /// The languages supported out of the box.
    pub fn builtin() -> Self {
        let entries = [
            ("python", "python:3.12-slim-bookworm", &["python", "{file}"][..], "py"),
            ("go", "golang:1.22-alpine", &["go", "run", "{file}"][..], "go"),
            ("nodejs", "node:22-bookworm-slim", &["node", "{file}"][..], "js"),
        ];

        let languages = entries
            .iter()
            .map(|(id, image, command, extension)| {
                (
                    id.to_string(),
                    LanguageConfig {
                        id: id.to_string(),
                        image: image.to_string(),
                        run_command: command.iter().map(|s| s.to_string()).collect(),
                        file_extension: extension.to_string(),
                    },
                )
            })
            .collect();

        Self { languages }
    }

    /// Build a catalog from configured entries, rejecting incomplete or duplicate ones.
    pub fn from_configs(configs: Vec<LanguageConfig>) -> Result<Self> {
        let mut languages = BTreeMap::new();
        for config in configs {
            if config.id.trim().is_empty() {
                return Err(Error::Config("language id must not be empty".into()));
            }
            if config.image.trim().is_empty()
                || config.run_command.is_empty()
                || config.file_extension.trim().is_empty()
            {
                return Err(Error::Config(format!(
                    "language '{}' needs an image, a run command and a file extension",
                    config.id
                )));
            }
            if languages.contains_key(&config.id) {
                return Err(Error::Config(format!(
                    "language '{}' is defined twice",
                    config.id
                )));
            }
            languages.insert(config.id.clone(), config);
        }

        if languages.is_empty() {
            return Err(Error::Config("language catalog is empty".into()));
        }
        Ok(Self { languages })
    }

    /// Configured entries when present, the built-in table otherwise.
    pub fn from_configs_or_builtin(configs: Vec<LanguageConfig>) -> Result<Self> {
        if configs.is_empty() {
            Ok(Self::builtin())
        } else {
            Self::from_configs(configs)
        }
    }

    /// Look up a language by id.
    pub fn resolve(&self, id: &str) -> Result<&LanguageConfig> {
        self.languages
            .get(id)
            .ok_or_else(|| Error::unsupported_language(id))
    }

    /// Supported ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        self.languages.keys().map(String::as_str).collect()
    }
}

impl Default for LanguageCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
