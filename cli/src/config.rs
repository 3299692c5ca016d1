//! CLI-level configuration: model endpoint settings loaded from a small
//! TOML file. Plan-level settings (`max_retries`, `trust_level`, ...) are
//! a separate concern handled by `orchestrator_core::config`'s layered
//! override loader — this file only describes how to reach the model.

use std::path::Path;

use serde::Deserialize;

use crate::errors::CliError;

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "ORCHESTRATOR_API_KEY".to_string()
}

fn default_model_name() -> String {
    "gpt-4o".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelSettings {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Name of the environment variable holding the bearer token; the
    /// token itself is never written to a config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct CliConfigFile {
    #[serde(default)]
    model: Option<ModelSettings>,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub model: ModelSettings,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self { model: ModelSettings::default() }
    }
}

/// Loads the CLI config file if it exists; a missing file yields
/// defaults, matching `orchestrator_core::config::load_layered`'s
/// "absent override is not an error" discipline.
pub fn load_cli_config(path: Option<&Path>) -> Result<CliConfig, CliError> {
    let file: CliConfigFile = match path {
        Some(p) if p.exists() => {
            let raw = std::fs::read_to_string(p)
                .map_err(|e| CliError(format!("failed to read config file `{}`: {e}", p.display())))?;
            toml::from_str(&raw)
                .map_err(|e| CliError(format!("failed to parse config file `{}`: {e}", p.display())))?
        }
        _ => CliConfigFile::default(),
    };

    Ok(CliConfig { model: file.model.unwrap_or_default() })
}
