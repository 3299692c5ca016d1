//! TOML loading and override-merge for [`orchestrator_kernel::PlanConfig`].
//!
//! A base config file (repo-wide defaults) can be layered with a
//! plan-specific override file; any field set in the override replaces
//! the base value, everything else is inherited — the same merge
//! discipline the config loader used elsewhere in this lineage applies
//! to its settings tables.

use std::fmt;
use std::path::Path;

use orchestrator_kernel::{PlanConfig, TaskPhase, TrustLevel};
use serde::Deserialize;

#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(e) => write!(f, "failed to read config file: {e}"),
            Self::Parse(e) => write!(f, "failed to parse config file: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

/// Mirrors `PlanConfig` but with every field optional, so a TOML document
/// only needs to name the settings it wants to override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlanConfigOverride {
    pub max_retries: Option<u32>,
    pub max_review_cycles: Option<u32>,
    pub trust_level: Option<TrustLevel>,
    pub allow_nits_in_approval: Option<bool>,
    pub pause_on_business_ambiguity: Option<bool>,
    pub pause_on_architectural_conflict: Option<bool>,
    pub task_phases: Option<Vec<TaskPhase>>,
}

pub fn load_override(path: &Path) -> Result<PlanConfigOverride, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
    toml::from_str(&raw).map_err(ConfigError::Parse)
}

/// Applies `over` onto `base`, field by field. Every `Some` in `over`
/// wins; every `None` leaves `base`'s value untouched.
pub fn merge(base: PlanConfig, over: PlanConfigOverride) -> PlanConfig {
    PlanConfig {
        max_retries: over.max_retries.unwrap_or(base.max_retries),
        max_review_cycles: over.max_review_cycles.unwrap_or(base.max_review_cycles),
        trust_level: over.trust_level.unwrap_or(base.trust_level),
        allow_nits_in_approval: over
            .allow_nits_in_approval
            .unwrap_or(base.allow_nits_in_approval),
        pause_on_business_ambiguity: over
            .pause_on_business_ambiguity
            .unwrap_or(base.pause_on_business_ambiguity),
        pause_on_architectural_conflict: over
            .pause_on_architectural_conflict
            .unwrap_or(base.pause_on_architectural_conflict),
        task_phases: over.task_phases.unwrap_or(base.task_phases),
    }
}

/// Loads a base config and an optional override file, merging them. A
/// missing override file is not an error — it simply means "no
/// overrides" and `base` is returned unchanged.
pub fn load_layered(
    base: PlanConfig,
    override_path: Option<&Path>,
) -> Result<PlanConfig, ConfigError> {
    match override_path {
        Some(path) if path.exists() => {
            let over = load_override(path)?;
            Ok(merge(base, over))
        }
        _ => Ok(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_replaces_only_named_fields() {
        let base = PlanConfig::default();
        let over = PlanConfigOverride {
            max_retries: Some(7),
            ..Default::default()
        };
        let merged = merge(base.clone(), over);
        assert_eq!(merged.max_retries, 7);
        assert_eq!(merged.max_review_cycles, base.max_review_cycles);
        assert_eq!(merged.trust_level, base.trust_level);
    }

    #[test]
    fn parses_partial_toml_document() {
        let toml_src = r#"
            max_retries = 5
            trust_level = "autonomous"
        "#;
        let over: PlanConfigOverride = toml::from_str(toml_src).unwrap();
        assert_eq!(over.max_retries, Some(5));
        assert_eq!(over.trust_level, Some(TrustLevel::Autonomous));
        assert_eq!(over.max_review_cycles, None);
    }
}
