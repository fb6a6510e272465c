//! Router configuration
//!
//! TOML file with an `[engine]` section, optional `[[profiles]]` entries and an
//! optional `[lexicon]` table of keyword overrides. When no profiles are
//! declared the seven built-in specialists are used. The core engine only ever
//! sees the materialized `ProfileRegistry`; file loading stays here.
//!
//! ```toml
//! [engine]
//! orchestrator_id = "orchestrator"
//! max_depth = 5
//!
//! [[profiles]]
//! id = "developer"
//! display_name = "Developer"
//! intent_tags = ["code_write", "implement"]
//! stances = ["execute", "implement"]
//!
//! [lexicon]
//! code_write = ["code", "script*"]
//! ```

use crate::registry::profile::default_return_format;
use crate::registry::{builtin_profiles, Lexicon, Profile, ProfileRegistry, Stance};
use crate::session::OrchestratorSettings;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Whole configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RouterConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
    /// Keyword overrides per intent tag
    #[serde(default)]
    pub lexicon: BTreeMap<String, Vec<String>>,
}

/// Engine tunables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSection {
    /// Identity of the orchestrator itself (must match [a-zA-Z0-9._-]+)
    #[serde(default = "default_orchestrator_id")]
    pub orchestrator_id: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_noise_floor")]
    pub noise_floor: f64,
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
    /// Retries after the first attempt of a step
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Abort instead of accepting an output that fails verification twice
    #[serde(default)]
    pub strict_verification: bool,
}

fn default_orchestrator_id() -> String {
    "orchestrator".to_string()
}

fn default_max_depth() -> u32 {
    5
}

fn default_confidence_threshold() -> f64 {
    crate::routing::DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_noise_floor() -> f64 {
    crate::routing::DEFAULT_NOISE_FLOOR
}

fn default_step_timeout_ms() -> u64 {
    120_000
}

/// Upper bound for `engine.retry_attempts`
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

fn default_retry_attempts() -> u32 {
    1
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            orchestrator_id: default_orchestrator_id(),
            max_depth: default_max_depth(),
            confidence_threshold: default_confidence_threshold(),
            noise_floor: default_noise_floor(),
            step_timeout_ms: default_step_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            strict_verification: false,
        }
    }
}

/// Profile entry as declared in the file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileConfig {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub intent_tags: Vec<String>,
    #[serde(default)]
    pub exclusion_group: Option<String>,
    #[serde(default)]
    pub stances: Vec<Stance>,
    #[serde(default)]
    pub evidence_terms: Vec<String>,
    #[serde(default = "default_return_format")]
    pub return_format: String,
}

impl From<&ProfileConfig> for Profile {
    fn from(config: &ProfileConfig) -> Self {
        Profile {
            id: config.id.clone(),
            display_name: config.display_name.clone(),
            description: config.description.clone(),
            intent_tags: config.intent_tags.iter().cloned().collect(),
            exclusion_group: config.exclusion_group.clone(),
            stances: config.stances.iter().copied().collect::<BTreeSet<_>>(),
            evidence_terms: config.evidence_terms.clone(),
            return_format: config.return_format.clone(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid profile ID format: {0}")]
    InvalidProfileId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RouterConfig {
    /// Load and validate a configuration file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), profiles = config.profiles.len(), "Configuration loaded");
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RouterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        validate_profile_id(&engine.orchestrator_id)?;

        if engine.max_depth == 0 {
            return Err(ConfigError::InvalidConfig(
                "engine.max_depth must be at least 1".to_string(),
            ));
        }
        if !(engine.confidence_threshold > 0.0 && engine.confidence_threshold <= 1.0) {
            return Err(ConfigError::InvalidConfig(format!(
                "engine.confidence_threshold {} must be in (0, 1]",
                engine.confidence_threshold
            )));
        }
        if !(engine.noise_floor >= 0.0 && engine.noise_floor < engine.confidence_threshold) {
            return Err(ConfigError::InvalidConfig(format!(
                "engine.noise_floor {} must be in [0, confidence_threshold)",
                engine.noise_floor
            )));
        }
        if engine.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::InvalidConfig(format!(
                "engine.retry_attempts {} exceeds the maximum of {}",
                engine.retry_attempts, MAX_RETRY_ATTEMPTS
            )));
        }
        if engine.step_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "engine.step_timeout_ms must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for profile in &self.profiles {
            validate_profile_id(&profile.id)?;
            if !seen.insert(profile.id.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "Duplicate profile id '{}'",
                    profile.id
                )));
            }
            if profile.intent_tags.iter().all(|t| t.trim().is_empty()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "Profile '{}' must claim at least one intent tag",
                    profile.id
                )));
            }
            if profile.display_name.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "Profile '{}' needs a display_name",
                    profile.id
                )));
            }
        }

        Ok(())
    }

    /// Materialize the profile registry; built-in profiles when none declared
    pub fn build_registry(&self) -> Result<ProfileRegistry, ConfigError> {
        let mut lexicon = Lexicon::builtin();
        for (tag, keywords) in &self.lexicon {
            lexicon.set_keywords(tag, keywords.clone());
        }

        let profiles: Vec<Profile> = if self.profiles.is_empty() {
            builtin_profiles()
        } else {
            self.profiles.iter().map(Profile::from).collect()
        };

        for profile in &profiles {
            for tag in &profile.intent_tags {
                if lexicon.keywords(tag).is_empty() {
                    debug!(profile = %profile.id, tag = %tag, "Intent tag has no keyword vocabulary");
                }
            }
        }

        ProfileRegistry::new(profiles, lexicon)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            orchestrator_id: self.engine.orchestrator_id.clone(),
            max_depth: self.engine.max_depth,
            confidence_threshold: self.engine.confidence_threshold,
            noise_floor: self.engine.noise_floor,
            step_timeout: Duration::from_millis(self.engine.step_timeout_ms),
            retry_attempts: self.engine.retry_attempts,
            strict_verification: self.engine.strict_verification,
        }
    }
}

/// Validate a profile identifier against [a-zA-Z0-9._-]+
pub fn validate_profile_id(profile_id: &str) -> Result<(), ConfigError> {
    let valid_chars = profile_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if profile_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidProfileId(format!(
            "Profile ID '{profile_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
