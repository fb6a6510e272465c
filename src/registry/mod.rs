//! Profile Registry
//!
//! Static, process-wide mapping of specialist ids to the intent tags they
//! claim, plus the keyword lexicon. Built once at start-up and read-only
//! afterwards; share it behind an `Arc` without locking.

pub mod lexicon;
pub mod profile;

pub use lexicon::{Lexicon, ScannedText};
pub use profile::{builtin_profiles, Profile, Stance};

use crate::config::ConfigError;
use std::collections::HashSet;
use tracing::debug;

/// Read-only registry of specialist profiles
///
/// Declaration order is significant: it breaks ties inside an exclusion group
/// and orders equally scored candidates.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<Profile>,
    lexicon: Lexicon,
}

impl ProfileRegistry {
    /// Build a registry, rejecting empty or duplicate profile ids
    pub fn new(profiles: Vec<Profile>, lexicon: Lexicon) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for profile in &profiles {
            if profile.id.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "Profile id must not be empty".to_string(),
                ));
            }
            if !seen.insert(profile.id.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "Duplicate profile id '{}'",
                    profile.id
                )));
            }
        }

        debug!(profile_count = profiles.len(), "Profile registry loaded");
        Ok(Self { profiles, lexicon })
    }

    /// Registry with the seven built-in specialists and vocabulary
    pub fn builtin() -> Self {
        Self {
            profiles: builtin_profiles(),
            lexicon: Lexicon::builtin(),
        }
    }

    /// Profiles in declaration order
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Declaration index of a profile
    pub fn position(&self, id: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.id == id)
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Profiles claiming an intent tag
    pub fn claimants<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Profile> + 'a {
        self.profiles.iter().filter(move |p| p.claims(tag))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
