// src/config.rs

//! Configuration loading utilities.
//!
//! Loads the aggregator config, candidate profile and credentials from a
//! storage directory. A missing `config.toml` falls back to defaults; an
//! unreadable or invalid one is fatal, as is any profile problem.

use std::collections::BTreeSet;
use std::path::Path;

use crate::credentials::Credentials;
use crate::error::{AppError, Result};
use crate::models::{CandidateProfile, Config};
use crate::utils::log;

pub const CONFIG_FILE: &str = "config.toml";
pub const PROFILE_FILE: &str = "profile.toml";
pub const CREDENTIALS_FILE: &str = "credentials.toml";

/// Load and validate `config.toml`.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::warn(&format!(
            "No config at {}; using default configuration.",
            path.display()
        ));
        return Ok(Config::default());
    }
    let config = Config::load(path)
        .map_err(|e| AppError::config(format!("cannot load {}: {e}", path.display())))?;
    config
        .validate()
        .map_err(|e| AppError::config(format!("invalid {}: {e}", path.display())))?;
    Ok(config)
}

/// Ids credentials may be stored under: enabled sources and their backends.
pub fn credential_ids(config: &Config) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    for source in config.enabled_sources() {
        ids.insert(source.id.clone());
        if let Some(backend) = config.backends.get(&source.id) {
            ids.insert(backend.clone());
        }
    }
    ids
}

/// Load config, profile and credentials.
///
/// `profile_path` defaults to `{storage_dir}/profile.toml`.
pub fn load_all(
    storage_dir: &Path,
    profile_path: Option<&Path>,
) -> Result<(Config, CandidateProfile, Credentials)> {
    let config = load_config(&storage_dir.join(CONFIG_FILE))?;

    let default_profile = storage_dir.join(PROFILE_FILE);
    let profile = CandidateProfile::load(profile_path.unwrap_or(&default_profile))?;

    let ids = credential_ids(&config);
    let credentials = Credentials::load(
        storage_dir.join(CREDENTIALS_FILE),
        ids.iter().map(String::as_str),
    )?;

    Ok((config, profile, credentials))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROFILE: &str = r#"
name = "Ada"
core_skills = ["rust", "python"]
target_titles = ["Backend Engineer"]
"#;

    #[test]
    fn test_missing_config_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(PROFILE_FILE), PROFILE).unwrap();

        let (config, profile, _) = load_all(tmp.path(), None).unwrap();
        assert_eq!(profile.name, "Ada");
        assert_eq!(config.fetch.max_workers, Config::default().fetch.max_workers);
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(PROFILE_FILE), PROFILE).unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "[fetch]\nmax_workers = 0\n").unwrap();

        let err = load_all(tmp.path(), None).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_profile_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = load_all(tmp.path(), None).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_credential_ids_include_backends() {
        let ids = credential_ids(&Config::default());
        assert!(ids.contains("usajobs"));
        assert!(ids.contains("adzuna_us"));
    }
}
