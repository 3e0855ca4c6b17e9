// src/credentials.rs

//! API credential pairs.
//!
//! Credentials live in `credentials.toml` next to the configuration:
//!
//! ```toml
//! [adzuna]
//! id = "app-id"
//! key = "app-key"
//! ```
//!
//! `JOBSWEEP_<SOURCE>_ID` / `JOBSWEEP_<SOURCE>_KEY` environment variables
//! override file entries. Lookups try the source id first and then its
//! backend id, so one `[adzuna]` section serves every Adzuna market.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, Result};

const ENV_PREFIX: &str = "JOBSWEEP";

/// One identifier/secret pair as a source's API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialPair {
    pub id: String,
    pub key: String,
}

impl CredentialPair {
    fn is_complete(&self) -> bool {
        !self.id.trim().is_empty() && !self.key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PartialPair {
    id: Option<String>,
    key: Option<String>,
}

/// All configured credential pairs, keyed by source or backend id.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pairs: HashMap<String, CredentialPair>,
}

impl Credentials {
    /// Load `credentials.toml` (a missing file is an empty set) and apply
    /// environment overrides for `ids`.
    pub fn load<'a>(path: impl AsRef<Path>, ids: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let path = path.as_ref();
        let file: HashMap<String, PartialPair> = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                AppError::config(format!("invalid credentials file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(AppError::Io(e)),
        };
        Ok(Self::from_sources(file, ids, |name| std::env::var(name).ok()))
    }

    fn from_sources<'a>(
        mut file: HashMap<String, PartialPair>,
        ids: impl IntoIterator<Item = &'a str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        for id in ids {
            let entry = file.entry(id.to_string()).or_default();
            if let Some(value) = env(&env_var(id, "ID")) {
                entry.id = Some(value);
            }
            if let Some(value) = env(&env_var(id, "KEY")) {
                entry.key = Some(value);
            }
        }

        let pairs = file
            .into_iter()
            .filter_map(|(name, partial)| {
                let pair = CredentialPair {
                    id: partial.id?,
                    key: partial.key?,
                };
                pair.is_complete().then_some((name, pair))
            })
            .collect();
        Self { pairs }
    }

    /// Insert a pair directly.
    pub fn insert(&mut self, name: impl Into<String>, pair: CredentialPair) {
        self.pairs.insert(name.into(), pair);
    }

    /// Pair for a source, falling back to its backend id.
    pub fn get(&self, source_id: &str, backend_id: &str) -> Option<&CredentialPair> {
        self.pairs
            .get(source_id)
            .or_else(|| self.pairs.get(backend_id))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Environment variable name for a credential half.
pub fn env_var(id: &str, half: &str) -> String {
    let name: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{ENV_PREFIX}_{name}_{half}")
}

/// Message telling the user how to supply a missing pair.
pub fn remediation(source_id: &str, backend_id: &str) -> String {
    format!(
        "add [{backend_id}] id/key to credentials.toml or set {} and {}",
        env_var(source_id, "ID"),
        env_var(source_id, "KEY")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_env_var_names() {
        assert_eq!(env_var("adzuna_us", "ID"), "JOBSWEEP_ADZUNA_US_ID");
        assert_eq!(env_var("we-work", "KEY"), "JOBSWEEP_WE_WORK_KEY");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let creds = Credentials::load(tmp.path().join("credentials.toml"), []).unwrap();
        assert!(creds.is_empty());
    }

    #[test]
    fn test_backend_fallback_and_incomplete_pairs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("credentials.toml");
        std::fs::write(
            &path,
            "[adzuna]\nid = \"app\"\nkey = \"secret\"\n\n[usajobs]\nid = \"me@example.com\"\n",
        )
        .unwrap();

        let creds = Credentials::load(&path, []).unwrap();
        let pair = creds.get("adzuna_gb", "adzuna").unwrap();
        assert_eq!(pair.key, "secret");
        assert!(creds.get("usajobs", "usajobs").is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = HashMap::new();
        file.insert(
            "usajobs".to_string(),
            PartialPair {
                id: Some("me@example.com".into()),
                key: None,
            },
        );
        let env = |name: &str| (name == "JOBSWEEP_USAJOBS_KEY").then(|| "from-env".to_string());
        let creds = Credentials::from_sources(file, ["usajobs"], env);

        let pair = creds.get("usajobs", "usajobs").unwrap();
        assert_eq!(pair.id, "me@example.com");
        assert_eq!(pair.key, "from-env");
    }

    #[test]
    fn test_remediation_mentions_both_routes() {
        let msg = remediation("adzuna_us", "adzuna");
        assert!(msg.contains("[adzuna]"));
        assert!(msg.contains("JOBSWEEP_ADZUNA_US_KEY"));
    }
}
