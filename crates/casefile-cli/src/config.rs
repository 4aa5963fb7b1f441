use std::path::{Path, PathBuf};

use anyhow::Context;
use casefile_links::CoordinatorConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_FILE: &str = "casefile.toml";

/// Top-level CLI configuration.
///
/// ```toml
/// data_dir = "/var/lib/casefile"
///
/// [links]
/// min_year = 1950
/// suggestion_settle_ms = 500
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasefileConfig {
    pub data_dir: PathBuf,
    pub links: CoordinatorConfig,
}

impl Default for CasefileConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".casefile"),
            links: CoordinatorConfig::default(),
        }
    }
}

impl CasefileConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Load `explicit`, else `./casefile.toml` if present, else defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn records_dir(&self) -> PathBuf {
        self.data_dir.join("records")
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir.join("attachments")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.data_dir.join("audit.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(CasefileConfig::parse("").unwrap(), CasefileConfig::default());
    }

    #[test]
    fn nested_links_section() {
        let cfg = CasefileConfig::parse(
            r#"
            data_dir = "/srv/casefile"

            [links]
            min_year = 1950
            suggestion_settle_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/casefile"));
        assert_eq!(cfg.links.min_year, 1950);
        assert_eq!(cfg.links.max_year, 2100);
        assert_eq!(cfg.links.suggestion_settle_ms, 250);
        assert_eq!(cfg.audit_log(), PathBuf::from("/srv/casefile/audit.log"));
    }

    #[test]
    fn unknown_type_is_an_error() {
        assert!(CasefileConfig::parse("data_dir = 5").is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("casefile.toml");
        std::fs::write(&path, "[links]\nmax_sequence = 500\n").unwrap();
        let cfg = CasefileConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.links.max_sequence, 500);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CasefileConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
