//! Project configuration parsing for `calor.toml`.
//!
//! Searches the given directory then its ancestors. A missing file is not an
//! error: every section has defaults.

use crate::compiler::verification::smt_solver::SolverChoice;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "calor.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file '{0}' not found")]
    NotFound(String),
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid toml in '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct ProjectConfig {
    #[serde(default)]
    pub effects: EffectsSection,
    #[serde(default)]
    pub verification: VerificationSection,
    #[serde(default)]
    pub analysis: AnalysisSection,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct EffectsSection {
    /// Path to the JSON effect stub overlay, relative to the project root.
    #[serde(default)]
    pub stubs: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct VerificationSection {
    pub enabled: bool,
    pub solver: SolverChoice,
    pub timeout_ms: u64,
}

impl Default for VerificationSection {
    fn default() -> Self {
        Self { enabled: true, solver: SolverChoice::Auto, timeout_ms: 5000 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisSection {
    pub exhaustiveness: bool,
    pub effects: bool,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self { exhaustiveness: true, effects: true }
    }
}

impl ProjectConfig {
    /// Parse a TOML string directly.
    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(display.clone())
            } else {
                ConfigError::Io { path: display.clone(), source }
            }
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse { path: display, source })
    }

    /// Find `calor.toml` in `start` or one of its ancestors. Returns the
    /// directory that holds it (the project root) with the parsed config,
    /// or `None` when there is no config file.
    pub fn discover(start: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                debug!(path = %candidate.display(), "found project config");
                let cfg = Self::load_from(&candidate)?;
                return Ok(Some((dir, cfg)));
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    /// Generate a default `calor.toml` template.
    pub fn default_template() -> &'static str {
        r#"# Calor project configuration

[effects]
# JSON overlay mapping external signatures to effect codes
# stubs = "effects.json"

[verification]
enabled = true
# auto | z3 | builtin
solver = "auto"
timeout_ms = 5000

[analysis]
exhaustiveness = true
effects = true
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = ProjectConfig::parse("").expect("empty toml is valid");
        assert_eq!(cfg, ProjectConfig::default());
        assert!(cfg.verification.enabled);
        assert_eq!(cfg.verification.solver, SolverChoice::Auto);
        assert_eq!(cfg.verification.timeout_ms, 5000);
        assert!(cfg.analysis.exhaustiveness);
        assert!(cfg.effects.stubs.is_none());
    }

    #[test]
    fn parses_all_sections() {
        let cfg = ProjectConfig::parse(
            r#"
[effects]
stubs = "stubs/effects.json"

[verification]
solver = "builtin"
timeout_ms = 250

[analysis]
effects = false
"#,
        )
        .expect("should parse");
        assert_eq!(cfg.effects.stubs, Some(PathBuf::from("stubs/effects.json")));
        assert_eq!(cfg.verification.solver, SolverChoice::Builtin);
        assert_eq!(cfg.verification.timeout_ms, 250);
        assert!(cfg.verification.enabled);
        assert!(!cfg.analysis.effects);
        assert!(cfg.analysis.exhaustiveness);
    }

    #[test]
    fn rejects_unknown_solver() {
        assert!(ProjectConfig::parse("[verification]\nsolver = \"cvc5\"").is_err());
    }

    #[test]
    fn rejects_broken_toml() {
        assert!(ProjectConfig::parse("[broken").is_err());
    }

    #[test]
    fn template_parses() {
        let cfg = ProjectConfig::parse(ProjectConfig::default_template()).expect("template parses");
        assert_eq!(cfg, ProjectConfig::default());
    }

    #[test]
    fn discover_walks_up_to_project_root() {
        let root = std::env::temp_dir().join(format!("calor-config-{}", std::process::id()));
        let nested = root.join("src").join("deep");
        std::fs::create_dir_all(&nested).expect("create dirs");
        std::fs::write(root.join(CONFIG_FILE_NAME), "[verification]\nenabled = false\n").expect("write config");

        let (found, cfg) = ProjectConfig::discover(&nested).expect("readable").expect("found");
        assert_eq!(found, root);
        assert!(!cfg.verification.enabled);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn load_from_missing_file_is_not_found() {
        let err = ProjectConfig::load_from(Path::new("/nonexistent/calor.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
