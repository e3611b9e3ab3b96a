//! Monitor configuration
//!
//! Layered: built-in defaults, then `gpumon.toml` (or an explicit file), then
//! `GPUMON_*` environment variables. Command-line flags are applied on top by
//! the caller.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::aggregate::FinalizeOptions;
use crate::DEFAULT_TOP_N;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "gpumon.toml";

/// Prefix of the environment overrides, e.g. `GPUMON_TOP_N=10`
pub const ENV_PREFIX: &str = "GPUMON";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Directory the report files are written to
    pub report_dir: PathBuf,

    /// Print the console summary at session end
    pub print_summary: bool,

    /// Number of top consumers ranked in the report
    pub top_n: usize,

    /// Refuse to build a report when no unit was monitored
    pub require_monitored: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from("gpu_memory_reports"),
            print_summary: true,
            top_n: DEFAULT_TOP_N,
            require_monitored: false,
        }
    }
}

impl MonitorConfig {
    /// Load the layered configuration.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let config: MonitorConfig = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            anyhow::bail!("top_n must be at least 1");
        }
        if self.report_dir.as_os_str().is_empty() {
            anyhow::bail!("report_dir must not be empty");
        }
        Ok(())
    }

    pub fn finalize_options(&self) -> FinalizeOptions {
        FinalizeOptions {
            top_n: self.top_n,
            require_monitored: self.require_monitored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.report_dir, PathBuf::from("gpu_memory_reports"));
        assert!(config.print_summary);
        assert_eq!(config.top_n, 5);
        assert!(!config.require_monitored);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gpumon.toml");
        std::fs::write(&path, "report_dir = \"out/gpu\"\ntop_n = 10\n").unwrap();

        let config = MonitorConfig::load(Some(&path)).unwrap();

        assert_eq!(config.report_dir, PathBuf::from("out/gpu"));
        assert_eq!(config.top_n, 10);
        // Keys absent from the file keep their defaults
        assert!(config.print_summary);
        assert_eq!(config.finalize_options().top_n, 10);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(MonitorConfig::load(Some(&tmp.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_rejects_zero_top_n() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gpumon.toml");
        std::fs::write(&path, "top_n = 0\n").unwrap();

        let err = MonitorConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("top_n"));
    }

    #[test]
    fn test_rejects_empty_report_dir() {
        let config = MonitorConfig {
            report_dir: PathBuf::new(),
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
