use anyhow::{Context, Result, bail};
use std::path::PathBuf;

use crate::jobs::executor::DEFAULT_TOOL;
use crate::jobs::registry::{DEFAULT_OUTPUT_CAPACITY, MAX_OUTPUT_CAPACITY};

pub const ENV_PATCHES_DIR: &str = "FANOUT_PATCHES_DIR";
pub const ENV_TOOL: &str = "FANOUT_TOOL";
pub const ENV_OUTPUT_CAPACITY: &str = "FANOUT_OUTPUT_CAPACITY";

/// Runtime configuration for the job service.
///
/// Resolved from environment variables (a `.env` file is loaded by the
/// binary first), then overridden by command-line flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Directory holding one sub-directory per job type.
    pub patches_dir: PathBuf,
    /// External tool invoked for each run.
    pub tool: String,
    /// Lines buffered per job before its readers stall.
    pub output_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            patches_dir: PathBuf::from("patches"),
            tool: DEFAULT_TOOL.to_string(),
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_PATCHES_DIR).filter(|v| !v.is_empty()) {
            config.patches_dir = PathBuf::from(dir);
        }
        if let Some(tool) = lookup(ENV_TOOL).filter(|v| !v.is_empty()) {
            config.tool = tool;
        }
        if let Some(raw) = lookup(ENV_OUTPUT_CAPACITY).filter(|v| !v.trim().is_empty()) {
            config.output_capacity = parse_capacity(&raw)
                .with_context(|| format!("Invalid {}", ENV_OUTPUT_CAPACITY))?;
        }
        Ok(config)
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_overrides(
        mut self,
        patches_dir: Option<PathBuf>,
        tool: Option<String>,
        output_capacity: Option<usize>,
    ) -> Result<Self> {
        if let Some(dir) = patches_dir {
            self.patches_dir = dir;
        }
        if let Some(tool) = tool {
            self.tool = tool;
        }
        if let Some(capacity) = output_capacity {
            self.output_capacity = check_capacity(capacity).context("Invalid --output-capacity")?;
        }
        Ok(self)
    }
}

fn parse_capacity(raw: &str) -> Result<usize> {
    let capacity: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a number", raw))?;
    check_capacity(capacity)
}

fn check_capacity(capacity: usize) -> Result<usize> {
    if capacity == 0 {
        bail!("Output capacity must be at least 1");
    }
    if capacity > MAX_OUTPUT_CAPACITY {
        bail!(
            "Output capacity {} exceeds the maximum of {}",
            capacity,
            MAX_OUTPUT_CAPACITY
        );
    }
    Ok(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.patches_dir, PathBuf::from("patches"));
        assert_eq!(config.tool, "multi-gitter");
        assert_eq!(config.output_capacity, 10);
    }

    #[test]
    fn test_env_values() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (ENV_PATCHES_DIR, "/srv/patches"),
            (ENV_TOOL, "/usr/local/bin/multi-gitter"),
            (ENV_OUTPUT_CAPACITY, " 64 "),
        ]))
        .unwrap();
        assert_eq!(config.patches_dir, PathBuf::from("/srv/patches"));
        assert_eq!(config.tool, "/usr/local/bin/multi-gitter");
        assert_eq!(config.output_capacity, 64);
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config =
            ServiceConfig::from_lookup(lookup(&[
                (ENV_PATCHES_DIR, ""),
                (ENV_TOOL, ""),
                (ENV_OUTPUT_CAPACITY, ""),
            ]))
            .unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_invalid_capacity_is_rejected() {
        let too_large = (MAX_OUTPUT_CAPACITY + 1).to_string();
        let overflow = usize::MAX.to_string();
        for raw in ["zero", "0", "-1", too_large.as_str(), overflow.as_str()] {
            let err = ServiceConfig::from_lookup(lookup(&[(ENV_OUTPUT_CAPACITY, raw)])).unwrap_err();
            assert!(format!("{:#}", err).contains(ENV_OUTPUT_CAPACITY));
        }
    }

    #[test]
    fn test_overrides_win() {
        let config = ServiceConfig::default()
            .with_overrides(Some(PathBuf::from("other")), Some("echo".into()), Some(3))
            .unwrap();
        assert_eq!(config.patches_dir, PathBuf::from("other"));
        assert_eq!(config.tool, "echo");
        assert_eq!(config.output_capacity, 3);

        assert!(ServiceConfig::default().with_overrides(None, None, Some(0)).is_err());
    }

    #[test]
    fn test_capacity_bounds() {
        let max = MAX_OUTPUT_CAPACITY.to_string();
        let config =
            ServiceConfig::from_lookup(lookup(&[(ENV_OUTPUT_CAPACITY, max.as_str())])).unwrap();
        assert_eq!(config.output_capacity, MAX_OUTPUT_CAPACITY);

        let err = ServiceConfig::default()
            .with_overrides(None, None, Some(usize::MAX))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("exceeds the maximum"));
    }
}
