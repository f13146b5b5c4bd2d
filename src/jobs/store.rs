use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::errors::{FanoutError, Result};

/// Config file every job type must carry.
pub const CONFIG_FILE: &str = "config.yml";

/// Entry point handed to the external tool.
pub const ENTRY_POINT: &str = "patch";

/// Per-job-type settings from `config.yml`. All three fields are required.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobConfig {
    pub branch: String,
    #[serde(rename = "pr-title")]
    pub pr_title: String,
    #[serde(rename = "pr-body")]
    pub pr_body: String,
}

impl JobConfig {
    /// Parse the YAML contents of a config file. `path` is only used for errors.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|source| FanoutError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Sandboxed view over the directory of job types.
///
/// Lookups never resolve outside `root`: names must be a single plain path
/// component, and the canonical location of both the job-type directory and
/// its config file are checked against the canonical root.
#[derive(Debug, Clone)]
pub struct JobTypeStore {
    root: PathBuf,
}

impl JobTypeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the job types directly under the root, sorted.
    ///
    /// Symlinked directories are not listed.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.root).map_err(|source| FanoutError::ConfigRead {
            path: self.root.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| FanoutError::ConfigRead {
                path: self.root.clone(),
                source,
            })?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir && let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Path of the job type's entry point, relative to however `root` was given.
    pub fn job_file(&self, name: &str) -> PathBuf {
        self.root.join(name).join(ENTRY_POINT)
    }

    /// Load and parse the config of one job type.
    pub fn load(&self, name: &str) -> Result<JobConfig> {
        let dir = self.resolve(name)?;
        let path = dir.join(CONFIG_FILE);

        let canonical = path.canonicalize().map_err(|source| FanoutError::ConfigRead {
            path: path.clone(),
            source,
        })?;
        if !canonical.starts_with(&dir) {
            return Err(FanoutError::ConfigRead {
                path,
                source: io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "config file resolves outside its patch directory",
                ),
            });
        }

        let content =
            std::fs::read_to_string(&canonical).map_err(|source| FanoutError::ConfigRead {
                path: path.clone(),
                source,
            })?;
        JobConfig::parse(&path, &content)
    }

    /// Canonical directory of a job type, or `InvalidJobType` if the name
    /// does not denote a directory directly inside the root.
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let invalid = || FanoutError::InvalidJobType {
            name: name.to_string(),
        };
        if !is_plain_name(name) {
            return Err(invalid());
        }

        let root = self.root.canonicalize().map_err(|source| FanoutError::ConfigRead {
            path: self.root.clone(),
            source,
        })?;
        let dir = root.join(name).canonicalize().map_err(|_| invalid())?;

        if dir.parent() != Some(root.as_path()) || !dir.is_dir() {
            return Err(invalid());
        }
        Ok(dir)
    }
}

/// True when `name` is exactly one normal path component.
fn is_plain_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == name
    )
}
