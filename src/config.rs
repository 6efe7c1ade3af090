//! Engine configuration.
//!
//! `SyncConfig` is the normalized, validated form the engine runs on.
//! `Settings` is the optional TOML file that the binary merges with its
//! command-line flags before building a `SyncConfig`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};
use std::time::Duration;

use crate::compare::ComparatorKind;
use crate::error::MirrorError;
use crate::fs::RetryPolicy;

/// Validated engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    source_root: PathBuf,
    replica_root: PathBuf,
    /// Pause between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Any unit-of-work error requests global cancellation.
    pub fragile: bool,
    /// Content verification policy, fixed for the engine's lifetime.
    pub comparator: ComparatorKind,
    /// Retry policy for copy and delete operations.
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Build a configuration, normalizing both roots to absolute paths.
    pub fn new(
        source: impl AsRef<Path>,
        replica: impl AsRef<Path>,
        interval_ms: u64,
        fragile: bool,
        comparator: ComparatorKind,
    ) -> Result<Self, MirrorError> {
        if interval_ms == 0 {
            return Err(MirrorError::InvalidConfig {
                message: "interval must be a positive number of milliseconds".to_string(),
            });
        }

        let source_root = normalize_root(source.as_ref())?;
        let replica_root = normalize_root(replica.as_ref())?;

        if source_root == replica_root
            || replica_root.starts_with(&source_root)
            || source_root.starts_with(&replica_root)
        {
            return Err(MirrorError::InvalidConfig {
                message: format!(
                    "source {} and replica {} must not overlap",
                    source_root.display(),
                    replica_root.display()
                ),
            });
        }

        Ok(Self {
            source_root,
            replica_root,
            interval: Duration::from_millis(interval_ms),
            fragile,
            comparator,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the default retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn replica_root(&self) -> &Path {
        &self.replica_root
    }

    /// Source root with a trailing separator, as shown in log lines.
    pub fn source_display(&self) -> String {
        with_trailing_separator(&self.source_root)
    }

    /// Replica root with a trailing separator, as shown in log lines.
    pub fn replica_display(&self) -> String {
        with_trailing_separator(&self.replica_root)
    }

    /// Absolute source path for a path relative to the roots.
    pub fn in_source(&self, relative: &Path) -> PathBuf {
        self.source_root.join(relative)
    }

    /// Absolute replica path for a path relative to the roots.
    pub fn in_replica(&self, relative: &Path) -> PathBuf {
        self.replica_root.join(relative)
    }

    /// Replica counterpart of an absolute source path (source prefix
    /// replaced with the replica prefix).
    pub fn replica_counterpart(&self, source_path: &Path) -> Option<PathBuf> {
        source_path
            .strip_prefix(&self.source_root)
            .ok()
            .map(|rel| self.replica_root.join(rel))
    }

    /// Source counterpart of an absolute replica path.
    pub fn source_counterpart(&self, replica_path: &Path) -> Option<PathBuf> {
        replica_path
            .strip_prefix(&self.replica_root)
            .ok()
            .map(|rel| self.source_root.join(rel))
    }
}

/// Make a root absolute and lexically clean (`.` and `..` resolved without
/// touching the filesystem, so the root does not have to exist yet).
pub fn normalize_root(path: &Path) -> Result<PathBuf, MirrorError> {
    if path.as_os_str().is_empty() {
        return Err(MirrorError::InvalidConfig {
            message: "directory path must not be empty".to_string(),
        });
    }
    let absolute = std::path::absolute(path)
        .map_err(|e| MirrorError::from_io_error(e, "resolving", Some(path.to_path_buf())))?;
    Ok(clean_path(&absolute))
}

/// Remove redundant `.` and `..` components.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                    continue;
                }
                // ".." directly under the root stays at the root
                if matches!(components.last(), Some(Component::RootDir)) {
                    continue;
                }
                components.push(component);
            }
            _ => components.push(component),
        }
    }

    components.into_iter().collect()
}

fn with_trailing_separator(path: &Path) -> String {
    let mut text = path.display().to_string();
    if !text.ends_with(MAIN_SEPARATOR) {
        text.push(MAIN_SEPARATOR);
    }
    text
}

/// Optional settings file. Every key may be omitted; command-line flags
/// take precedence over whatever is set here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub source: Option<PathBuf>,
    pub replica: Option<PathBuf>,
    pub interval_ms: Option<u64>,
    pub fragile: Option<bool>,
    pub comparator: Option<ComparatorKind>,
    pub log_file: Option<PathBuf>,
    pub verbosity: Option<u8>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Retry policy with file overrides applied to the defaults.
    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default();
        if let Some(attempts) = self.retry_attempts {
            policy.max_attempts = attempts.max(1);
        }
        if let Some(delay) = self.retry_delay_ms {
            policy.delay = Duration::from_millis(delay);
        }
        policy
    }
}
