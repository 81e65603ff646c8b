use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::progress::ProgressUnit;

pub const DEFAULT_BLOCK_SIZE: usize = 512 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("upload block size must be greater than zero")]
    ZeroBlockSize,
}

/// How a remote file with the same size as the local one is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
    #[default]
    Size,
    /// Also stream the remote file back and compare SHA-256 digests.
    Content,
}

impl FromStr for CompareMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "size" => Ok(CompareMode::Size),
            "content" => Ok(CompareMode::Content),
            other => Err(format!("unknown compare mode: {other} (expected size or content)")),
        }
    }
}

impl fmt::Display for CompareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareMode::Size => "size",
            CompareMode::Content => "content",
        })
    }
}

/// What to do when a local file meets a remote directory of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryPolicy {
    #[default]
    Fail,
    /// Unlink the remote directory and upload the file in its place.
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub block_size: usize,
    pub progress_unit: ProgressUnit,
    pub compare: CompareMode,
    pub directory_policy: DirectoryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            progress_unit: ProgressUnit::default(),
            compare: CompareMode::default(),
            directory_policy: DirectoryPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source; unset or invalid values keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let block_size = lookup("TAHOE_UPLOAD_BLOCK_SIZE")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(defaults.block_size);
        let progress_unit = read_parsed(&lookup, "TAHOE_PROGRESS_UNIT", defaults.progress_unit);
        let compare = read_parsed(&lookup, "TAHOE_COMPARE", defaults.compare);
        let directory_policy = if read_bool(&lookup, "TAHOE_REPLACE_DIRECTORIES", false) {
            DirectoryPolicy::Replace
        } else {
            DirectoryPolicy::Fail
        };

        Self {
            block_size,
            progress_unit,
            compare,
            directory_policy,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        Ok(())
    }
}

fn read_parsed<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr<Err = String>,
{
    match lookup(name) {
        Some(value) => value.parse().unwrap_or_else(|err| {
            eprintln!("[tahoe-sync] warning: ignoring {name}: {err}");
            default
        }),
        None => default,
    }
}

fn read_bool<F>(lookup: &F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}
