use tahoe_core::{Capability, RemoteEntry};

use crate::config::{CompareMode, DirectoryPolicy, SyncConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceReason {
    SizeChanged,
    UnknownSize,
    ContentChanged,
    RemoteDirectory,
}

impl ReplaceReason {
    pub fn describe(self) -> &'static str {
        match self {
            ReplaceReason::SizeChanged => "different size",
            ReplaceReason::UnknownSize => "file has no size, mutable?",
            ReplaceReason::ContentChanged => "different content",
            ReplaceReason::RemoteDirectory => "remote cap is a directory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePlan {
    /// Nothing of that name exists remotely.
    Upload,
    Unchanged,
    Replace(ReplaceReason),
    /// Same size; remote bytes must be read back before deciding.
    VerifyContent(Capability),
    /// Remote directory in the way and the policy forbids replacing it.
    RemoteIsDirectory,
}

/// Decides what to do with a local file given the remote entry of the same name.
///
/// Only the length is compared unless content comparison is enabled, so
/// same-size edits go unnoticed by default.
pub fn plan_file(remote: Option<&RemoteEntry>, local_size: u64, config: &SyncConfig) -> FilePlan {
    let Some(remote) = remote else {
        return FilePlan::Upload;
    };

    if remote.is_dir() {
        return match config.directory_policy {
            DirectoryPolicy::Fail => FilePlan::RemoteIsDirectory,
            DirectoryPolicy::Replace => FilePlan::Replace(ReplaceReason::RemoteDirectory),
        };
    }

    match remote.size {
        None => FilePlan::Replace(ReplaceReason::UnknownSize),
        Some(size) if size != local_size => FilePlan::Replace(ReplaceReason::SizeChanged),
        Some(_) => match config.compare {
            CompareMode::Size => FilePlan::Unchanged,
            CompareMode::Content => FilePlan::VerifyContent(remote.cap.clone()),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryPlan {
    Create,
    Reuse(Capability),
    /// A remote file occupies the name.
    Conflict,
}

pub fn plan_directory(remote: Option<&RemoteEntry>) -> DirectoryPlan {
    match remote {
        None => DirectoryPlan::Create,
        Some(entry) if entry.is_dir() => DirectoryPlan::Reuse(entry.cap.clone()),
        Some(_) => DirectoryPlan::Conflict,
    }
}
