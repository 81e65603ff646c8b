use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use tahoe_core::{Capability, RemoteListing, TahoeClient, TahoeError};
use thiserror::Error;

use super::digest::{local_sha256, remote_sha256};
use super::local::{
    LocalKind, classify, entry_name, has_trailing_separator, nested_prefix, sorted_children,
};
use super::plan::{DirectoryPlan, FilePlan, ReplaceReason, plan_directory, plan_file};
use super::upload::upload_file;
use crate::config::{ConfigError, SyncConfig};
use crate::progress::{PlainReporter, Reporter};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("gateway error: {0}")]
    Remote(#[from] TahoeError),
    #[error("I/O error on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("{name} exists remotely but is not a directory")]
    LocalTypeConflict { name: String },
    #[error("{name} is a directory remotely but a file locally")]
    RemoteIsDirectory { name: String },
    #[error("local path has no usable name: {}", .0.display())]
    InvalidLocalPath(PathBuf),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Counts of what one run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub uploaded: u64,
    pub replaced: u64,
    pub unchanged: u64,
    pub directories_created: u64,
    pub skipped: u64,
    pub bytes_uploaded: u64,
}

impl SyncSummary {
    /// True when the run changed nothing remotely.
    pub fn is_noop(&self) -> bool {
        self.uploaded == 0 && self.replaced == 0 && self.directories_created == 0
    }
}

/// Mirrors local trees into a directory capability, one level at a time.
///
/// Every level is listed once; children are visited in name order and each
/// remote mutation finishes before the next one starts. The first fatal error
/// ends the run.
pub struct SyncEngine {
    client: TahoeClient,
    config: SyncConfig,
    reporter: Arc<dyn Reporter>,
    summary: Mutex<SyncSummary>,
}

impl SyncEngine {
    pub fn new(client: TahoeClient, config: SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            reporter: Arc::new(PlainReporter),
            summary: Mutex::new(SyncSummary::default()),
        })
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Syncs `local` into `root`.
    ///
    /// With a trailing separator the contents of `local` land directly in
    /// `root`; otherwise `local` itself, file or directory, becomes a child of
    /// `root`.
    pub async fn reconcile(
        &self,
        local: &Path,
        root: &Capability,
    ) -> Result<SyncSummary, SyncError> {
        self.update_summary(|summary| *summary = SyncSummary::default());

        if has_trailing_separator(local) {
            self.reconcile_contents(local, root, "").await?;
        } else {
            local_name(local)?;
            let listing = self.client.list_directory(root).await?;
            self.reconcile_entry(local, root, &listing, "").await?;
        }

        Ok(self.summary())
    }

    pub fn summary(&self) -> SyncSummary {
        self.summary
            .lock()
            .map(|summary| *summary)
            .unwrap_or_default()
    }

    /// Reconciles every child of `local_dir` against one fresh listing of `parent`.
    pub async fn reconcile_contents(
        &self,
        local_dir: &Path,
        parent: &Capability,
        log_prefix: &str,
    ) -> Result<(), SyncError> {
        let listing = self.client.list_directory(parent).await?;
        let children = sorted_children(local_dir)
            .await
            .map_err(|source| SyncError::Io {
                path: local_dir.to_path_buf(),
                source,
            })?;

        for child in children {
            self.reconcile_entry(&child, parent, &listing, log_prefix)
                .await?;
        }
        Ok(())
    }

    async fn reconcile_entry(
        &self,
        path: &Path,
        parent: &Capability,
        listing: &RemoteListing,
        log_prefix: &str,
    ) -> Result<(), SyncError> {
        let entry = classify(path).await.map_err(|source| SyncError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if entry_name(path).is_none() {
            return self.skip(path, log_prefix, "skipping, name is not valid UTF-8");
        }
        match entry.kind {
            LocalKind::File => {
                self.reconcile_file(path, parent, listing, log_prefix)
                    .await
            }
            LocalKind::Directory => {
                self.reconcile_directory(path, parent, listing, log_prefix)
                    .await
            }
            LocalKind::Other => self.skip(path, log_prefix, "skipping, unknown file type"),
        }
    }

    /// Uploads, replaces or leaves alone one local file.
    pub async fn reconcile_file(
        &self,
        local_path: &Path,
        parent: &Capability,
        listing: &RemoteListing,
        log_prefix: &str,
    ) -> Result<(), SyncError> {
        let name = local_name(local_path)?;
        let size = tokio::fs::metadata(local_path)
            .await
            .map_err(|source| SyncError::Io {
                path: local_path.to_path_buf(),
                source,
            })?
            .len();
        let job = FileJob {
            path: local_path,
            name,
            size,
            parent,
            log_prefix,
        };

        match plan_file(listing.get(name), size, &self.config) {
            FilePlan::Upload => {
                self.reporter
                    .line(&format!("{log_prefix}{name}: uploading..."));
                self.upload(&job).await?;
                self.update_summary(|summary| summary.uploaded += 1);
                Ok(())
            }
            FilePlan::Unchanged => {
                self.keep(&job, "same size");
                Ok(())
            }
            FilePlan::Replace(reason) => self.replace(&job, reason).await,
            FilePlan::VerifyContent(cap) => {
                let remote = remote_sha256(&self.client, &cap).await?;
                let local = local_sha256(local_path, self.config.block_size).await?;
                if remote == local {
                    self.keep(&job, "same content");
                    Ok(())
                } else {
                    self.replace(&job, ReplaceReason::ContentChanged).await
                }
            }
            FilePlan::RemoteIsDirectory => {
                self.reporter.line(&format!(
                    "{log_prefix}{name}: already exists, {}",
                    ReplaceReason::RemoteDirectory.describe()
                ));
                Err(SyncError::RemoteIsDirectory {
                    name: name.to_string(),
                })
            }
        }
    }

    /// Ensures a remote directory named like `local_path` exists, then descends into it.
    pub fn reconcile_directory<'a>(
        &'a self,
        local_path: &'a Path,
        parent: &'a Capability,
        listing: &'a RemoteListing,
        log_prefix: &'a str,
    ) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(async move {
            let name = local_name(local_path)?;
            let cap = match plan_directory(listing.get(name)) {
                DirectoryPlan::Conflict => {
                    self.reporter.line(&format!(
                        "{log_prefix}{name}: not a directory in tahoe filesystem!"
                    ));
                    return Err(SyncError::LocalTypeConflict {
                        name: name.to_string(),
                    });
                }
                DirectoryPlan::Reuse(cap) => {
                    self.reporter.line(&format!(
                        "{log_prefix}{name}: already exists, uploading contents..."
                    ));
                    cap
                }
                DirectoryPlan::Create => {
                    let cap = self.client.mkdir(parent, name).await?;
                    self.update_summary(|summary| summary.directories_created += 1);
                    self.reporter.line(&format!(
                        "{log_prefix}{name}: creating directory... created, uploading contents..."
                    ));
                    cap
                }
            };

            self.reconcile_contents(local_path, &cap, &nested_prefix(log_prefix))
                .await
        })
    }

    fn keep(&self, job: &FileJob<'_>, what: &str) {
        self.reporter.line(&format!(
            "{}{}: already exists, {what}",
            job.log_prefix, job.name
        ));
        self.update_summary(|summary| summary.unchanged += 1);
    }

    async fn replace(&self, job: &FileJob<'_>, reason: ReplaceReason) -> Result<(), SyncError> {
        self.reporter.line(&format!(
            "{}{}: already exists, {} deleting... re-uploading...",
            job.log_prefix,
            job.name,
            reason.describe()
        ));
        self.client.unlink(job.parent, job.name).await?;
        self.upload(job).await?;
        self.update_summary(|summary| summary.replaced += 1);
        Ok(())
    }

    async fn upload(&self, job: &FileJob<'_>) -> Result<Capability, SyncError> {
        let label = format!("{}{}", job.log_prefix, job.name);
        let unit = self.config.progress_unit;
        let progress = self
            .reporter
            .upload(&label, job.size.saturating_mul(unit.multiplier()), unit);

        let result = upload_file(
            &self.client,
            job.path,
            job.name,
            job.parent,
            self.config.block_size,
            unit,
            Arc::clone(&progress),
        )
        .await;
        progress.finish();

        let cap = result?;
        self.reporter.line(&format!("{label} done!"));
        self.update_summary(|summary| summary.bytes_uploaded += job.size);
        Ok(cap)
    }

    fn skip(&self, path: &Path, log_prefix: &str, reason: &str) -> Result<(), SyncError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        self.reporter.line(&format!("{log_prefix}{name} {reason}"));
        self.update_summary(|summary| summary.skipped += 1);
        Ok(())
    }

    fn update_summary(&self, update: impl FnOnce(&mut SyncSummary)) {
        if let Ok(mut summary) = self.summary.lock() {
            update(&mut summary);
        }
    }
}

/// One local file headed for `parent`; `size` is the local length used for progress.
struct FileJob<'a> {
    path: &'a Path,
    name: &'a str,
    size: u64,
    parent: &'a Capability,
    log_prefix: &'a str,
}

fn local_name(path: &Path) -> Result<&str, SyncError> {
    entry_name(path).ok_or_else(|| SyncError::InvalidLocalPath(path.to_path_buf()))
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
