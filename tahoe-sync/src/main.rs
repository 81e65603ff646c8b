use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tahoe_core::{Capability, TahoeClient};
use tahoe_sync::config::{CompareMode, DirectoryPolicy, SyncConfig};
use tahoe_sync::progress::{PlainReporter, ProgressUnit, Reporter, TerminalReporter};
use tahoe_sync::sync::SyncEngine;

/// Upload a file or directory tree to a Tahoe-LAFS directory, skipping files already there.
#[derive(Debug, Parser)]
#[command(name = "tahoe-sync", version, about)]
struct Cli {
    /// Path to file or directory to upload. Like rsync, add a trailing slash to upload
    /// directory contents, no trailing slash to upload the directory itself.
    path: PathBuf,
    /// HTTP REST API URL of a Tahoe-LAFS node
    api: String,
    /// Tahoe directory capability where files should be uploaded to
    cap: String,
    /// Upload block size in bytes [env: TAHOE_UPLOAD_BLOCK_SIZE, default: 524288]
    #[arg(long, value_name = "BYTES")]
    block_size: Option<usize>,
    /// Count progress in bytes or bits [env: TAHOE_PROGRESS_UNIT]
    #[arg(long, value_name = "UNIT")]
    progress_unit: Option<ProgressUnit>,
    /// Treat same-size files as equal (size) or compare SHA-256 (content) [env: TAHOE_COMPARE]
    #[arg(long, value_name = "MODE")]
    compare: Option<CompareMode>,
    /// Replace a remote directory that has the name of a local file
    #[arg(long)]
    replace_directories: bool,
    /// Print decisions only, without progress bars
    #[arg(long, short)]
    quiet: bool,
}

impl Cli {
    fn sync_config(&self, base: SyncConfig) -> SyncConfig {
        SyncConfig {
            block_size: self.block_size.unwrap_or(base.block_size),
            progress_unit: self.progress_unit.unwrap_or(base.progress_unit),
            compare: self.compare.unwrap_or(base.compare),
            directory_policy: if self.replace_directories {
                DirectoryPolicy::Replace
            } else {
                base.directory_policy
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = cli.sync_config(SyncConfig::from_env());

    let client = TahoeClient::new(&cli.api)
        .with_context(|| format!("invalid gateway url {}", cli.api))?;
    let reporter: Arc<dyn Reporter> = if cli.quiet {
        Arc::new(PlainReporter)
    } else {
        Arc::new(TerminalReporter::new())
    };
    let engine = SyncEngine::new(client, config)?.with_reporter(reporter);

    let root = Capability::new(cli.cap.clone());
    let summary = engine
        .reconcile(&cli.path, &root)
        .await
        .with_context(|| format!("failed to sync {}", cli.path.display()))?;

    eprintln!(
        "[tahoe-sync] finished: uploaded={}, replaced={}, unchanged={}, directories_created={}, skipped={}, bytes={}",
        summary.uploaded,
        summary.replaced,
        summary.unchanged,
        summary.directories_created,
        summary.skipped,
        summary.bytes_uploaded
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn positional_arguments_are_required() {
        assert!(Cli::try_parse_from(["tahoe-sync", "dir/"]).is_err());
    }

    #[test]
    fn flags_override_environment_config() {
        let cli = parse(&[
            "tahoe-sync",
            "dir/",
            "http://127.0.0.1:3456",
            "URI:DIR2:root",
            "--block-size",
            "1024",
            "--progress-unit",
            "bits",
            "--compare",
            "content",
            "--replace-directories",
        ]);
        let config = cli.sync_config(SyncConfig::default());

        assert_eq!(cli.path, PathBuf::from("dir/"));
        assert_eq!(config.block_size, 1024);
        assert_eq!(config.progress_unit, ProgressUnit::Bits);
        assert_eq!(config.compare, CompareMode::Content);
        assert_eq!(config.directory_policy, DirectoryPolicy::Replace);
    }

    #[test]
    fn missing_flags_keep_base_config() {
        let cli = parse(&["tahoe-sync", "dir", "http://127.0.0.1:3456", "URI:DIR2:root"]);
        let base = SyncConfig {
            block_size: 4096,
            directory_policy: DirectoryPolicy::Replace,
            ..SyncConfig::default()
        };

        assert_eq!(cli.sync_config(base), base);
    }

    #[test]
    fn rejects_unknown_progress_unit() {
        assert!(
            Cli::try_parse_from([
                "tahoe-sync",
                "dir",
                "http://127.0.0.1:3456",
                "URI:DIR2:root",
                "--progress-unit",
                "nibbles",
            ])
            .is_err()
        );
    }
}
