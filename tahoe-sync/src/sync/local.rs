use std::io;
use std::path::{Path, PathBuf, is_separator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    File,
    Directory,
    /// Symlinks, devices, sockets and anything else that is not synced.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub path: PathBuf,
    pub kind: LocalKind,
    pub size: u64,
}

/// Classifies `path` without following symlinks.
pub async fn classify(path: &Path) -> io::Result<LocalEntry> {
    let metadata = tokio::fs::symlink_metadata(path).await?;
    let file_type = metadata.file_type();
    let kind = if file_type.is_file() {
        LocalKind::File
    } else if file_type.is_dir() {
        LocalKind::Directory
    } else {
        LocalKind::Other
    };
    Ok(LocalEntry {
        path: path.to_path_buf(),
        kind,
        size: metadata.len(),
    })
}

/// Children of `dir`, ordered by file name.
pub async fn sorted_children(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut children = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        children.push(entry.path());
    }
    children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(children)
}

/// Name under which `path` is stored remotely; `None` when it has no UTF-8 final component.
pub fn entry_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// `dir/` means "the contents of dir", `dir` means "dir itself".
pub fn has_trailing_separator(path: &Path) -> bool {
    path.as_os_str()
        .as_encoded_bytes()
        .last()
        .is_some_and(|last| is_separator(char::from(*last)))
}

pub fn nested_prefix(prefix: &str) -> String {
    format!("{prefix}    ")
}
