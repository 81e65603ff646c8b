use std::collections::HashMap;
use std::collections::hash_map;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::TahoeError;

const DIRNODE: &str = "dirnode";
const FILENODE: &str = "filenode";

/// Opaque gateway identifier for a file or directory node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Capability {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Capability {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    /// Read-write cap for directories when the gateway exposes one, read-only cap for files.
    pub cap: Capability,
    pub kind: NodeKind,
    /// `None` for directories and for mutable files, which do not report a size.
    pub size: Option<u64>,
}

impl RemoteEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Snapshot of one directory's children, keyed by exact (case-sensitive) name.
#[derive(Debug, Clone, Default)]
pub struct RemoteListing {
    entries: HashMap<String, RemoteEntry>,
}

impl RemoteListing {
    pub fn get(&self, name: &str) -> Option<&RemoteEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> hash_map::Values<'_, String, RemoteEntry> {
        self.entries.values()
    }
}

impl FromIterator<RemoteEntry> for RemoteListing {
    fn from_iter<T: IntoIterator<Item = RemoteEntry>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirnodeBody {
    #[serde(default)]
    children: HashMap<String, (String, ChildNode)>,
}

#[derive(Debug, Deserialize)]
struct ChildNode {
    #[serde(default)]
    rw_uri: Option<Capability>,
    #[serde(default)]
    ro_uri: Option<Capability>,
    #[serde(default)]
    size: Option<u64>,
}

/// Parses a `?t=json` response body for a directory node.
pub fn parse_listing(body: &str) -> Result<RemoteListing, TahoeError> {
    let (node_type, content): (String, serde_json::Value) = serde_json::from_str(body)?;
    if node_type != DIRNODE {
        return Err(TahoeError::UnsupportedNodeType(node_type));
    }
    let body: DirnodeBody = serde_json::from_value(content)?;

    let mut entries = HashMap::with_capacity(body.children.len());
    for (name, (child_type, child)) in body.children {
        let (kind, cap, size) = match child_type.as_str() {
            DIRNODE => (NodeKind::Directory, child.rw_uri.or(child.ro_uri), None),
            FILENODE => (NodeKind::File, child.ro_uri.or(child.rw_uri), child.size),
            other => return Err(TahoeError::UnsupportedNodeType(other.to_string())),
        };
        let cap = cap.ok_or_else(|| TahoeError::MissingCapability(name.clone()))?;
        entries.insert(
            name.clone(),
            RemoteEntry {
                name,
                cap,
                kind,
                size,
            },
        );
    }

    Ok(RemoteListing { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn directory_children_prefer_rw_uri() {
        let body = json!(["dirnode", {
            "rw_uri": "URI:DIR2:root",
            "children": {
                "docs": ["dirnode", {"rw_uri": "URI:DIR2:docs", "ro_uri": "URI:DIR2-RO:docs"}],
                "shared": ["dirnode", {"ro_uri": "URI:DIR2-RO:shared"}]
            }
        }]);
        let listing = parse_listing(&body.to_string()).unwrap();

        let docs = listing.get("docs").unwrap();
        assert!(docs.is_dir());
        assert_eq!(docs.cap.as_str(), "URI:DIR2:docs");
        assert_eq!(docs.size, None);
        assert_eq!(listing.get("shared").unwrap().cap.as_str(), "URI:DIR2-RO:shared");
    }

    #[test]
    fn mutable_file_without_size_is_distinct_from_empty_file() {
        let body = json!(["dirnode", {
            "children": {
                "empty.txt": ["filenode", {"ro_uri": "URI:CHK:empty", "size": 0, "mutable": false}],
                "notes.txt": ["filenode", {"ro_uri": "URI:SSK-RO:notes", "mutable": true}]
            }
        }]);
        let listing = parse_listing(&body.to_string()).unwrap();

        assert_eq!(listing.get("empty.txt").unwrap().size, Some(0));
        assert_eq!(listing.get("notes.txt").unwrap().size, None);
        assert!(!listing.get("notes.txt").unwrap().is_dir());
    }

    #[test]
    fn rejects_file_node_at_top_level() {
        let body = json!(["filenode", {"ro_uri": "URI:CHK:x", "size": 3}]);
        assert!(matches!(
            parse_listing(&body.to_string()),
            Err(TahoeError::UnsupportedNodeType(kind)) if kind == "filenode"
        ));
    }

    #[test]
    fn rejects_unknown_child_node() {
        let body = json!(["dirnode", {"children": {"x": ["unknown", {"ro_uri": "imm.xyz"}]}}]);
        assert!(matches!(
            parse_listing(&body.to_string()),
            Err(TahoeError::UnsupportedNodeType(kind)) if kind == "unknown"
        ));
    }

    #[test]
    fn child_without_any_cap_is_an_error() {
        let body = json!(["dirnode", {"children": {"x": ["filenode", {"size": 3}]}}]);
        assert!(matches!(
            parse_listing(&body.to_string()),
            Err(TahoeError::MissingCapability(name)) if name == "x"
        ));
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        assert!(matches!(
            parse_listing("<html>oops</html>"),
            Err(TahoeError::Decode(_))
        ));
    }

    #[test]
    fn empty_directory_has_no_children() {
        let body = json!(["dirnode", {"children": {}}]);
        assert!(parse_listing(&body.to_string()).unwrap().is_empty());
    }
}
