//! Directory-tree snapshot nodes
//!
//! A [`HierarchyNode`] is a read-only view of one file or directory. Paths
//! are `/`-separated and relative to the root the snapshot was taken from,
//! so the same tree can come from the live store, a destination listing or
//! a package, and still be compared entry by entry.
//!
//! Children are always ordered by name.

use std::collections::BTreeMap;

/// One node of a directory-tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    relative_path: String,
    is_directory: bool,
    size: u64,
    checksum: Option<u32>,
    children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    /// A file node.
    pub fn file(relative_path: impl Into<String>, size: u64, checksum: Option<u32>) -> Self {
        HierarchyNode {
            relative_path: relative_path.into(),
            is_directory: false,
            size,
            checksum,
            children: Vec::new(),
        }
    }

    /// A directory node. Children are sorted by name.
    pub fn directory(relative_path: impl Into<String>, mut children: Vec<HierarchyNode>) -> Self {
        children.sort_by(|a, b| a.name().cmp(b.name()));
        HierarchyNode {
            relative_path: relative_path.into(),
            is_directory: true,
            size: 0,
            checksum: None,
            children,
        }
    }

    /// Path relative to the snapshot root; empty for the root itself.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Last path component.
    pub fn name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    /// Whether this node is a directory.
    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Size in bytes; zero for directories.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// CRC32 of the content, if it was computed.
    pub fn checksum(&self) -> Option<u32> {
        self.checksum
    }

    /// Children in name order; empty for files.
    pub fn children(&self) -> &[HierarchyNode] {
        &self.children
    }

    /// Node at `relative_path`, searching this subtree.
    pub fn find(&self, relative_path: &str) -> Option<&HierarchyNode> {
        let relative_path = relative_path.trim_matches('/');
        if self.relative_path == relative_path {
            return Some(self);
        }
        let prefix_matches = self.relative_path.is_empty()
            || relative_path
                .strip_prefix(self.relative_path.as_str())
                .map(|rest| rest.starts_with('/'))
                .unwrap_or(false);
        if !prefix_matches {
            return None;
        }
        self.children.iter().find_map(|c| c.find(relative_path))
    }

    /// Number of files in this subtree.
    pub fn file_count(&self) -> usize {
        if self.is_directory {
            self.children.iter().map(HierarchyNode::file_count).sum()
        } else {
            1
        }
    }

    /// Total size of all files in this subtree.
    pub fn total_size(&self) -> u64 {
        if self.is_directory {
            self.children.iter().map(HierarchyNode::total_size).sum()
        } else {
            self.size
        }
    }

    /// All file nodes in depth-first name order.
    pub fn files(&self) -> Vec<&HierarchyNode> {
        let mut files = Vec::new();
        self.collect_files(&mut files);
        files
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a HierarchyNode>) {
        if self.is_directory {
            for child in &self.children {
                child.collect_files(out);
            }
        } else {
            out.push(self);
        }
    }
}

/// Join two relative paths with `/`, skipping empty sides.
pub fn join_relative(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, path),
    }
}

#[derive(Default)]
struct PendingNode {
    is_directory: bool,
    size: u64,
    checksum: Option<u32>,
    children: BTreeMap<String, PendingNode>,
}

/// Builds a tree from flat path entries in any order.
///
/// Missing intermediate directories are created implicitly.
#[derive(Default)]
pub struct HierarchyBuilder {
    root_path: String,
    root: PendingNode,
}

impl HierarchyBuilder {
    /// Builder whose root node has relative path `root_path`.
    pub fn new(root_path: impl Into<String>) -> Self {
        HierarchyBuilder {
            root_path: root_path.into(),
            root: PendingNode {
                is_directory: true,
                ..Default::default()
            },
        }
    }

    fn slot(&mut self, path: &str) -> &mut PendingNode {
        let mut node = &mut self.root;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            node.is_directory = true;
            node = node.children.entry(component.to_string()).or_default();
        }
        node
    }

    /// Add a directory at `path` (relative to the builder root).
    pub fn add_directory(&mut self, path: &str) -> &mut Self {
        self.slot(path).is_directory = true;
        self
    }

    /// Add a file at `path` (relative to the builder root).
    pub fn add_file(&mut self, path: &str, size: u64, checksum: Option<u32>) -> &mut Self {
        let node = self.slot(path);
        node.is_directory = false;
        node.size = size;
        node.checksum = checksum;
        self
    }

    /// Finish the tree.
    pub fn build(self) -> HierarchyNode {
        convert(self.root_path, self.root)
    }
}

fn convert(path: String, pending: PendingNode) -> HierarchyNode {
    if !pending.is_directory {
        return HierarchyNode::file(path, pending.size, pending.checksum);
    }
    let children = pending
        .children
        .into_iter()
        .map(|(name, child)| convert(join_relative(&path, &name), child))
        .collect();
    HierarchyNode::directory(path, children)
}
