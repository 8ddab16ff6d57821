//! The in-memory tree a traversal produces.

use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Directory,
    File,
    Symlink,
}

/// What a file node carries in place of, or as, its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Bytes(Vec<u8>),
    /// Above the per-file limit; never read.
    TooLarge { size: u64, limit: u64 },
    /// The read failed with this error text.
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemNode {
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    pub file_count: usize,
    /// Directories count themselves.
    pub dir_count: usize,
    pub depth: usize,
    /// `/`-separated, relative to the traversal root; empty for the root.
    pub path: String,
    pub children: Vec<FileSystemNode>,
    pub content: Option<FileContent>,
}

impl FileSystemNode {
    pub fn directory(name: impl Into<String>, path: impl Into<String>, depth: usize) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
            size: 0,
            file_count: 0,
            dir_count: 1,
            depth,
            path: path.into(),
            children: Vec::new(),
            content: None,
        }
    }

    pub fn file(
        name: impl Into<String>,
        path: impl Into<String>,
        depth: usize,
        size: u64,
        content: FileContent,
    ) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            size,
            file_count: 1,
            dir_count: 0,
            depth,
            path: path.into(),
            children: Vec::new(),
            content: Some(content),
        }
    }

    pub fn symlink(name: impl Into<String>, path: impl Into<String>, depth: usize) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Symlink,
            size: 0,
            file_count: 1,
            dir_count: 0,
            depth,
            path: path.into(),
            children: Vec::new(),
            content: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Links a finished child and folds its totals into this directory.
    pub fn push_child(&mut self, child: FileSystemNode) {
        self.size += child.size;
        self.file_count += child.file_count;
        self.dir_count += child.dir_count;
        self.children.push(child);
    }

    /// Directories first, then byte-wise by name.
    pub fn sort_children(&mut self) {
        self.children.sort_by(|a, b| match (a.is_dir(), b.is_dir()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.name.as_bytes().cmp(b.name.as_bytes()),
        });
    }

    /// Whether every directory's totals equal the sum over its children.
    pub fn totals_consistent(&self) -> bool {
        if !self.is_dir() {
            return true;
        }
        let size: u64 = self.children.iter().map(|c| c.size).sum();
        let files: usize = self.children.iter().map(|c| c.file_count).sum();
        let dirs: usize = 1 + self.children.iter().map(|c| c.dir_count).sum::<usize>();
        size == self.size
            && files == self.file_count
            && dirs == self.dir_count
            && self.children.iter().all(FileSystemNode::totals_consistent)
    }

    /// Depth-first, pre-order; the order the tree and content are rendered in.
    pub fn walk(&self) -> Vec<&FileSystemNode> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a FileSystemNode>) {
        out.push(self);
        for child in &self.children {
            child.collect(out);
        }
    }
}

/// Running budget counters for one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileSystemStats {
    pub total_files: usize,
    pub total_size: u64,
}
