//! Rendering a traversed tree into the three digest parts.
//!
//! All three parts follow the same depth-first order over the already sorted tree, so a
//! given tree always yields byte-identical output.

use std::borrow::Cow;
use tracing::info;

use crate::error::{ContentReadError, Diagnostic};
use crate::node::{FileContent, FileSystemNode, NodeKind};
use crate::query::IngestionQuery;

const RULE: &str = "================================================";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub summary: String,
    pub tree: String,
    pub content: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Summary, box-drawn tree and concatenated contents for a directory tree.
pub fn assemble(root: &FileSystemNode, query: &IngestionQuery) -> Digest {
    let mut diagnostics = Vec::new();
    let mut content = String::new();

    for node in root.walk() {
        if node.kind != NodeKind::File {
            continue;
        }
        let text = render_text(node, &mut diagnostics);
        content.push_str(RULE);
        content.push_str("\nFILE: ");
        content.push_str(&node.path);
        content.push('\n');
        content.push_str(RULE);
        content.push('\n');
        content.push_str(&text);
        content.push_str("\n\n");
    }

    let mut summary = source_lines(query);
    summary.push_str(&format!("Files analyzed: {}\n", root.file_count));
    summary.push_str(&format!(
        "Directories: {}\n",
        root.dir_count.saturating_sub(1)
    ));
    summary.push_str(&format!("Total size: {}\n", human_size(root.size)));

    let mut tree = String::from("Directory structure:\n");
    render_node(&mut tree, root, "", true);

    info!(
        files = root.file_count,
        bytes = content.len(),
        "[DIGEST] Assembled directory digest"
    );
    Digest {
        summary,
        tree,
        content,
        diagnostics,
    }
}

/// A single file: no content header, the raw text as the content.
pub fn assemble_file(file: &FileSystemNode, query: &IngestionQuery) -> Digest {
    let mut diagnostics = Vec::new();
    let content = render_text(file, &mut diagnostics).into_owned();

    let mut summary = source_lines(query);
    summary.push_str(&format!("File: {}\n", file.name));
    summary.push_str(&format!("Total size: {}\n", human_size(file.size)));

    let mut tree = String::from("Directory structure:\n");
    render_node(&mut tree, file, "", true);

    info!(path = %file.path, bytes = content.len(), "[DIGEST] Assembled single-file digest");
    Digest {
        summary,
        tree,
        content,
        diagnostics,
    }
}

/// The file's text, or a placeholder if it has none to show.
pub fn file_text(node: &FileSystemNode) -> Result<&str, ContentReadError> {
    match &node.content {
        Some(FileContent::Bytes(bytes)) => {
            std::str::from_utf8(bytes).map_err(|_| ContentReadError::NotText {
                path: node.path.clone(),
            })
        }
        Some(FileContent::TooLarge { size, limit }) => Err(ContentReadError::TooLarge {
            path: node.path.clone(),
            size: *size,
            limit: *limit,
        }),
        Some(FileContent::Unreadable(reason)) => Err(ContentReadError::Unreadable {
            path: node.path.clone(),
            reason: reason.clone(),
        }),
        None => Ok(""),
    }
}

fn render_text<'a>(node: &'a FileSystemNode, diagnostics: &mut Vec<Diagnostic>) -> Cow<'a, str> {
    match file_text(node) {
        Ok(text) => Cow::Borrowed(text),
        Err(e) => {
            let placeholder = placeholder(&e);
            diagnostics.push(e.into());
            Cow::Owned(placeholder)
        }
    }
}

fn placeholder(err: &ContentReadError) -> String {
    match err {
        ContentReadError::NotText { .. } => "[Binary or non-UTF-8 content omitted]".to_string(),
        ContentReadError::Unreadable { reason, .. } => format!("[Unreadable file: {reason}]"),
        ContentReadError::TooLarge { size, limit, .. } => format!(
            "[File too large: {} exceeds {}]",
            human_size(*size),
            human_size(*limit)
        ),
    }
}

fn source_lines(query: &IngestionQuery) -> String {
    let mut out = if query.is_remote() {
        format!("Repository: {}\n", query.slug)
    } else {
        format!("Directory: {}\n", query.slug)
    };
    if let Some(commit) = &query.commit {
        out.push_str(&format!("Commit: {commit}\n"));
    } else if let Some(branch) = &query.branch {
        out.push_str(&format!("Branch: {branch}\n"));
    }
    if query.subpath != "/" {
        out.push_str(&format!("Subpath: {}\n", query.subpath));
    }
    out
}

fn render_node(out: &mut String, node: &FileSystemNode, prefix: &str, last: bool) {
    out.push_str(prefix);
    out.push_str(if last { "└── " } else { "├── " });
    out.push_str(&node.name);
    match node.kind {
        NodeKind::Directory => out.push('/'),
        NodeKind::Symlink => out.push('@'),
        NodeKind::File => {}
    }
    out.push('\n');

    let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        render_node(out, child, &child_prefix, i + 1 == count);
    }
}

/// `512 B`, `1.5 KB`, `2.0 MB`.
pub fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let value = bytes as f64;
    if value < KB {
        format!("{bytes} B")
    } else if value < KB * KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{:.1} MB", value / (KB * KB))
    }
}
