//! File maps and the serialized context buffer.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Root of the user's project inside the workspace.
pub const WORK_DIR: &str = "/home/project";

pub const ARTIFACT_TAG: &str = "codesmithArtifact";
pub const ACTION_TAG: &str = "codesmithAction";

/// Paths never serialized into the context buffer (gitignore syntax).
pub const IGNORE_PATTERNS: &[&str] = &[
    "node_modules",
    ".git",
    ".github",
    ".vscode",
    ".idea",
    ".next",
    ".cache",
    "dist",
    "build",
    "coverage",
    "*.log",
    "*.lock",
    "package-lock.json",
    "pnpm-lock.yaml",
    ".DS_Store",
    ".env*",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileEntry {
    File {
        content: String,
        #[serde(default)]
        is_binary: bool,
        #[serde(default)]
        is_locked: bool,
    },
    Folder {
        #[serde(default)]
        is_locked: bool,
    },
}

impl FileEntry {
    pub fn file(content: impl Into<String>) -> Self {
        FileEntry::File {
            content: content.into(),
            is_binary: false,
            is_locked: false,
        }
    }

    pub fn locked_file(content: impl Into<String>) -> Self {
        FileEntry::File {
            content: content.into(),
            is_binary: false,
            is_locked: true,
        }
    }
}

/// Path → entry, iterated in path order.
pub type FileMap = BTreeMap<String, FileEntry>;

static IGNORED: LazyLock<Gitignore> = LazyLock::new(|| {
    let mut builder = GitignoreBuilder::new(".");
    for pattern in IGNORE_PATTERNS {
        if let Err(e) = builder.add_line(None, pattern) {
            tracing::warn!(pattern, error = %e, "invalid context ignore pattern");
        }
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to build context ignore matcher");
        Gitignore::empty()
    })
});

/// Strip the work dir prefix and any leading slash.
///
/// The prefix only counts at a path boundary, so `/home/project2` is not under the work dir.
pub fn relative_path(path: &str) -> &str {
    let stripped = match path.strip_prefix(WORK_DIR) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    };
    stripped.trim_start_matches('/')
}

pub fn is_ignored(path: &str) -> bool {
    let rel = relative_path(path);
    if rel.is_empty() {
        return false;
    }
    IGNORED.matched_path_or_any_parents(rel, false).is_ignore()
}

/// Serialize text files into a single artifact for the context buffer.
pub fn create_files_context(files: &FileMap, use_relative_path: bool) -> String {
    let actions: Vec<String> = files
        .iter()
        .filter(|(path, _)| !is_ignored(path))
        .filter_map(|(path, entry)| match entry {
            FileEntry::File {
                content,
                is_binary: false,
                ..
            } => {
                let shown = if use_relative_path {
                    relative_path(path)
                } else {
                    path.as_str()
                };
                Some(format!(
                    "<{action} type=\"file\" filePath=\"{shown}\">{content}</{action}>",
                    action = ACTION_TAG,
                ))
            }
            _ => None,
        })
        .collect();

    format!(
        "<{tag} id=\"code-content\" title=\"Code Content\" >\n{}\n</{tag}>",
        actions.join("\n"),
        tag = ARTIFACT_TAG,
    )
}

/// Paths of locked files, in map order.
pub fn locked_paths(files: &FileMap) -> Vec<&str> {
    files
        .iter()
        .filter(|(_, entry)| matches!(entry, FileEntry::File { is_locked: true, .. }))
        .map(|(path, _)| path.as_str())
        .collect()
}
