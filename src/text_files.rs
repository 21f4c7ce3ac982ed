//! # Text Files Module
//!
//! The single text-vs-binary predicate used by both template copying in
//! [`crate::templates`] and project generation in [`crate::generator`], plus
//! `{token}` substitution and recursive tree copy built on it.
//!
//! Text files (by extension or well-known file name) are read, substituted and
//! rewritten; everything else is byte-copied unchanged.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions (lowercase, without dot) treated as token-substitutable text.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "bicep", "bicepparam", "tf", "tfvars", "hcl", "json", "jsonc", "yaml", "yml", "xml", "toml",
    "ini", "cfg", "conf", "config", "env", "properties", "md", "txt", "csv", "html", "htm", "css",
    "scss", "cs", "csproj", "sln", "props", "targets", "razor", "java", "gradle", "kts", "py",
    "pyi", "js", "mjs", "cjs", "jsx", "ts", "tsx", "go", "mod", "sum", "sh", "bash", "ps1",
    "psm1", "bat", "cmd", "sql", "graphql", "proto", "dockerfile", "gitignore", "editorconfig",
    "template", "tpl",
];

/// Extension-less file names treated as text.
pub const TEXT_FILE_NAMES: &[&str] = &[
    "Dockerfile",
    "Makefile",
    "Procfile",
    "LICENSE",
    "README",
    ".gitignore",
    ".dockerignore",
    ".editorconfig",
    ".deployment-tag",
];

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{([A-Za-z0-9_][A-Za-z0-9_.:\-]*)\}").expect("token pattern is valid")
});

/// Whether `path` gets token substitution rather than a verbatim byte copy.
pub fn is_text_file(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if TEXT_FILE_NAMES.contains(&name) {
            return true;
        }
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Replace every `{name}` whose name is a key of `tokens`.
///
/// Unknown placeholders are left verbatim.
///
/// ```rust
/// use apigen::text_files::apply_tokens;
/// use std::collections::HashMap;
///
/// let tokens = HashMap::from([("name".to_string(), "orders".to_string())]);
/// assert_eq!(apply_tokens("{name}-{missing}", &tokens), "orders-{missing}");
/// ```
pub fn apply_tokens(content: &str, tokens: &HashMap<String, String>) -> String {
    if tokens.is_empty() {
        return content.to_string();
    }
    TOKEN_RE
        .replace_all(content, |caps: &Captures<'_>| match tokens.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Copy one file, substituting tokens when it is a text file.
///
/// Text files that are not valid UTF-8 fall back to a byte copy. Returns the
/// number of bytes written.
pub fn copy_file_with_tokens(
    src: &Path,
    dest: &Path,
    tokens: &HashMap<String, String>,
) -> io::Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    if is_text_file(src) {
        let bytes = fs::read(src)?;
        match String::from_utf8(bytes) {
            Ok(text) => {
                let rendered = apply_tokens(&text, tokens);
                fs::write(dest, rendered.as_bytes())?;
                return Ok(rendered.len() as u64);
            }
            Err(e) => {
                tracing::debug!(file = %src.display(), "Non UTF-8 text file, copying verbatim");
                fs::write(dest, e.as_bytes())?;
                return Ok(e.as_bytes().len() as u64);
            }
        }
    }
    fs::copy(src, dest)
}

/// A file written by [`copy_tree_with_tokens`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedFile {
    /// Path relative to the destination root, `/`-separated.
    pub relative_path: String,
    pub full_path: PathBuf,
    pub size_bytes: u64,
}

/// Recursively copy `src` into `dest`, skipping VCS metadata directories.
///
/// Files are visited in sorted order so the result is deterministic.
pub fn copy_tree_with_tokens(
    src: &Path,
    dest: &Path,
    tokens: &HashMap<String, String>,
) -> io::Result<Vec<CopiedFile>> {
    fs::create_dir_all(dest)?;
    let mut copied = Vec::new();
    let walker = WalkDir::new(src)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_vcs_dir(e.path()));
    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?
            .to_path_buf();
        let target = dest.join(&rel);
        let size_bytes = copy_file_with_tokens(entry.path(), &target, tokens)?;
        copied.push(CopiedFile {
            relative_path: to_slash_path(&rel),
            full_path: target,
            size_bytes,
        });
    }
    Ok(copied)
}

/// `.git`, `.svn` and `.hg` directories.
pub fn is_vcs_dir(path: &Path) -> bool {
    path.is_dir()
        && matches!(
            path.file_name().and_then(|n| n.to_str()),
            Some(".git") | Some(".svn") | Some(".hg")
        )
}

/// Render a relative path with `/` separators on every platform.
pub fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
