use glob::MatchOptions;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Input directory '{0}' does not exist or is not a directory")]
    NotADirectory(PathBuf),
    #[error("Input directory '{0}' is not valid UTF-8")]
    NonUtf8Path(PathBuf),
    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("Failed to read directory entry: {0}")]
    Walk(#[from] glob::GlobError),
}

/// One input structure file found under the input root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Path relative to the input root, `/`-separated.
    pub id: String,
    pub path: PathBuf,
}

/// Recursively finds `*.cif` files (case-insensitive) under `root`, sorted by id.
pub fn discover_structures(root: &Path) -> Result<Vec<InputFile>, DiscoveryError> {
    discover_with_extension(root, "cif")
}

pub fn discover_with_extension(
    root: &Path,
    extension: &str,
) -> Result<Vec<InputFile>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }
    let root_str = root
        .to_str()
        .ok_or_else(|| DiscoveryError::NonUtf8Path(root.to_path_buf()))?;
    let pattern = format!(
        "{}/**/*.{}",
        glob::Pattern::escape(root_str.trim_end_matches(['/', '\\'])),
        extension
    );
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut files = Vec::new();
    for entry in glob::glob_with(&pattern, options)? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        let id = relative_id(root, &path);
        files.push(InputFile { id, path });
    }
    files.sort_by(|a, b| a.id.cmp(&b.id));

    debug!(root = %root.display(), count = files.len(), "Discovered input structures");
    Ok(files)
}

/// Relative path of `path` under `root`, joined with `/` on every platform.
pub fn relative_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
