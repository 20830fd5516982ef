//! Source file discovery.
//!
//! Walks a directory and keeps the files whose path relative to the root
//! matches an include glob and no exclude glob. Results are sorted by
//! relative path so runs are deterministic.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use code_overview_core::extract::SourceFile;

use crate::config::FilesConfig;

/// A discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFile {
    /// Path relative to the scanned root, with `/` separators.
    pub relative: String,
    /// Absolute path on disk.
    pub absolute: PathBuf,
}

/// List files under `root` selected by `files`.
pub fn discover_files(root: &Path, files: &FilesConfig) -> Result<Vec<FoundFile>> {
    if !root.is_dir() {
        bail!("Directory does not exist: {}", root.display());
    }
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", root.display()))?;

    let include_set = build_globset(&files.include_globs)?;
    let exclude_set = build_globset(&files.exclude_globs)?;

    let mut found = Vec::new();
    for entry in WalkDir::new(&root).follow_links(files.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(&root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        found.push(FoundFile {
            relative: rel_str,
            absolute: path.to_path_buf(),
        });
    }

    found.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(found)
}

/// Read one file as UTF-8 text.
pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Read discovered files as UTF-8 text.
///
/// Files that are not valid UTF-8 are skipped with a warning; the
/// returned [`SourceFile::path`] is the relative path.
pub fn read_sources(found: &[FoundFile]) -> Result<Vec<SourceFile>> {
    let mut sources = Vec::with_capacity(found.len());
    for file in found {
        match std::fs::read_to_string(&file.absolute) {
            Ok(text) => sources.push(SourceFile {
                path: file.relative.clone(),
                text,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!(file = %file.relative, "skipping non-UTF-8 file");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", file.absolute.display()))
            }
        }
    }
    Ok(sources)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
