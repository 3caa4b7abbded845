use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::manifest::detect_ecosystem;
use crate::model::ManifestFile;

/// Directories never descended into.
pub const SKIP_DIRS: &[&str] = &["node_modules", ".git", "target", "vendor", ".venv"];

/// Reads every recognised manifest under `paths`.
///
/// Directories are walked recursively, skipping [`SKIP_DIRS`]. Files named
/// explicitly are always read, recognised or not, so the scan can report
/// them. Unreadable files found while walking are logged and skipped.
///
/// # Errors
///
/// Returns an error if an explicit path does not exist or cannot be read.
pub fn collect_manifest_files(paths: &[PathBuf]) -> Result<Vec<ManifestFile>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(read_manifest(path)?);
            continue;
        }
        if !path.is_dir() {
            anyhow::bail!("path not found: {}", path.display());
        }

        let walker = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let shown = entry.path().to_string_lossy();
            if detect_ecosystem(&shown).is_none() {
                continue;
            }
            match read_manifest(entry.path()) {
                Ok(file) => files.push(file),
                Err(e) => tracing::warn!(file = %shown, error = %e, "skipping unreadable manifest"),
            }
        }
    }

    tracing::debug!(count = files.len(), "collected manifest files");
    Ok(files)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIP_DIRS.contains(&name))
}

fn read_manifest(path: &Path) -> Result<ManifestFile> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(ManifestFile::new(path.to_string_lossy(), content))
}
