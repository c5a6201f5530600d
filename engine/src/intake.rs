//! File intake: validates and normalizes an upload selection into
//! [`FileRecord`]s before anything is sent to the generation service.
//!
//! Two selection shapes exist. A flat selection of individual files passes
//! through unfiltered - the user picked each file deliberately. A folder
//! selection is enumerated recursively and filtered: oversized files and
//! version-control metadata are excluded, and the exclusion is surfaced as a
//! non-fatal notice rather than an error.

use std::path::{Path, PathBuf};

use futures_util::future::join_all;
use mermake_types::FileRecord;

/// Size ceiling for folder-selection candidates: 20 KiB.
pub const MAX_FILE_SIZE_BYTES: u64 = 20 * 1024;

/// Path segments treated as version-control metadata directories.
const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// What the user selected for upload.
#[derive(Debug, Clone)]
pub enum FileSelection {
    /// Individually chosen files. No filtering is applied.
    Files(Vec<PathBuf>),
    /// A folder, enumerated recursively with filtering. Traversal order is
    /// platform-dependent; callers must not rely on it.
    Folder(PathBuf),
}

/// Result of running intake over a selection.
#[derive(Debug)]
pub struct IntakeOutcome {
    /// Records in selection order, every read settled (content or `None`).
    pub records: Vec<FileRecord>,
    /// Candidates excluded by the folder filter.
    pub excluded: usize,
    /// User-visible notice when anything was excluded.
    pub notice: Option<String>,
}

/// Collect a selection into file records.
///
/// All reads complete (or fail) before this returns; a partial file set is
/// never handed to the gateway. A failed read keeps its record with
/// `content: None`.
pub async fn collect(selection: &FileSelection) -> IntakeOutcome {
    match selection {
        FileSelection::Files(paths) => {
            // Individually chosen files carry no meaningful directory
            // structure; the wire path is the bare file name.
            let candidates: Vec<(String, PathBuf)> = paths
                .iter()
                .map(|path| {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    (name, path.clone())
                })
                .collect();
            IntakeOutcome {
                records: read_all(candidates).await,
                excluded: 0,
                notice: None,
            }
        }
        FileSelection::Folder(root) => collect_folder(root).await,
    }
}

async fn collect_folder(root: &Path) -> IntakeOutcome {
    let mut candidates = Vec::new();
    let mut excluded = 0usize;

    // Standard filters off: hidden files and gitignored files are fair game;
    // the exclusion rules here are the intake filter's own.
    let walker = ignore::WalkBuilder::new(root).standard_filters(false).build();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("Skipping unreadable entry during folder intake: {err}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ty| ty.is_file()) {
            continue;
        }

        let path = entry.path();
        let relative = relative_display(root, path);

        if contains_vcs_segment(&relative) {
            excluded += 1;
            continue;
        }
        let oversized = entry
            .metadata()
            .map(|meta| meta.len() > MAX_FILE_SIZE_BYTES)
            .unwrap_or(true);
        if oversized {
            excluded += 1;
            continue;
        }

        candidates.push((relative, path.to_path_buf()));
    }

    if excluded > 0 {
        tracing::warn!(excluded, "Folder intake excluded files over 20 KiB");
    }

    IntakeOutcome {
        records: read_all(candidates).await,
        excluded,
        notice: (excluded > 0).then(|| format!("{excluded} file(s) over 20 KiB were excluded.")),
    }
}

/// Relative path including the selected folder's own name, so `repo/src/a.rs`
/// stays distinguishable when several folders share file names.
fn relative_display(root: &Path, path: &Path) -> String {
    let inner = path.strip_prefix(root).unwrap_or(path);
    let full = match root.file_name() {
        Some(folder) => Path::new(folder).join(inner),
        None => inner.to_path_buf(),
    };
    // Wire paths use forward slashes regardless of platform.
    full.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn contains_vcs_segment(relative: &str) -> bool {
    relative
        .split('/')
        .any(|segment| VCS_DIRS.contains(&segment))
}

async fn read_all(candidates: Vec<(String, PathBuf)>) -> Vec<FileRecord> {
    let reads = candidates.into_iter().map(|(relative, path)| async move {
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!("Failed to read {}: {err}", path.display());
                None
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| relative.clone());
        FileRecord {
            name,
            path: relative,
            content,
        }
    });
    join_all(reads).await
}
