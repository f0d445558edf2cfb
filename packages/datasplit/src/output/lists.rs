//! List-file writer.

use std::fs;
use std::path::{Path, PathBuf};

use super::write_atomic;
use crate::config::LIST_FILE_DIR;
use crate::error::Result;
use crate::types::{SplitKind, SplitPlan};

/// File name of a bucket's list file.
///
/// # Examples
/// ```
/// use datasplit::output::list_file_name;
/// use datasplit::types::SplitKind;
///
/// assert_eq!(list_file_name("orca", SplitKind::Train, 0), "orca_train_0.list");
/// ```
#[must_use]
pub fn list_file_name(output_file_name: &str, kind: SplitKind, index: usize) -> String {
    format!("{output_file_name}_{kind}_{index}.list")
}

/// Full path of a bucket's list file below the output folder.
#[must_use]
pub fn list_file_path(
    output_folder: &Path,
    output_file_name: &str,
    kind: SplitKind,
    index: usize,
) -> PathBuf {
    output_folder
        .join(LIST_FILE_DIR)
        .join(list_file_name(output_file_name, kind, index))
}

/// Split kind and bucket index of a list file written for `output_file_name`.
fn parse_list_file_name(output_file_name: &str, file_name: &str) -> Option<(SplitKind, usize)> {
    let rest = file_name
        .strip_prefix(output_file_name)?
        .strip_prefix('_')?
        .strip_suffix(".list")?;
    let (kind, index) = rest.split_once('_')?;
    let kind = SplitKind::ALL.into_iter().find(|k| k.as_str() == kind)?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((kind, index.parse().ok()?))
}

/// Delete list files left behind by an earlier run with the same name.
///
/// Returns the removed paths.
pub fn remove_stale_list_files(
    output_folder: &Path,
    output_file_name: &str,
) -> Result<Vec<PathBuf>> {
    let dir = output_folder.join(LIST_FILE_DIR);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if parse_list_file_name(output_file_name, file_name).is_some() && path.is_file() {
            fs::remove_file(&path)?;
            tracing::debug!(path = %path.display(), "Removed stale list file");
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}

/// Write one list file per bucket of the plan.
///
/// List files of an earlier run with the same `output_file_name` are removed
/// first, so the folder only holds the buckets of this plan. Returns the
/// written paths in split order, then bucket order.
pub fn write_list_files(
    plan: &SplitPlan,
    output_folder: &Path,
    output_file_name: &str,
) -> Result<Vec<PathBuf>> {
    let removed = remove_stale_list_files(output_folder, output_file_name)?;
    if !removed.is_empty() {
        tracing::info!(files = removed.len(), "Removed list files of a previous run");
    }

    let mut written = Vec::new();
    for (kind, output) in &plan.splits {
        for (index, bucket) in output.buckets.iter().enumerate() {
            let path = list_file_path(output_folder, output_file_name, *kind, index);
            write_atomic(&path, &bucket.to_list_content())?;
            tracing::info!(split = %kind, bucket = index, files = bucket.len(), path = %path.display(), "Wrote list file");
            written.push(path);
        }
    }
    Ok(written)
}
