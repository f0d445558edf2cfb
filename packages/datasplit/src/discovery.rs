//! Discovery of run files per input group.
//!
//! Discovery sits behind the [`FileDiscovery`] trait so the planner can be
//! fed from any listing source. [`DirectoryDiscovery`] lists a directory on
//! the local filesystem.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::config::DEFAULT_FILE_EXTENSION;
use crate::error::{Result, SplitError};
use crate::types::{InputGroup, RunFile};

/// Default run-id rule: the last run of ASCII digits in the file stem.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DEFAULT_RUN_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)[^0-9]*$").expect("valid regex"));

/// Source of the raw file listing of a group.
pub trait FileDiscovery {
    /// Return the group's run files sorted by ascending run-id.
    fn discover(&self, group: &InputGroup) -> Result<Vec<RunFile>>;
}

/// Lists data files in a group's directory (non-recursive).
#[derive(Debug, Clone)]
pub struct DirectoryDiscovery {
    extension: String,
}

impl DirectoryDiscovery {
    /// Create a discovery for files with the given extension (without dot).
    #[must_use]
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

impl Default for DirectoryDiscovery {
    fn default() -> Self {
        Self::new(DEFAULT_FILE_EXTENSION)
    }
}

impl FileDiscovery for DirectoryDiscovery {
    fn discover(&self, group: &InputGroup) -> Result<Vec<RunFile>> {
        let custom = group
            .run_id_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| SplitError::discovery(&group.name, format!("invalid run_id_pattern: {e}")))?;
        let pattern = custom.as_ref().unwrap_or(&*DEFAULT_RUN_ID_PATTERN);

        let entries = fs::read_dir(&group.dir).map_err(|e| {
            SplitError::discovery(
                &group.name,
                format!("cannot read directory {}: {e}", group.dir.display()),
            )
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SplitError::discovery(
                    &group.name,
                    format!("cannot list directory {}: {e}", group.dir.display()),
                )
            })?;
            let path = entry.path();
            if !path.is_file() || !has_extension(&path, &self.extension) {
                continue;
            }

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::debug!(group = %group.name, path = %path.display(), "Skipping non-UTF-8 file name");
                continue;
            };

            match extract_run_id(pattern, file_name, custom.is_none()) {
                Some(run_id) => files.push(RunFile::new(run_id, path)),
                None => {
                    tracing::debug!(group = %group.name, file = file_name, "No run-id in file name, skipping");
                }
            }
        }

        if files.is_empty() {
            return Err(SplitError::discovery(
                &group.name,
                format!(
                    "no .{} files with a run-id in {}",
                    self.extension,
                    group.dir.display()
                ),
            ));
        }

        sort_and_check_unique(&group.name, &mut files)?;
        tracing::info!(group = %group.name, files = files.len(), "Discovered run files");
        Ok(files)
    }
}

/// Discover the files of every group.
///
/// The result is keyed by group name in declaration order, regardless of the
/// order in which listings complete. The first failing group aborts the run.
pub fn discover_all<'a, D, I>(
    discovery: &D,
    groups: I,
    mut on_group: impl FnMut(&InputGroup),
) -> Result<IndexMap<String, Vec<RunFile>>>
where
    D: FileDiscovery + ?Sized,
    I: IntoIterator<Item = &'a InputGroup>,
{
    let mut files_by_group = IndexMap::new();
    for group in groups {
        on_group(group);
        let files = discovery.discover(group)?;
        files_by_group.insert(group.name.clone(), files);
    }
    Ok(files_by_group)
}

/// Extract a run-id from a file name.
///
/// With the default pattern only the file stem is searched, so digits in the
/// extension (`.h5`) are never taken for a run-id. A custom pattern is
/// matched against the full file name.
///
/// # Examples
/// ```
/// use datasplit::discovery::run_id_from_file_name;
///
/// assert_eq!(run_id_from_file_name("elec-CC_3-100GeV_1234.h5"), Some(1234));
/// assert_eq!(run_id_from_file_name("muon.42.h5"), Some(42));
/// assert_eq!(run_id_from_file_name("summary.h5"), None);
/// ```
#[must_use]
pub fn run_id_from_file_name(file_name: &str) -> Option<u64> {
    extract_run_id(&DEFAULT_RUN_ID_PATTERN, file_name, true)
}

fn extract_run_id(pattern: &Regex, file_name: &str, stem_only: bool) -> Option<u64> {
    let haystack = if stem_only {
        Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
    } else {
        file_name
    };
    pattern
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Sort by run-id and reject duplicates within the group.
fn sort_and_check_unique(group: &str, files: &mut [RunFile]) -> Result<()> {
    files.sort_by(|a, b| a.run_id.cmp(&b.run_id).then_with(|| a.path.cmp(&b.path)));

    let mut seen: HashMap<u64, &Path> = HashMap::with_capacity(files.len());
    for file in files.iter() {
        if let Some(previous) = seen.insert(file.run_id, &file.path) {
            return Err(SplitError::discovery(
                group,
                format!(
                    "run-id {} appears in both {} and {}",
                    file.run_id,
                    previous.display(),
                    file.path.display()
                ),
            ));
        }
    }
    Ok(())
}
