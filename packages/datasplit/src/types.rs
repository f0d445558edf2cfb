//! Core data types for the split planner.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Named partition of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    /// Files used for training.
    Train,

    /// Files used for validation.
    Validate,

    /// Everything set aside for later use.
    Rest,
}

impl SplitKind {
    /// All split kinds in output order.
    pub const ALL: [SplitKind; 3] = [Self::Train, Self::Validate, Self::Rest];

    /// Name used in configuration keys and output file names.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Validate => "validate",
            Self::Rest => "rest",
        }
    }

    /// Configuration key holding the run-id range of a group.
    #[must_use]
    pub fn range_key(&self) -> &'static str {
        match self {
            Self::Train => "run_ids_train",
            Self::Validate => "run_ids_validate",
            Self::Rest => "run_ids_rest",
        }
    }

    /// Configuration key holding the requested bucket count.
    #[must_use]
    pub fn count_key(&self) -> &'static str {
        match self {
            Self::Train => "n_files_train",
            Self::Validate => "n_files_validate",
            Self::Rest => "n_files_rest",
        }
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range of run-ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunIdRange {
    pub start: u64,
    pub end: u64,
}

impl RunIdRange {
    /// Create a range, returning `None` when `start > end`.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Check whether a run-id lies within the range (bounds included).
    #[must_use]
    pub fn contains(&self, run_id: u64) -> bool {
        self.start <= run_id && run_id <= self.end
    }

    /// Check whether two ranges share at least one run-id.
    #[must_use]
    pub fn overlaps(&self, other: &RunIdRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for RunIdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Named collection of data files sharing a directory and run-id scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct InputGroup {
    /// Unique group name (the TOML table name).
    pub name: String,

    /// Directory holding the group's files.
    pub dir: PathBuf,

    /// Declared range for the train split.
    pub train: Option<RunIdRange>,

    /// Declared range for the validate split.
    pub validate: Option<RunIdRange>,

    /// Declared range for the rest split.
    pub rest: Option<RunIdRange>,

    /// Regex with one capture group that extracts the run-id from a file name.
    pub run_id_pattern: Option<String>,
}

impl InputGroup {
    /// Create a group without any declared ranges.
    #[must_use]
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            train: None,
            validate: None,
            rest: None,
            run_id_pattern: None,
        }
    }

    /// Set the range for a split kind.
    #[must_use]
    pub fn with_range(mut self, kind: SplitKind, range: RunIdRange) -> Self {
        *self.range_slot(kind) = Some(range);
        self
    }

    /// Set the run-id extraction pattern.
    #[must_use]
    pub fn with_run_id_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.run_id_pattern = Some(pattern.into());
        self
    }

    /// Declared range for a split kind, if any.
    #[must_use]
    pub fn range(&self, kind: SplitKind) -> Option<RunIdRange> {
        match kind {
            SplitKind::Train => self.train,
            SplitKind::Validate => self.validate,
            SplitKind::Rest => self.rest,
        }
    }

    /// Iterate over the declared `(kind, range)` pairs in split order.
    pub fn ranges(&self) -> impl Iterator<Item = (SplitKind, RunIdRange)> + '_ {
        SplitKind::ALL
            .into_iter()
            .filter_map(|kind| self.range(kind).map(|range| (kind, range)))
    }

    fn range_slot(&mut self, kind: SplitKind) -> &mut Option<RunIdRange> {
        match kind {
            SplitKind::Train => &mut self.train,
            SplitKind::Validate => &mut self.validate,
            SplitKind::Rest => &mut self.rest,
        }
    }
}

/// A discovered data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFile {
    /// Run-id parsed from the file name.
    pub run_id: u64,

    /// Full path of the file.
    pub path: PathBuf,
}

impl RunFile {
    #[must_use]
    pub fn new(run_id: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            run_id,
            path: path.into(),
        }
    }
}

/// Requested number of output buckets per split kind.
///
/// A missing entry means the split is skipped entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitRequest {
    pub train: Option<usize>,
    pub validate: Option<usize>,
    pub rest: Option<usize>,
}

impl SplitRequest {
    /// Requested bucket count for a split kind.
    #[must_use]
    pub fn count(&self, kind: SplitKind) -> Option<usize> {
        match kind {
            SplitKind::Train => self.train,
            SplitKind::Validate => self.validate,
            SplitKind::Rest => self.rest,
        }
    }

    /// Set the bucket count for a split kind.
    #[must_use]
    pub fn with_count(mut self, kind: SplitKind, count: usize) -> Self {
        match kind {
            SplitKind::Train => self.train = Some(count),
            SplitKind::Validate => self.validate = Some(count),
            SplitKind::Rest => self.rest = Some(count),
        }
        self
    }
}

/// One output file list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    /// Paths in output order.
    pub files: Vec<PathBuf>,
}

impl Bucket {
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Render the bucket as list-file content: one path per line.
    #[must_use]
    pub fn to_list_content(&self) -> String {
        let mut content = String::new();
        for path in &self.files {
            content.push_str(&path.to_string_lossy());
            content.push('\n');
        }
        content
    }
}

/// Files selected from a single group for a single split kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSelection {
    pub group: String,
    pub range: RunIdRange,
    pub count: usize,
}

/// The planned buckets of one split kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutput {
    /// Per-group selection counts in declaration order.
    pub selections: Vec<GroupSelection>,

    /// Output buckets, index = bucket number.
    pub buckets: Vec<Bucket>,
}

impl SplitOutput {
    /// Total number of files over all buckets.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    /// Iterate over every planned path in bucket order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.buckets
            .iter()
            .flat_map(|b| b.files.iter().map(PathBuf::as_path))
    }
}

/// Result of planning: one entry per split kind that produced output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitPlan {
    pub splits: IndexMap<SplitKind, SplitOutput>,
}

impl SplitPlan {
    /// Planned output for a split kind.
    #[must_use]
    pub fn get(&self, kind: SplitKind) -> Option<&SplitOutput> {
        self.splits.get(&kind)
    }

    /// Total number of files planned over all split kinds.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.splits.values().map(SplitOutput::file_count).sum()
    }
}
