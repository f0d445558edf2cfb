//! File-count report of a split plan.
//!
//! The report is derived from the same [`SplitPlan`] a real run writes, so a
//! dry run (`print_only`) shows exactly the counts the list files would hold.

use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;

use crate::types::{InputGroup, RunFile, SplitKind, SplitPlan};

/// Counts for one input group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub name: String,

    /// Files discovered in the group directory.
    pub discovered: usize,

    /// Files selected per split kind, only for kinds with a declared range.
    pub selected: IndexMap<SplitKind, usize>,
}

/// Counts for one split kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    pub split: SplitKind,
    pub files: usize,
    pub bucket_sizes: Vec<usize>,

    /// Fraction of all selected files that went into this split.
    pub share: f64,
}

/// Per-group and per-split file counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitReport {
    pub groups: Vec<GroupReport>,
    pub splits: Vec<SplitSummary>,
    pub total_files: usize,
}

impl SplitReport {
    /// Build the report for a plan.
    #[must_use]
    pub fn new(
        groups: &[&InputGroup],
        files_by_group: &IndexMap<String, Vec<RunFile>>,
        plan: &SplitPlan,
    ) -> Self {
        let group_reports = groups
            .iter()
            .map(|group| {
                let selected = plan
                    .splits
                    .iter()
                    .filter_map(|(kind, output)| {
                        output
                            .selections
                            .iter()
                            .find(|s| s.group == group.name)
                            .map(|s| (*kind, s.count))
                    })
                    .collect();
                GroupReport {
                    name: group.name.clone(),
                    discovered: files_by_group.get(&group.name).map_or(0, Vec::len),
                    selected,
                }
            })
            .collect();

        let total_files = plan.file_count();
        let splits = plan
            .splits
            .iter()
            .map(|(kind, output)| {
                let files = output.file_count();
                SplitSummary {
                    split: *kind,
                    files,
                    bucket_sizes: output.buckets.iter().map(|b| b.len()).collect(),
                    share: if total_files == 0 {
                        0.0
                    } else {
                        files as f64 / total_files as f64
                    },
                }
            })
            .collect();

        Self {
            groups: group_reports,
            splits,
            total_files,
        }
    }

    /// Number of files planned for a split kind.
    #[must_use]
    pub fn files(&self, kind: SplitKind) -> usize {
        self.splits
            .iter()
            .find(|s| s.split == kind)
            .map_or(0, |s| s.files)
    }

    /// Render the report as plain text.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let name_width = self
            .groups
            .iter()
            .map(|g| g.name.len())
            .max()
            .unwrap_or(0);

        out.push_str("Input groups:\n");
        for group in &self.groups {
            let _ = write!(
                out,
                "  {:<name_width$}  {:>6} discovered",
                group.name, group.discovered
            );
            for (kind, count) in &group.selected {
                let _ = write!(out, "  {kind}: {count}");
            }
            out.push('\n');
        }

        out.push_str("Splits:\n");
        for split in &self.splits {
            let _ = write!(
                out,
                "  {:<8}  {:>6} files  {:>5.1}%  {} list files",
                split.split.as_str(),
                split.files,
                split.share * 100.0,
                split.bucket_sizes.len()
            );
            if let (Some(min), Some(max)) = (
                split.bucket_sizes.iter().min(),
                split.bucket_sizes.iter().max(),
            ) {
                if min == max {
                    let _ = write!(out, " of {min} files");
                } else {
                    let _ = write!(out, " of {min}-{max} files");
                }
            }
            out.push('\n');
        }
        let _ = writeln!(out, "Total: {} files", self.total_files);
        out
    }
}
