//! Split planner that turns discovered run files into output buckets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use super::strategy::BucketStrategy;
use crate::error::{Result, SplitError};
use crate::types::{
    GroupSelection, InputGroup, RunFile, SplitKind, SplitOutput, SplitPlan, SplitRequest,
};

/// Planner for distributing run files over split buckets.
///
/// Planning is a pure computation: nothing is read from or written to disk.
pub struct SplitPlanner<S: BucketStrategy> {
    strategy: S,
    require_non_empty: bool,
}

impl<S: BucketStrategy> SplitPlanner<S> {
    /// Create a new planner.
    #[must_use]
    pub fn new(strategy: S) -> Self {
        Self {
            strategy,
            require_non_empty: false,
        }
    }

    /// Treat a requested split that selects zero files as an error.
    #[must_use]
    pub fn with_require_non_empty(mut self, require: bool) -> Self {
        self.require_non_empty = require;
        self
    }

    /// Compute the split plan.
    ///
    /// `groups` are taken in declaration order; `files_by_group` must hold the
    /// discovered files of every group that declares at least one range.
    pub fn plan(
        &self,
        groups: &[&InputGroup],
        files_by_group: &IndexMap<String, Vec<RunFile>>,
        requests: &SplitRequest,
    ) -> Result<SplitPlan> {
        check_requests(groups, requests)?;

        let mut plan = SplitPlan::default();
        for kind in SplitKind::ALL {
            let Some((selections, pool)) = self.select(kind, groups, files_by_group)? else {
                continue;
            };

            let Some(n_buckets) = requests.count(kind) else {
                if pool.is_empty() {
                    tracing::debug!(split = %kind, "Split not requested and no files selected");
                    continue;
                }
                return Err(SplitError::split_config(
                    None,
                    kind,
                    format!(
                        "{} files fall into declared {} ranges but {} is not set",
                        pool.len(),
                        kind.range_key(),
                        kind.count_key()
                    ),
                ));
            };

            if pool.is_empty() {
                if self.require_non_empty {
                    return Err(SplitError::split_config(
                        None,
                        kind,
                        format!(
                            "no files fall into the declared {} ranges and require_non_empty is set",
                            kind.range_key()
                        ),
                    ));
                }
                tracing::warn!(split = %kind, "No files selected, no list files will be written");
                plan.splits.insert(
                    kind,
                    SplitOutput {
                        selections,
                        buckets: Vec::new(),
                    },
                );
                continue;
            }

            if n_buckets > pool.len() {
                tracing::warn!(
                    split = %kind,
                    files = pool.len(),
                    buckets = n_buckets,
                    "More buckets requested than files selected, some list files will be empty"
                );
            }

            tracing::info!(split = %kind, files = pool.len(), buckets = n_buckets, "Planned split");
            let buckets = self.strategy.distribute(pool, n_buckets);
            plan.splits.insert(
                kind,
                SplitOutput {
                    selections,
                    buckets,
                },
            );
        }

        Ok(plan)
    }

    /// Select the files of every group for one split kind.
    ///
    /// Returns `None` when no group declares a range for the kind. The pool
    /// is ordered by group declaration order, then ascending run-id.
    fn select(
        &self,
        kind: SplitKind,
        groups: &[&InputGroup],
        files_by_group: &IndexMap<String, Vec<RunFile>>,
    ) -> Result<Option<(Vec<GroupSelection>, Vec<PathBuf>)>> {
        let mut selections = Vec::new();
        let mut pool: Vec<PathBuf> = Vec::new();
        let mut owners: HashMap<PathBuf, &str> = HashMap::new();

        for group in groups {
            let Some(range) = group.range(kind) else {
                continue;
            };
            let files = files_by_group.get(&group.name).ok_or_else(|| {
                SplitError::discovery(&group.name, "no file listing available for group")
            })?;

            let mut selected: Vec<&RunFile> =
                files.iter().filter(|f| range.contains(f.run_id)).collect();
            selected.sort_by_key(|f| f.run_id);

            for file in &selected {
                if let Some(owner) = owners.insert(file.path.clone(), &group.name) {
                    return Err(duplicate_path_error(&group.name, owner, kind, &file.path));
                }
            }

            tracing::debug!(
                group = %group.name,
                split = %kind,
                range = %range,
                files = selected.len(),
                "Selected run files"
            );
            selections.push(GroupSelection {
                group: group.name.clone(),
                range,
                count: selected.len(),
            });
            pool.extend(selected.into_iter().map(|f| f.path.clone()));
        }

        if selections.is_empty() {
            return Ok(None);
        }
        Ok(Some((selections, pool)))
    }
}

/// Every requested split needs at least one group declaring a range for it.
pub fn check_requests(groups: &[&InputGroup], requests: &SplitRequest) -> Result<()> {
    for kind in SplitKind::ALL {
        let Some(count) = requests.count(kind) else {
            continue;
        };
        if count == 0 {
            return Err(SplitError::split_config(
                None,
                kind,
                format!("{} must be a positive integer", kind.count_key()),
            ));
        }
        if !groups.iter().any(|g| g.range(kind).is_some()) {
            return Err(SplitError::split_config(
                None,
                kind,
                format!(
                    "{} = {count} is set but no group declares {}",
                    kind.count_key(),
                    kind.range_key()
                ),
            ));
        }
    }
    Ok(())
}

fn duplicate_path_error(group: &str, owner: &str, kind: SplitKind, path: &Path) -> SplitError {
    let message = if owner == group {
        format!("{} is listed twice", path.display())
    } else {
        format!(
            "{} is already selected by group '{owner}'; ranges of groups sharing a directory must not overlap",
            path.display()
        )
    };
    SplitError::split_config(Some(group), kind, message)
}
