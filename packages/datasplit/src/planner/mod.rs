//! Run-id split planning.
//!
//! Selects the run files of every input group that fall into the declared
//! run-id ranges, pools them per split kind (group declaration order, then
//! ascending run-id) and distributes each pool over the requested number of
//! buckets.

mod engine;
mod strategy;

pub use engine::{check_requests, SplitPlanner};
pub use strategy::{BucketStrategy, ContiguousChunks, RoundRobin};

use indexmap::IndexMap;

use crate::error::Result;
use crate::types::{InputGroup, RunFile, SplitPlan, SplitRequest};

/// Plan with contiguous chunking and empty splits allowed.
pub fn plan(
    groups: &[&InputGroup],
    files_by_group: &IndexMap<String, Vec<RunFile>>,
    requests: &SplitRequest,
) -> Result<SplitPlan> {
    SplitPlanner::new(ContiguousChunks).plan(groups, files_by_group, requests)
}
