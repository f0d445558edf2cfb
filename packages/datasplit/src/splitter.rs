//! Split service that ties configuration, discovery, planning and output together.

use std::path::PathBuf;

use crate::config::SplitConfig;
use crate::discovery::{discover_all, DirectoryDiscovery, FileDiscovery};
use crate::error::Result;
use crate::output::{write_list_files, write_scripts, ScriptContext};
use crate::planner::{check_requests, SplitPlanner};
use crate::report::SplitReport;
use crate::types::{InputGroup, SplitPlan};

/// A computed plan together with its count report.
#[derive(Debug, Clone)]
pub struct PlannedSplit {
    pub plan: SplitPlan,
    pub report: SplitReport,
}

/// Files written by a run.
#[derive(Debug, Clone, Default)]
pub struct WrittenOutput {
    pub list_files: Vec<PathBuf>,
    pub scripts: Vec<PathBuf>,
}

/// Outcome of [`run`]. `written` is `None` for a dry run.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub planned: PlannedSplit,
    pub written: Option<WrittenOutput>,
}

/// Discover the files of every group and compute the split plan.
///
/// `on_group` is called before each group's directory is listed.
pub fn plan_config<D>(
    config: &SplitConfig,
    discovery: &D,
    on_group: impl FnMut(&InputGroup),
) -> Result<PlannedSplit>
where
    D: FileDiscovery + ?Sized,
{
    config.validate_directories()?;

    let groups: Vec<&InputGroup> = config.groups.values().collect();
    // Fail on inconsistent requests before touching any directory
    check_requests(&groups, &config.requests)?;

    for group in groups.iter().filter(|g| g.ranges().next().is_none()) {
        tracing::warn!(group = %group.name, "Group declares no run-id ranges");
    }

    let files_by_group = discover_all(discovery, groups.iter().copied(), on_group)?;

    let plan = SplitPlanner::new(config.bucket_fill)
        .with_require_non_empty(config.require_non_empty)
        .plan(&groups, &files_by_group, &config.requests)?;
    let report = SplitReport::new(&groups, &files_by_group, &plan);

    Ok(PlannedSplit { plan, report })
}

/// Write list files, and scripts when enabled, for a computed plan.
pub fn write_outputs(config: &SplitConfig, plan: &SplitPlan) -> Result<WrittenOutput> {
    let list_files = write_list_files(plan, &config.output_file_folder, &config.output_file_name)?;

    let scripts = if config.make_scripts {
        let ctx = ScriptContext {
            output_folder: &config.output_file_folder,
            output_file_name: &config.output_file_name,
            tools: &config.tools,
        };
        write_scripts(&ctx, plan)?
    } else {
        Vec::new()
    };

    Ok(WrittenOutput {
        list_files,
        scripts,
    })
}

/// Run a complete split with filesystem discovery.
///
/// With `print_only` set the plan is computed but nothing is written.
pub fn run(config: &SplitConfig) -> Result<SplitOutcome> {
    let discovery = DirectoryDiscovery::new(&config.file_extension);
    let planned = plan_config(config, &discovery, |_| {})?;

    if config.print_only {
        return Ok(SplitOutcome {
            planned,
            written: None,
        });
    }

    let written = write_outputs(config, &planned.plan)?;
    Ok(SplitOutcome {
        planned,
        written: Some(written),
    })
}
