//! datasplit - Split run-indexed data files into train/validate/rest lists.
//!
//! Input groups name a directory of data files whose names carry a run-id.
//! Each group declares inclusive run-id ranges for the train, validate and
//! rest splits. The planner selects the matching files, pools them per split
//! and distributes every pool over the requested number of list files.
//!
//! # Example
//!
//! ```
//! use datasplit::planner::plan;
//! use datasplit::types::{InputGroup, RunFile, RunIdRange, SplitKind, SplitRequest};
//! use indexmap::IndexMap;
//!
//! let group = InputGroup::new("elec_cc", "/data/elec")
//!     .with_range(SplitKind::Train, RunIdRange::new(1, 5).unwrap());
//! let mut files = IndexMap::new();
//! files.insert(
//!     "elec_cc".to_string(),
//!     (1..=5).map(|id| RunFile::new(id, format!("/data/elec/run_{id}.h5"))).collect(),
//! );
//! let requests = SplitRequest::default().with_count(SplitKind::Train, 2);
//!
//! let plan = plan(&[&group], &files, &requests).unwrap();
//! let sizes: Vec<_> = plan.get(SplitKind::Train).unwrap().buckets.iter().map(|b| b.len()).collect();
//! assert_eq!(sizes, vec![3, 2]);
//! ```
//!
//! # Architecture
//!
//! - [`config`]: TOML configuration loading and validation
//! - [`types`]: Core data types (InputGroup, RunFile, SplitPlan, etc.)
//! - [`error`]: Error types and Result alias
//! - [`discovery`]: Run file discovery and run-id extraction
//! - [`planner`]: Split planning and bucket fill strategies
//! - [`report`]: File-count report used for dry runs
//! - [`output`]: List files and tool scripts
//! - [`cli`]: Command-line interface
//! - [`splitter`]: Main split service

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod output;
pub mod planner;
pub mod report;
pub mod splitter;
pub mod types;

// Re-export main functions
pub use splitter::{plan_config, run, write_outputs};

// Re-export commonly used items
pub use config::SplitConfig;
pub use error::{Result, SplitError};
pub use types::{Bucket, InputGroup, RunFile, RunIdRange, SplitKind, SplitPlan, SplitRequest};
