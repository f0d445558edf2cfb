//! Configuration loading and validation.
//!
//! A configuration file is a TOML document with global settings at the top
//! level and one table per input group:
//!
//! ```toml
//! n_files_train = 5
//! n_files_validate = 1
//! output_file_folder = "/data/split"
//! output_file_name = "orca_2017"
//!
//! [elec_cc]
//! dir = "/data/elec-CC"
//! run_ids_train = [1001, 5000]
//! run_ids_validate = [1, 1000]
//! ```
//!
//! Every table-valued key is a group; all other keys are global settings.
//! Unknown keys are rejected on both levels.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplitError};
use crate::types::{InputGroup, RunIdRange, SplitKind, SplitRequest};

/// Default file extension of data files.
pub const DEFAULT_FILE_EXTENSION: &str = "h5";

/// Subdirectory of the output folder receiving list files.
pub const LIST_FILE_DIR: &str = "conc_list_files";

/// Subdirectory of the output folder receiving generated scripts.
pub const JOB_SCRIPT_DIR: &str = "job_scripts";

/// Subdirectory of the output folder that the generated scripts write data to.
pub const DATA_SPLIT_DIR: &str = "data_split";

/// Highest compression level accepted by the concatenate and shuffle tools.
pub const MAX_COMPLEVEL: u8 = 9;

/// How files of a pool are distributed over buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketFill {
    /// Bucket `i` receives the `i`-th contiguous chunk of the pool.
    #[default]
    Contiguous,

    /// File `j` of the pool goes to bucket `j % n`.
    RoundRobin,
}

/// Compression filter for the external tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complib {
    Gzip,
    Lzf,
}

impl Complib {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Lzf => "lzf",
        }
    }
}

/// Options passed through to the concatenate and shuffle tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOptions {
    pub venv_path: Option<PathBuf>,
    pub data_tools_folder: Option<PathBuf>,
    pub chunksize: Option<u64>,
    pub complib: Option<Complib>,
    pub complevel: Option<u8>,
    pub shuffle_delete: bool,
}

/// Fully validated split configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    /// Input groups in declaration order.
    pub groups: IndexMap<String, InputGroup>,

    /// Requested bucket counts.
    pub requests: SplitRequest,

    /// Base directory for all output.
    pub output_file_folder: PathBuf,

    /// Prefix of every list file.
    pub output_file_name: String,

    /// Only report counts, write nothing.
    pub print_only: bool,

    /// Treat a split kind that selects zero files as an error.
    pub require_non_empty: bool,

    pub bucket_fill: BucketFill,

    /// Extension (without dot) of the data files to discover.
    pub file_extension: String,

    /// Also write concatenate/shuffle scripts.
    pub make_scripts: bool,

    pub tools: ToolOptions,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    n_files_train: Option<usize>,
    n_files_validate: Option<usize>,
    n_files_rest: Option<usize>,
    output_file_folder: PathBuf,
    output_file_name: String,
    #[serde(default)]
    print_only: bool,
    #[serde(default)]
    require_non_empty: bool,
    #[serde(default)]
    bucket_fill: BucketFill,
    file_extension: Option<String>,
    #[serde(default)]
    make_scripts: bool,
    venv_path: Option<PathBuf>,
    data_tools_folder: Option<PathBuf>,
    chunksize: Option<u64>,
    complib: Option<Complib>,
    complevel: Option<u8>,
    #[serde(default)]
    shuffle_delete: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    dir: PathBuf,
    run_ids_train: Option<[u64; 2]>,
    run_ids_validate: Option<[u64; 2]>,
    run_ids_rest: Option<[u64; 2]>,
    run_id_pattern: Option<String>,
}

impl RawGroup {
    fn range(&self, kind: SplitKind) -> Option<[u64; 2]> {
        match kind {
            SplitKind::Train => self.run_ids_train,
            SplitKind::Validate => self.run_ids_validate,
            SplitKind::Rest => self.run_ids_rest,
        }
    }
}

impl SplitConfig {
    /// Load and validate a configuration file.
    ///
    /// Relative paths inside the file are resolved against the directory
    /// containing the file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SplitError::config(format!(
                "cannot read configuration file {}: {e}",
                path.display()
            ))
        })?;
        let base_dir = path.parent().unwrap_or(Path::new("."));
        Self::from_toml_str(&content, base_dir)
    }

    /// Parse and validate configuration text.
    ///
    /// Does not touch the filesystem; see [`SplitConfig::validate_directories`].
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let document: toml::Table = toml::from_str(content)?;

        let mut settings = toml::Table::new();
        let mut raw_groups: Vec<(String, toml::Value)> = Vec::new();
        for (key, value) in document {
            if value.is_table() {
                raw_groups.push((key, value));
            } else {
                settings.insert(key, value);
            }
        }

        let settings: RawSettings = toml::Value::Table(settings)
            .try_into()
            .map_err(|e| SplitError::config(format!("invalid top-level settings: {e}")))?;

        if raw_groups.is_empty() {
            return Err(SplitError::config(
                "no input groups defined; add at least one [group] table",
            ));
        }

        let mut groups = IndexMap::with_capacity(raw_groups.len());
        for (name, value) in raw_groups {
            let raw: RawGroup = value
                .try_into()
                .map_err(|e| SplitError::group_config(&name, e.to_string()))?;
            let group = build_group(&name, raw, base_dir)?;
            groups.insert(name, group);
        }

        let config = Self::from_settings(settings, groups, base_dir)?;
        config.validate()?;
        Ok(config)
    }

    fn from_settings(
        raw: RawSettings,
        groups: IndexMap<String, InputGroup>,
        base_dir: &Path,
    ) -> Result<Self> {
        let mut requests = SplitRequest::default();
        for (kind, count) in [
            (SplitKind::Train, raw.n_files_train),
            (SplitKind::Validate, raw.n_files_validate),
            (SplitKind::Rest, raw.n_files_rest),
        ] {
            if let Some(count) = count {
                requests = requests.with_count(kind, count);
            }
        }

        let file_extension = raw
            .file_extension
            .map(|ext| ext.trim_start_matches('.').to_string())
            .unwrap_or_else(|| DEFAULT_FILE_EXTENSION.to_string());

        Ok(Self {
            groups,
            requests,
            output_file_folder: resolve(base_dir, raw.output_file_folder),
            output_file_name: raw.output_file_name,
            print_only: raw.print_only,
            require_non_empty: raw.require_non_empty,
            bucket_fill: raw.bucket_fill,
            file_extension,
            make_scripts: raw.make_scripts,
            tools: ToolOptions {
                venv_path: raw.venv_path,
                data_tools_folder: raw.data_tools_folder,
                chunksize: raw.chunksize,
                complib: raw.complib,
                complevel: raw.complevel,
                shuffle_delete: raw.shuffle_delete,
            },
        })
    }

    /// Check settings and range consistency that need no filesystem access.
    pub fn validate(&self) -> Result<()> {
        validate_output_file_name(&self.output_file_name)?;

        if self.file_extension.is_empty() {
            return Err(SplitError::config("file_extension must not be empty"));
        }

        for kind in SplitKind::ALL {
            if self.requests.count(kind) == Some(0) {
                return Err(SplitError::split_config(
                    None,
                    kind,
                    format!(
                        "{} must be a positive integer; omit it to skip the split",
                        kind.count_key()
                    ),
                ));
            }
        }

        if self.tools.chunksize == Some(0) {
            return Err(SplitError::config("chunksize must be a positive integer"));
        }
        if let Some(level) = self.tools.complevel {
            if level > MAX_COMPLEVEL {
                return Err(SplitError::config(format!(
                    "complevel must be between 0 and {MAX_COMPLEVEL}, got {level}"
                )));
            }
            if self.tools.complib == Some(Complib::Lzf) {
                tracing::warn!(complevel = level, "complevel has no effect with lzf compression");
            }
        }

        for group in self.groups.values() {
            validate_group_ranges(group)?;
        }
        validate_shared_directories(self.groups.values())?;

        Ok(())
    }

    /// Check that every group directory exists and is a directory.
    ///
    /// Groups whose directories resolve to the same location are checked
    /// again for overlapping ranges after canonicalization.
    pub fn validate_directories(&self) -> Result<()> {
        let mut canonical = Vec::with_capacity(self.groups.len());
        for group in self.groups.values() {
            let dir = group.dir.canonicalize().map_err(|e| {
                let message = if e.kind() == std::io::ErrorKind::NotFound {
                    format!("directory does not exist: {}", group.dir.display())
                } else {
                    format!("cannot resolve directory {}: {e}", group.dir.display())
                };
                SplitError::group_config(&group.name, message)
            })?;
            if !dir.is_dir() {
                return Err(SplitError::group_config(
                    &group.name,
                    format!("path is not a directory: {}", group.dir.display()),
                ));
            }
            let mut resolved = group.clone();
            resolved.dir = dir;
            canonical.push(resolved);
        }
        validate_shared_directories(canonical.iter())
    }
}

fn build_group(name: &str, raw: RawGroup, base_dir: &Path) -> Result<InputGroup> {
    let dir = resolve(base_dir, raw.dir.clone());
    // List files carry paths as text
    if dir.to_str().is_none() {
        return Err(SplitError::group_config(
            name,
            format!("directory is not valid UTF-8: {}", dir.display()),
        ));
    }
    let mut group = InputGroup::new(name, dir);

    for kind in SplitKind::ALL {
        if let Some([start, end]) = raw.range(kind) {
            let range = RunIdRange::new(start, end).ok_or_else(|| {
                SplitError::split_config(
                    Some(name),
                    kind,
                    format!(
                        "{} = [{start}, {end}] has its start after its end",
                        kind.range_key()
                    ),
                )
            })?;
            group = group.with_range(kind, range);
        }
    }

    if let Some(pattern) = raw.run_id_pattern {
        validate_run_id_pattern(name, &pattern)?;
        group = group.with_run_id_pattern(pattern);
    }

    Ok(group)
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

/// Validate the list-file prefix.
///
/// # Examples
/// ```
/// use datasplit::config::validate_output_file_name;
///
/// assert!(validate_output_file_name("orca_2017").is_ok());
/// assert!(validate_output_file_name("").is_err());
/// assert!(validate_output_file_name("a/b").is_err());
/// ```
pub fn validate_output_file_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SplitError::config("output_file_name must not be empty"));
    }
    if name.contains(['/', '\\']) {
        return Err(SplitError::config(format!(
            "output_file_name must not contain path separators: '{name}'"
        )));
    }
    Ok(())
}

/// Check that a run-id pattern compiles and has exactly one capture group.
pub fn validate_run_id_pattern(group: &str, pattern: &str) -> Result<()> {
    let regex = Regex::new(pattern).map_err(|e| {
        SplitError::group_config(group, format!("invalid run_id_pattern '{pattern}': {e}"))
    })?;
    // captures_len counts the implicit whole-match group
    if regex.captures_len() != 2 {
        return Err(SplitError::group_config(
            group,
            format!(
                "run_id_pattern '{pattern}' must have exactly one capture group, found {}",
                regex.captures_len() - 1
            ),
        ));
    }
    Ok(())
}

/// Ranges of different split kinds within one group must be disjoint.
fn validate_group_ranges(group: &InputGroup) -> Result<()> {
    let ranges: Vec<_> = group.ranges().collect();
    for (i, (kind_a, range_a)) in ranges.iter().enumerate() {
        for (kind_b, range_b) in &ranges[i + 1..] {
            if range_a.overlaps(range_b) {
                return Err(SplitError::split_config(
                    Some(&group.name),
                    *kind_b,
                    format!(
                        "{} {range_b} overlaps {} {range_a}",
                        kind_b.range_key(),
                        kind_a.range_key()
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Groups reading the same directory must not claim the same run-id for the
/// same split kind, otherwise a file would be listed twice.
fn validate_shared_directories<'a>(groups: impl Iterator<Item = &'a InputGroup>) -> Result<()> {
    let groups: Vec<_> = groups.collect();
    for (i, a) in groups.iter().enumerate() {
        for b in &groups[i + 1..] {
            if a.dir != b.dir {
                continue;
            }
            for kind in SplitKind::ALL {
                if let (Some(range_a), Some(range_b)) = (a.range(kind), b.range(kind)) {
                    if range_a.overlaps(&range_b) {
                        return Err(SplitError::split_config(
                            Some(&b.name),
                            kind,
                            format!(
                                "{range_b} overlaps {range_a} of group '{}' reading the same directory {}",
                                a.name,
                                a.dir.display()
                            ),
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"
n_files_train = 2
n_files_validate = 1
output_file_folder = "/out"
output_file_name = "orca"

[elec_cc]
dir = "/data/elec"
run_ids_train = [1, 100]
run_ids_validate = [101, 120]

[muon_cc]
dir = "/data/muon"
run_ids_train = [1, 100]
"#;

    fn parse(content: &str) -> Result<SplitConfig> {
        SplitConfig::from_toml_str(content, Path::new("/cfg"))
    }

    #[test]
    fn test_parse_basic_config() {
        let config = parse(BASIC).unwrap();

        assert_eq!(config.requests.count(SplitKind::Train), Some(2));
        assert_eq!(config.requests.count(SplitKind::Validate), Some(1));
        assert_eq!(config.requests.count(SplitKind::Rest), None);
        assert_eq!(config.output_file_folder, PathBuf::from("/out"));
        assert_eq!(config.output_file_name, "orca");
        assert!(!config.print_only);
        assert_eq!(config.bucket_fill, BucketFill::Contiguous);
        assert_eq!(config.file_extension, "h5");

        let names: Vec<_> = config.groups.keys().cloned().collect();
        assert_eq!(names, vec!["elec_cc", "muon_cc"]);

        let elec = &config.groups["elec_cc"];
        assert_eq!(elec.train, RunIdRange::new(1, 100));
        assert_eq!(elec.validate, RunIdRange::new(101, 120));
        assert!(elec.rest.is_none());
    }

    #[test]
    fn test_groups_keep_declaration_order() {
        let config = parse(
            r#"
output_file_folder = "/out"
output_file_name = "x"
[zeta]
dir = "/z"
[alpha]
dir = "/a"
[mid]
dir = "/m"
"#,
        )
        .unwrap();
        let names: Vec<_> = config.groups.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_relative_paths_resolve_against_base_dir() {
        let config = parse(
            r#"
output_file_folder = "out"
output_file_name = "x"
[g]
dir = "data/g"
"#,
        )
        .unwrap();
        assert_eq!(config.output_file_folder, PathBuf::from("/cfg/out"));
        assert_eq!(config.groups["g"].dir, PathBuf::from("/cfg/data/g"));
    }

    #[test]
    fn test_tool_options() {
        let config = parse(
            r#"
output_file_folder = "/out"
output_file_name = "x"
make_scripts = true
chunksize = 32
complib = "gzip"
complevel = 1
shuffle_delete = true
venv_path = "/venv"
bucket_fill = "round_robin"
file_extension = ".hdf5"
[g]
dir = "/g"
"#,
        )
        .unwrap();
        assert!(config.make_scripts);
        assert_eq!(config.tools.chunksize, Some(32));
        assert_eq!(config.tools.complib, Some(Complib::Gzip));
        assert_eq!(config.tools.complevel, Some(1));
        assert!(config.tools.shuffle_delete);
        assert_eq!(config.tools.venv_path, Some(PathBuf::from("/venv")));
        assert_eq!(config.bucket_fill, BucketFill::RoundRobin);
        assert_eq!(config.file_extension, "hdf5");
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let err = parse(
            r#"
output_file_folder = "/out"
output_file_name = "x"
n_file_train = 3
[g]
dir = "/g"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, SplitError::Configuration { .. }));
        assert!(err.to_string().contains("n_file_train"));
    }

    #[test]
    fn test_unknown_group_key_names_group() {
        let err = parse(
            r#"
output_file_folder = "/out"
output_file_name = "x"
[elec_cc]
dir = "/g"
run_ids_test = [1, 2]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("elec_cc"));
        assert!(err.to_string().contains("run_ids_test"));
    }

    #[test]
    fn test_missing_required_setting() {
        let err = parse(
            r#"
output_file_name = "x"
[g]
dir = "/g"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("output_file_folder"));
    }

    #[test]
    fn test_no_groups_rejected() {
        let err = parse(
            r#"
output_file_folder = "/out"
output_file_name = "x"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no input groups"));
    }

    #[test]
    fn test_zero_count_rejected() {
        let err = parse(
            r#"
n_files_rest = 0
output_file_folder = "/out"
output_file_name = "x"
[g]
dir = "/g"
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SplitError::Configuration {
                split: Some(SplitKind::Rest),
                ..
            }
        ));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = parse(
            r#"
output_file_folder = "/out"
output_file_name = "x"
[g]
dir = "/g"
run_ids_train = [10, 1]
"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error in group 'g' (train): run_ids_train = [10, 1] has its start after its end"
        );
    }

    #[test]
    fn test_overlapping_ranges_within_group_rejected() {
        let err = parse(
            r#"
output_file_folder = "/out"
output_file_name = "x"
[g]
dir = "/g"
run_ids_train = [1, 10]
run_ids_validate = [10, 20]
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SplitError::Configuration {
                split: Some(SplitKind::Validate),
                ..
            }
        ));
        assert!(err.to_string().contains("'g'"));
    }

    #[test]
    fn test_overlapping_ranges_in_shared_directory_rejected() {
        let err = parse(
            r#"
output_file_folder = "/out"
output_file_name = "x"
[first]
dir = "/data"
run_ids_train = [1, 10]
[second]
dir = "/data"
run_ids_train = [5, 20]
"#,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'second'"));
        assert!(message.contains("'first'"));
        assert!(message.contains("(train)"));
    }

    #[test]
    fn test_disjoint_ranges_in_shared_directory_accepted() {
        let config = parse(
            r#"
output_file_folder = "/out"
output_file_name = "x"
[first]
dir = "/data"
run_ids_train = [1, 10]
[second]
dir = "/data"
run_ids_train = [11, 20]
"#,
        );
        assert!(config.is_ok());
    }

    #[test]
    fn test_overlapping_ranges_in_separate_directories_accepted() {
        // Each group numbers its own runs, so equal run-ids name different files
        let config = parse(
            r#"
output_file_folder = "/out"
output_file_name = "x"
[elec]
dir = "/data/elec"
run_ids_train = [1, 10]
[muon]
dir = "/data/muon"
run_ids_train = [5, 20]
"#,
        );
        assert!(config.is_ok());
    }

    #[test]
    fn test_invalid_run_id_pattern() {
        assert!(validate_run_id_pattern("g", r"_(\d+)\.h5$").is_ok());
        assert!(validate_run_id_pattern("g", r"\d+").is_err());
        assert!(validate_run_id_pattern("g", r"(\d+)_(\d+)").is_err());
        assert!(validate_run_id_pattern("g", r"(\d+").is_err());
    }

    #[test]
    fn test_complevel_out_of_range() {
        let err = parse(
            r#"
output_file_folder = "/out"
output_file_name = "x"
complevel = 12
[g]
dir = "/g"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("complevel"));
    }

    #[test]
    fn test_unknown_complib_rejected() {
        let result = parse(
            r#"
output_file_folder = "/out"
output_file_name = "x"
complib = "zstd"
[g]
dir = "/g"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_directories_missing_dir() {
        let config = parse(BASIC).unwrap();
        let err = config.validate_directories().unwrap_err();
        assert!(matches!(err, SplitError::Configuration { .. }));
        assert!(err.to_string().contains("elec_cc"));
        assert!(err.to_string().contains("directory does not exist"));
    }

    #[test]
    fn test_validate_directories_unresolvable_dir_names_group() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("notes.txt"), "").unwrap();
        let config = SplitConfig::from_toml_str(
            r#"
output_file_folder = "out"
output_file_name = "orca"
[elec_cc]
dir = "notes.txt/runs"
"#,
            root.path(),
        )
        .unwrap();

        let err = config.validate_directories().unwrap_err();
        assert!(
            matches!(err, SplitError::Configuration { group: Some(ref g), .. } if g == "elec_cc"),
            "{err}"
        );
    }

    #[test]
    fn test_validate_directories_file_is_not_a_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("runs"), "").unwrap();
        let config = SplitConfig::from_toml_str(
            r#"
output_file_folder = "out"
output_file_name = "orca"
[elec_cc]
dir = "runs"
"#,
            root.path(),
        )
        .unwrap();

        let err = config.validate_directories().unwrap_err();
        assert!(err.to_string().contains("group 'elec_cc'"), "{err}");
        assert!(err.to_string().contains("not a directory"), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_group_directory_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let base = Path::new(OsStr::from_bytes(b"/data/\xffruns"));
        let err = SplitConfig::from_toml_str(
            r#"
output_file_folder = "/out"
output_file_name = "orca"
[elec_cc]
dir = "elec"
"#,
            base,
        )
        .unwrap_err();
        assert!(
            matches!(err, SplitError::Configuration { group: Some(ref g), .. } if g == "elec_cc"),
            "{err}"
        );
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SplitConfig::load(Path::new("/nonexistent/datasplit.toml")).unwrap_err();
        assert!(err.to_string().contains("cannot read configuration file"));
    }
}
