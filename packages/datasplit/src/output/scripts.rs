//! Concatenate and shuffle scripts for the external data tools.
//!
//! For every planned split two shell scripts are written: one concatenating
//! each bucket's list into a single `.h5` file, one shuffling those files.
//! The scripts are only generated, never executed.

use std::path::{Path, PathBuf};

use super::{list_file_path, write_atomic};
use crate::config::{ToolOptions, DATA_SPLIT_DIR, JOB_SCRIPT_DIR};
use crate::error::Result;
use crate::types::{SplitKind, SplitOutput, SplitPlan};

const CONCATENATE_TOOL: &str = "concatenate_h5.py";
const SHUFFLE_TOOL: &str = "shuffle_h5.py";

/// Output locations shared by every script of a run.
#[derive(Debug, Clone, Copy)]
pub struct ScriptContext<'a> {
    pub output_folder: &'a Path,
    pub output_file_name: &'a str,
    pub tools: &'a ToolOptions,
}

impl ScriptContext<'_> {
    /// Path of the concatenated data file of a bucket.
    #[must_use]
    pub fn data_file_path(&self, kind: SplitKind, index: usize) -> PathBuf {
        self.output_folder
            .join(DATA_SPLIT_DIR)
            .join(format!("{}_{kind}_{index}.h5", self.output_file_name))
    }

    fn tool(&self, name: &str) -> String {
        match &self.tools.data_tools_folder {
            Some(folder) => shell_quote(&folder.join(name).to_string_lossy()),
            None => name.to_string(),
        }
    }

    fn preamble(&self) -> String {
        let mut script = String::from("#!/usr/bin/env bash\nset -euo pipefail\n\n");
        if let Some(venv) = &self.tools.venv_path {
            script.push_str(&format!(
                "source {}\n\n",
                shell_quote(&venv.join("bin").join("activate").to_string_lossy())
            ));
        }
        script
    }

    fn storage_options(&self) -> String {
        let mut options = String::new();
        if let Some(chunksize) = self.tools.chunksize {
            options.push_str(&format!(" --chunksize {chunksize}"));
        }
        if let Some(complib) = self.tools.complib {
            options.push_str(&format!(" --complib {}", complib.as_str()));
        }
        if let Some(complevel) = self.tools.complevel {
            options.push_str(&format!(" --complevel {complevel}"));
        }
        options
    }
}

/// Render the concatenate script of one split.
#[must_use]
pub fn render_concatenate_script(
    ctx: &ScriptContext<'_>,
    kind: SplitKind,
    output: &SplitOutput,
) -> String {
    let mut script = ctx.preamble();
    let tool = ctx.tool(CONCATENATE_TOOL);
    let options = ctx.storage_options();
    script.push_str(&format!(
        "mkdir -p {}\n\n",
        shell_quote(&ctx.output_folder.join(DATA_SPLIT_DIR).to_string_lossy())
    ));
    for index in non_empty_buckets(output) {
        let list = list_file_path(ctx.output_folder, ctx.output_file_name, kind, index);
        let data = ctx.data_file_path(kind, index);
        script.push_str(&format!(
            "python {tool}{options} --list {} {}\n",
            shell_quote(&list.to_string_lossy()),
            shell_quote(&data.to_string_lossy())
        ));
    }
    script
}

/// Render the shuffle script of one split.
#[must_use]
pub fn render_shuffle_script(
    ctx: &ScriptContext<'_>,
    kind: SplitKind,
    output: &SplitOutput,
) -> String {
    let mut script = ctx.preamble();
    let tool = ctx.tool(SHUFFLE_TOOL);
    let delete = if ctx.tools.shuffle_delete { " --delete" } else { "" };
    let options = ctx.storage_options();
    for index in non_empty_buckets(output) {
        let data = ctx.data_file_path(kind, index);
        script.push_str(&format!(
            "python {tool}{delete}{options} {}\n",
            shell_quote(&data.to_string_lossy())
        ));
    }
    script
}

/// Indices of the buckets that hold at least one file.
///
/// The tools cannot concatenate an empty list, so empty buckets get no call.
fn non_empty_buckets(output: &SplitOutput) -> impl Iterator<Item = usize> + '_ {
    output
        .buckets
        .iter()
        .enumerate()
        .filter(|(_, bucket)| !bucket.is_empty())
        .map(|(index, _)| index)
}

fn script_names(kind: SplitKind) -> [String; 2] {
    [
        format!("concatenate_h5_{kind}.sh"),
        format!("shuffle_h5_{kind}.sh"),
    ]
}

/// Write the concatenate and shuffle scripts of every split with files.
///
/// Scripts of an earlier run for splits without files are removed.
pub fn write_scripts(ctx: &ScriptContext<'_>, plan: &SplitPlan) -> Result<Vec<PathBuf>> {
    let dir = ctx.output_folder.join(JOB_SCRIPT_DIR);
    let mut written = Vec::new();

    for kind in SplitKind::ALL {
        let Some(output) = plan.get(kind).filter(|o| o.file_count() > 0) else {
            for name in script_names(kind) {
                let path = dir.join(name);
                if path.is_file() {
                    std::fs::remove_file(&path)?;
                    tracing::debug!(split = %kind, path = %path.display(), "Removed stale script");
                }
            }
            continue;
        };

        let empty = output.buckets.iter().filter(|b| b.is_empty()).count();
        if empty > 0 {
            tracing::warn!(split = %kind, buckets = empty, "Empty buckets left out of the scripts");
        }

        let [concatenate, shuffle] = script_names(kind);
        let scripts = [
            (concatenate, render_concatenate_script(ctx, kind, output)),
            (shuffle, render_shuffle_script(ctx, kind, output)),
        ];
        for (name, content) in scripts {
            let path = dir.join(name);
            write_atomic(&path, &content)?;
            make_executable(&path)?;
            tracing::info!(split = %kind, path = %path.display(), "Wrote script");
            written.push(path);
        }
    }

    Ok(written)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Quote a string for POSIX shells when it contains special characters.
///
/// # Examples
/// ```
/// use datasplit::output::shell_quote;
///
/// assert_eq!(shell_quote("/data/run_1.h5"), "/data/run_1.h5");
/// assert_eq!(shell_quote("/my data/it's.h5"), r"'/my data/it'\''s.h5'");
/// ```
#[must_use]
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ':' | '='));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Complib;
    use crate::types::Bucket;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn bucket(n_files: usize) -> Bucket {
        Bucket {
            files: (0..n_files)
                .map(|i| PathBuf::from(format!("/d/run_{i}.h5")))
                .collect(),
        }
    }

    fn output(n_buckets: usize) -> SplitOutput {
        SplitOutput {
            selections: Vec::new(),
            buckets: vec![bucket(1); n_buckets],
        }
    }

    #[test]
    fn test_concatenate_script_minimal() {
        let tools = ToolOptions::default();
        let ctx = ScriptContext {
            output_folder: Path::new("/out"),
            output_file_name: "orca",
            tools: &tools,
        };

        let script = render_concatenate_script(&ctx, SplitKind::Train, &output(2));
        assert_eq!(
            script,
            "#!/usr/bin/env bash\nset -euo pipefail\n\n\
             mkdir -p /out/data_split\n\n\
             python concatenate_h5.py --list /out/conc_list_files/orca_train_0.list /out/data_split/orca_train_0.h5\n\
             python concatenate_h5.py --list /out/conc_list_files/orca_train_1.list /out/data_split/orca_train_1.h5\n"
        );
    }

    #[test]
    fn test_shuffle_script_with_options() {
        let tools = ToolOptions {
            venv_path: Some(PathBuf::from("/venv")),
            data_tools_folder: Some(PathBuf::from("/tools")),
            chunksize: Some(32),
            complib: Some(Complib::Gzip),
            complevel: Some(1),
            shuffle_delete: true,
        };
        let ctx = ScriptContext {
            output_folder: Path::new("/out"),
            output_file_name: "orca",
            tools: &tools,
        };

        let script = render_shuffle_script(&ctx, SplitKind::Validate, &output(1));
        assert_eq!(
            script,
            "#!/usr/bin/env bash\nset -euo pipefail\n\n\
             source /venv/bin/activate\n\n\
             python /tools/shuffle_h5.py --delete --chunksize 32 --complib gzip --complevel 1 /out/data_split/orca_validate_0.h5\n"
        );
    }

    #[test]
    fn test_write_scripts_skips_empty_splits() {
        let dir = tempdir().unwrap();
        let tools = ToolOptions::default();
        let ctx = ScriptContext {
            output_folder: dir.path(),
            output_file_name: "orca",
            tools: &tools,
        };
        let mut plan = SplitPlan::default();
        plan.splits.insert(SplitKind::Train, output(2));
        plan.splits.insert(SplitKind::Rest, output(0));

        let written = write_scripts(&ctx, &plan).unwrap();
        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["concatenate_h5_train.sh", "shuffle_h5_train.sh"]);
        assert!(written[0].starts_with(dir.path().join("job_scripts")));
    }

    #[test]
    fn test_empty_buckets_get_no_tool_call() {
        let tools = ToolOptions::default();
        let ctx = ScriptContext {
            output_folder: Path::new("/out"),
            output_file_name: "orca",
            tools: &tools,
        };
        let mixed = SplitOutput {
            selections: Vec::new(),
            buckets: vec![bucket(1), bucket(1), bucket(0), bucket(0)],
        };

        let concatenate = render_concatenate_script(&ctx, SplitKind::Train, &mixed);
        assert_eq!(concatenate.matches("python concatenate_h5.py").count(), 2);
        assert!(concatenate.contains("orca_train_1.list"));
        assert!(!concatenate.contains("orca_train_2"));
        assert!(!concatenate.contains("orca_train_3"));

        let shuffle = render_shuffle_script(&ctx, SplitKind::Train, &mixed);
        assert_eq!(
            shuffle,
            "#!/usr/bin/env bash\nset -euo pipefail\n\n\
             python shuffle_h5.py /out/data_split/orca_train_0.h5\n\
             python shuffle_h5.py /out/data_split/orca_train_1.h5\n"
        );
    }

    #[test]
    fn test_split_without_files_removes_old_scripts() {
        let dir = tempdir().unwrap();
        let tools = ToolOptions::default();
        let ctx = ScriptContext {
            output_folder: dir.path(),
            output_file_name: "orca",
            tools: &tools,
        };

        let mut plan = SplitPlan::default();
        plan.splits.insert(SplitKind::Validate, output(2));
        assert_eq!(write_scripts(&ctx, &plan).unwrap().len(), 2);

        plan.splits.insert(
            SplitKind::Validate,
            SplitOutput {
                selections: Vec::new(),
                buckets: vec![bucket(0), bucket(0)],
            },
        );
        assert!(write_scripts(&ctx, &plan).unwrap().is_empty());

        let script_dir = dir.path().join("job_scripts");
        assert!(!script_dir.join("concatenate_h5_validate.sh").exists());
        assert!(!script_dir.join("shuffle_h5_validate.sh").exists());
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "plain");
        assert_eq!(shell_quote("with space"), "'with space'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }
}
