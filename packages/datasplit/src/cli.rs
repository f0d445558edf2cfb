//! Command-line interface for datasplit.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::SplitConfig;
use crate::discovery::DirectoryDiscovery;
use crate::error::Result;
use crate::planner::check_requests;
use crate::splitter::{plan_config, write_outputs};
use crate::types::{InputGroup, SplitKind};

/// datasplit - Split run-indexed data files into train/validate/rest lists.
#[derive(Parser)]
#[command(name = "datasplit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover files, plan the split and write the list files.
    Split {
        /// Path to the TOML configuration file
        config: PathBuf,

        /// Only report file counts, write nothing (overrides print_only)
        #[arg(long)]
        print_only: bool,

        /// Output folder (overrides output_file_folder)
        #[arg(short, long)]
        output_folder: Option<PathBuf>,

        /// Print the file-count report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a configuration file without listing any directory.
    Check {
        /// Path to the TOML configuration file
        config: PathBuf,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Split {
            config,
            print_only,
            output_folder,
            json,
        } => split_command(&config, print_only, output_folder, json),
        Commands::Check { config } => check_command(&config),
    }
}

/// Execute the split command.
fn split_command(
    config_path: &Path,
    print_only: bool,
    output_folder: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mut config = SplitConfig::load(config_path)?;
    config.print_only |= print_only;
    if let Some(folder) = output_folder {
        config.output_file_folder = folder;
    }

    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let discovery = DirectoryDiscovery::new(&config.file_extension);
    let planned = match plan_config(&config, &discovery, |group| {
        pb.set_message(format!("Listing {} ...", group.name));
    }) {
        Ok(planned) => planned,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&planned.report)?);
    } else {
        print!("{}", planned.report.render_text());
    }

    if config.print_only {
        if !json {
            println!();
            println!("{}", style("Dry run: no files written.").yellow().bold());
        }
        return Ok(());
    }

    let written = write_outputs(&config, &planned.plan)?;

    if !json {
        println!();
        println!(
            "{} {} list files to {}",
            style("Wrote").green().bold(),
            written.list_files.len(),
            config.output_file_folder.display()
        );
        if !written.scripts.is_empty() {
            println!(
                "{} {} scripts",
                style("Wrote").green().bold(),
                written.scripts.len()
            );
        }
    }

    Ok(())
}

/// Execute the check command.
fn check_command(config_path: &Path) -> Result<()> {
    let config = SplitConfig::load(config_path)?;
    let groups: Vec<&InputGroup> = config.groups.values().collect();
    check_requests(&groups, &config.requests)?;

    println!(
        "{} {}",
        style("Configuration OK:").green().bold(),
        config_path.display()
    );
    for kind in SplitKind::ALL {
        match config.requests.count(kind) {
            Some(n) => println!("  {kind}: {n} list files"),
            None => println!("  {kind}: {}", style("skipped").dim()),
        }
    }
    for group in &groups {
        print!("  [{}] {}", style(&group.name).cyan(), group.dir.display());
        for (kind, range) in group.ranges() {
            print!("  {kind}={range}");
        }
        println!();
    }

    Ok(())
}
