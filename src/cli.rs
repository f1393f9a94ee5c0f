//! Command-line interface module for runfiler.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing and config overrides
//! - Inspection of a data folder
//! - Structure preview
//! - Organization orchestration with progress and dry run

use crate::association::AssociationPolicy;
use crate::config::OrganizerConfig;
use crate::field::FileClass;
use crate::file_organizer::CopyOutcome;
use crate::output::OutputFormatter;
use crate::session::{OrganizerSession, StructureSource};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Infer the naming structure of behaviour recordings and file each run by group and dataset"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global: GlobalArgs,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file (defaults to ./.runfilerrc.toml, then ~/.config/runfiler/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Comma separated token separators, e.g. "_,-"
    #[arg(long, global = true, value_name = "LIST")]
    pub separators: Option<String>,

    /// Substring marking side-view tracking files
    #[arg(long, global = true, value_name = "KEYWORD")]
    pub side_keyword: Option<String>,

    /// Substring marking ventral-view tracking files
    #[arg(long, global = true, value_name = "KEYWORD")]
    pub ventral_keyword: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Count files per class and show the representative filename's tokens
    Inspect {
        data_dir: PathBuf,
    },
    /// Show the field values found with a structure, without copying anything
    Preview {
        data_dir: PathBuf,

        #[command(flatten)]
        structure: StructureArgs,

        /// Print associated runs as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy every run into <TARGET_DIR>/<group>/<dataset>/<class folder>
    Organize {
        data_dir: PathBuf,
        target_dir: PathBuf,

        #[command(flatten)]
        structure: StructureArgs,

        /// Skip side files without a ventral partner
        #[arg(long)]
        require_ventral: bool,

        /// Skip side files without a video partner
        #[arg(long)]
        require_video: bool,

        /// Print the copy plan without touching the disk
        #[arg(long)]
        dry_run: bool,
    },
}

/// How field values are obtained.
#[derive(Args, Debug, Clone, Default)]
#[group(required = true, multiple = false)]
pub struct StructureArgs {
    /// Field name per token of the representative filename, comma separated
    /// ("-" or empty for tokens without a field), e.g. "Group,-,Mouse,Run"
    #[arg(long, value_name = "TAGS")]
    pub tags: Option<String>,

    /// Regex template, e.g. "(Group)_(Mouse)_Run(Run:[0-9]+)"
    #[arg(long, value_name = "TEMPLATE")]
    pub regex: Option<String>,
}

/// Installs the log subscriber. `RUST_LOG` wins over `verbosity`.
pub fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbosity {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Runs the CLI application.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use runfiler::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["runfiler", "inspect", "/path/to/data"]);
/// if let Err(e) = run_cli(cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: Cli) -> Result<(), String> {
    let config = load_config(&cli.global)?;

    match cli.command {
        Command::Inspect { data_dir } => inspect(&data_dir, config),
        Command::Preview {
            data_dir,
            structure,
            json,
        } => preview(&data_dir, config, &structure, json),
        Command::Organize {
            data_dir,
            target_dir,
            structure,
            require_ventral,
            require_video,
            dry_run,
        } => {
            let mut config = config;
            config.constraints.require_ventral |= require_ventral;
            config.constraints.require_video |= require_video;
            organize(&data_dir, &target_dir, config, &structure, dry_run)
        }
    }
}

/// Loads the configuration and applies command-line overrides.
pub fn load_config(global: &GlobalArgs) -> Result<OrganizerConfig, String> {
    let mut config = OrganizerConfig::load(global.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;

    if let Some(separators) = &global.separators {
        config.structure.separators = parse_separators(separators);
    }
    if let Some(keyword) = &global.side_keyword {
        config.data.side_keyword = keyword.clone();
    }
    if let Some(keyword) = &global.ventral_keyword {
        config.data.ventral_keyword = keyword.clone();
    }

    config
        .validate()
        .map_err(|e| format!("Error in configuration: {}", e))?;
    Ok(config)
}

/// Splits a comma separated separator list, dropping empty entries.
pub fn parse_separators(list: &str) -> Vec<String> {
    list.split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a comma separated tag list; `-` and empty entries mean "no field".
pub fn parse_tags(list: &str) -> Vec<Option<String>> {
    list.split(',')
        .map(str::trim)
        .map(|tag| match tag {
            "" | "-" => None,
            tag => Some(tag.to_string()),
        })
        .collect()
}

fn open_session(data_dir: &Path, config: OrganizerConfig) -> Result<OrganizerSession, String> {
    OrganizerSession::open(data_dir, config)
        .map_err(|e| format!("Error reading data folder {}: {}", data_dir.display(), e))
}

fn apply_structure(session: &mut OrganizerSession, structure: &StructureArgs) -> Result<(), String> {
    if let Some(tags) = &structure.tags {
        let tags = parse_tags(tags);
        let tags: Vec<Option<&str>> = tags.iter().map(Option::as_deref).collect();
        session
            .set_tags(&tags)
            .map_err(|e| format!("Invalid tags: {}", e))
    } else if let Some(regex) = &structure.regex {
        session
            .set_regex_template(regex)
            .map_err(|e| format!("Invalid regex template: {}", e))
    } else {
        Err("Give either --tags or --regex".to_string())
    }
}

fn inspect(data_dir: &Path, config: OrganizerConfig) -> Result<(), String> {
    let session = open_session(data_dir, config)?;

    OutputFormatter::header("FILES");
    for class in FileClass::ALL {
        let count = session.data().files(class).len();
        OutputFormatter::plain(&format!("{:<8} {}", class.label(), count));
    }

    let Some(representative) = session.representative() else {
        OutputFormatter::warning("No side file found: check the data folder and the side keyword");
        return Ok(());
    };

    OutputFormatter::header("REPRESENTATIVE");
    OutputFormatter::info(representative.text());
    OutputFormatter::plain(&format!(
        "Separators: {}",
        session.separators().join(" ")
    ));
    OutputFormatter::token_table(&representative.tokens());
    OutputFormatter::plain(&format!(
        "\nTag these tokens with --tags, using the fields: {}",
        session.fields().names().join(", ")
    ));
    Ok(())
}

fn preview(
    data_dir: &Path,
    config: OrganizerConfig,
    structure: &StructureArgs,
    json: bool,
) -> Result<(), String> {
    let mut session = open_session(data_dir, config)?;
    apply_structure(&mut session, structure)?;

    let policy = AssociationPolicy {
        require_ventral: false,
        require_video: false,
        ..session.policy()
    };
    let records = session
        .associated(&policy)
        .map_err(|e| format!("Error associating files: {}", e))?;

    if json {
        let output = serde_json::to_string_pretty(&records)
            .map_err(|e| format!("Error serializing records: {}", e))?;
        OutputFormatter::plain(&output);
        return Ok(());
    }

    if let Some(StructureSource::Inferred { .. }) = session.source() {
        let template = session
            .structure_template()
            .map_err(|e| format!("Error building structure template: {}", e))?;
        OutputFormatter::header("STRUCTURE TEMPLATE");
        OutputFormatter::plain(&template);
    }

    OutputFormatter::field_summary_table(&session.field_summary(&records));
    OutputFormatter::plain(&format!("\n{} runs found", records.len()));
    Ok(())
}

fn organize(
    data_dir: &Path,
    target_dir: &Path,
    config: OrganizerConfig,
    structure: &StructureArgs,
    dry_run: bool,
) -> Result<(), String> {
    let mut session = open_session(data_dir, config)?;
    apply_structure(&mut session, structure)?;
    let policy = session.policy();

    if dry_run {
        let records = session
            .associated(&policy)
            .map_err(|e| format!("Error associating files: {}", e))?;
        let plan = session.plan(&records, target_dir);
        OutputFormatter::dry_run_notice(&format!(
            "{} runs, {} files would be copied to {}",
            records.len(),
            plan.len(),
            target_dir.display()
        ));
        OutputFormatter::plan_listing(&plan);
        return Ok(());
    }

    OutputFormatter::info(&format!(
        "Organizing {} into {}",
        data_dir.display(),
        target_dir.display()
    ));

    let pb = OutputFormatter::create_progress_bar(0);
    let bar = pb.clone();
    let job = session
        .organize(target_dir, &policy, move |done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        })
        .map_err(|e| format!("Error associating files: {}", e))?;

    match job.wait() {
        Ok(CopyOutcome::Completed(report)) => {
            pb.finish_and_clear();
            if report.total == 0 {
                OutputFormatter::warning("No run to organize");
            } else {
                OutputFormatter::success(&format!(
                    "Copied {} files ({} bytes)",
                    report.copied, report.bytes
                ));
            }
            Ok(())
        }
        Ok(CopyOutcome::Terminated(report)) => {
            pb.abandon();
            OutputFormatter::warning(&format!(
                "Copy terminated after {} of {} files",
                report.copied, report.total
            ));
            Ok(())
        }
        Err(e) => {
            pb.abandon();
            Err(format!("Copy failed: {}", e))
        }
    }
}
