use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use verdict::models::{ErrorType, ValidationStatus};

#[derive(Parser, Debug)]
#[command(name = "verdict")]
#[command(about = "Client for the mapping validation backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List active mappers from the user directory
    Users,
    /// Resolve a username to its backend user ID
    LookupUser(LookupUserArgs),
    /// Look up a task's mapper and status on the Tasking Manager
    Task(TaskArgs),
    /// Compare the latest published release with the configured version
    CheckUpdate,
    /// Record a validation verdict, optionally uploading the exported file
    Submit(SubmitArgs),
    /// Upload an exported file for an existing validation log
    Upload(UploadArgs),
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Args, Debug)]
pub struct LookupUserArgs {
    pub username: String,
}

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(flatten)]
    pub source: TaskSource,

    /// Task ID (with --project)
    #[arg(long, requires = "project")]
    pub task: Option<i64>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct TaskSource {
    /// Task URL, e.g. https://tasks.hotosm.org/projects/123/tasks/45
    #[arg(long)]
    pub url: Option<String>,

    /// Changeset comment containing #hotosm-project-P-task-T
    #[arg(long)]
    pub comment: Option<String>,

    /// Project ID (requires --task)
    #[arg(long, requires = "task")]
    pub project: Option<i64>,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[arg(long)]
    pub validator: String,

    #[arg(long)]
    pub mapper: String,

    /// Task URL or changeset comment to fill task and mapper from
    #[arg(long)]
    pub task_source: Option<String>,

    #[arg(long)]
    pub task_id: Option<String>,

    /// Overrides the mapper's settlement from the user directory
    #[arg(long)]
    pub settlement: Option<String>,

    /// YYYY-MM-DD, defaults to today
    #[arg(long)]
    pub date: Option<String>,

    #[arg(long)]
    pub total_buildings: u32,

    /// Error count as TYPE=COUNT, e.g. hanging_nodes=3 (repeatable)
    #[arg(long = "error", value_parser = parse_error_count)]
    pub errors: Vec<(ErrorType, u32)>,

    #[arg(long, default_value = "validated", value_parser = parse_status)]
    pub status: ValidationStatus,

    #[arg(long, default_value = "")]
    pub comments: String,

    /// Exported OSM file to upload after the log is recorded
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    #[arg(long)]
    pub log_id: i64,

    #[arg(long)]
    pub mapper: String,

    #[arg(long)]
    pub validator: String,

    #[arg(long)]
    pub file: PathBuf,

    #[arg(long)]
    pub task_id: Option<String>,

    #[arg(long)]
    pub settlement: Option<String>,
}

fn parse_error_count(raw: &str) -> Result<(ErrorType, u32), String> {
    let (name, count) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=COUNT, got '{}'", raw))?;
    let error_type = name.parse::<ErrorType>()?;
    let count = count
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid count '{}': {}", count, e))?;
    Ok((error_type, count))
}

fn parse_status(raw: &str) -> Result<ValidationStatus, String> {
    raw.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_count() {
        assert_eq!(
            parse_error_count("hanging-nodes=3").unwrap(),
            (ErrorType::HangingNodes, 3)
        );
        assert!(parse_error_count("hanging_nodes").is_err());
        assert!(parse_error_count("bogus=1").is_err());
        assert!(parse_error_count("missing_tags=-1").is_err());
    }

    #[test]
    fn test_submit_args() {
        let cli = Cli::try_parse_from([
            "verdict",
            "submit",
            "--validator",
            "val",
            "--mapper",
            "ana",
            "--total-buildings",
            "40",
            "--error",
            "missing_tags=2",
            "--error",
            "improper_tags=1",
            "--status",
            "rejected",
        ])
        .unwrap();

        let Commands::Submit(args) = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(args.errors.len(), 2);
        assert_eq!(args.status, ValidationStatus::Rejected);
        assert!(args.file.is_none());
    }

    #[test]
    fn test_task_args_are_exclusive() {
        assert!(Cli::try_parse_from(["verdict", "task", "--url", "x", "--comment", "y"]).is_err());
        assert!(Cli::try_parse_from(["verdict", "task", "--project", "1"]).is_err());
        assert!(Cli::try_parse_from(["verdict", "task", "--project", "1", "--task", "2"]).is_ok());
    }
}
