use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use graph::{CommitDetail, CommitId, GitLogProvider, TextPrinter};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, Level};
use vcslog_core::GitRebaseHandler;
use vcslog_ui::{LogConfig, VcsLogController};

type Controller = VcsLogController<GitLogProvider, GitRebaseHandler>;

const READ_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "vcslog")]
#[command(about = "Commit graph viewer with interactive rebase planning", long_about = None)]
struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Config file (defaults to vcslog.toml in the repository)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw the commit graph
    Log {
        /// Path to the repository
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Number of commits to load
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Collapse linear runs of commits
        #[arg(long)]
        collapse: bool,
        /// Drop the edges that stand in for collapsed runs
        #[arg(long)]
        hide_long_edges: bool,
        /// Maximum label width
        #[arg(long, default_value = "72")]
        width: usize,
    },
    /// Show graph statistics
    Stats {
        /// Path to the repository
        #[arg(default_value = ".")]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Plan rebasing a branch onto another revision
    Rebase {
        /// Path to the repository
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Branch to rebase
        #[arg(short, long)]
        branch: String,
        /// Revision to rebase onto
        #[arg(long)]
        onto: String,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
        /// Rewrite the branch instead of only printing the plan
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("branch {0} not found")]
    UnknownBranch(String),
    #[error("history could not be read completely")]
    IncompleteHistory,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Log {
            path,
            count,
            collapse,
            hide_long_edges,
            width,
        } => {
            let mut config = load_config(cli.config.as_deref(), &path)?;
            if let Some(count) = count {
                config.page_size = count;
            }
            // Every printed row needs its details at once.
            config.detail_cache_capacity = config.detail_cache_capacity.max(config.page_size);
            let mut controller = open(&path, config)?;
            controller.request_more();
            controller.wait_for_pending(READ_TIMEOUT);
            report_notifications(&mut controller);

            if collapse {
                controller.hide_all();
            }
            if hide_long_edges {
                controller.set_long_edges_hidden(true);
            }
            print_log(&mut controller, width);
        }
        Commands::Stats { path, json } => {
            let config = load_config(cli.config.as_deref(), &path)?;
            let mut controller = open(&path, config)?;
            load_everything(&mut controller)?;

            let stats = controller.graph().stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Commits: {}", stats.total_commits);
                println!("Edges:   {}", stats.total_edges);
                println!("Merges:  {}", stats.merge_commits);
                println!("Roots:   {}", stats.root_commits);
                println!("Heads:   {}", stats.heads);
                if stats.partial {
                    println!("History is partial");
                }
            }
        }
        Commands::Rebase {
            path,
            branch,
            onto,
            json,
            apply,
        } => {
            let config = load_config(cli.config.as_deref(), &path)?;
            let onto = resolve_revision(&path, &onto)?;
            let mut controller = open(&path, config)?;
            load_everything(&mut controller)?;

            let subject = controller
                .find_branch(&branch)
                .cloned()
                .ok_or_else(|| CliError::UnknownBranch(branch.clone()))?;
            controller.start_rebase(&subject, &onto)?;
            let Some(plan) = controller.rebase_plan() else {
                return Ok(());
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                println!("Rebase {} onto {}", plan.subject.name, plan.base.short(8));
                for command in &plan.commands {
                    println!("  {command}");
                }
            }

            if apply {
                let result = controller.apply_interactive_rebase();
                report_notifications(&mut controller);
                result?;
            } else {
                controller.cancel_interactive_rebase();
            }
        }
    }

    Ok(())
}

fn load_config(explicit: Option<&Path>, repo: &Path) -> Result<LogConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => repo.join("vcslog.toml"),
    };
    debug!(path = %path.display(), "loading config");
    LogConfig::load(&path)
}

fn open(path: &Path, config: LogConfig) -> Result<Controller> {
    let provider = GitLogProvider::new(Some(path.to_string_lossy().as_ref()))?;
    let handler = GitRebaseHandler::open(path)?;
    VcsLogController::new(provider, handler, config)
}

fn load_everything(controller: &mut Controller) -> Result<()> {
    while controller.has_more() {
        controller.request_more();
        let update = controller.wait_for_pending(READ_TIMEOUT);
        if update.failures > 0 || update.is_empty() {
            report_notifications(controller);
            return Err(CliError::IncompleteHistory.into());
        }
    }
    Ok(())
}

fn resolve_revision(repo: &Path, revision: &str) -> Result<CommitId> {
    let repo = git2::Repository::open(repo).context("Failed to open repository")?;
    let commit = repo
        .revparse_single(revision)
        .and_then(|object| object.peel_to_commit())
        .with_context(|| format!("Unknown revision {revision}"))?;
    Ok(CommitId::new(commit.id().to_string()))
}

fn report_notifications(controller: &mut Controller) {
    for notification in controller.take_notifications() {
        eprintln!("{notification}");
    }
}

fn print_log(controller: &mut Controller, width: usize) {
    let ids: Vec<CommitId> = controller
        .print_model()
        .visible_rows()
        .iter()
        .filter_map(|&row| controller.graph().commit_id_at(row).cloned())
        .collect();
    if controller.request_details(&ids) {
        controller.wait_for_pending(READ_TIMEOUT);
        report_notifications(controller);
    }

    let graph = controller.graph();
    let details: HashMap<CommitId, CommitDetail> = controller
        .cached_details(&ids)
        .into_iter()
        .map(|detail| (detail.id.clone(), detail))
        .collect();

    let mut decorations: HashMap<&CommitId, Vec<&str>> = HashMap::new();
    for r in controller.refs() {
        decorations.entry(&r.target).or_default().push(&r.name);
    }

    let printer = TextPrinter::new(Some(width));
    let text = printer.print(controller.print_model(), |row| {
        let Some(id) = graph.commit_id_at(row) else {
            return String::new();
        };
        let mut label = id.short(8).to_string();
        if let Some(names) = decorations.get(id) {
            label.push_str(&format!(" ({})", names.join(", ")));
        }
        if let Some(detail) = details.get(id) {
            label.push_str(&format!(
                " {} {}",
                detail.timestamp.format("%Y-%m-%d"),
                detail.subject
            ));
        }
        label
    });
    print!("{text}");
}
