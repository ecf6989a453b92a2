#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
//! Command-line interface for inspecting and watching local changes via the
//! libdrift crate.

use std::{
    env,
    io::{self, IsTerminal},
    path::{Path, PathBuf},
    process,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use libdrift::{
    ChangeKind, CommitRecord, DiffCapture, DiffResult, DriftError, GitGateway, Output, Quiet,
    Terminal, parse_diff,
    watch::{ChangeWatcher, WatchEvent},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("color_mode")
        .args(["color", "no_color"])
))]
/// Top-level CLI options for drift.
struct Cli {
    /// Override the repository directory (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    repo_dir: Option<String>,

    /// Enable colored output
    #[arg(long, global = true)]
    color: bool,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    /// Suppress diagnostic output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    /// The primary command to execute.
    command: Commands,
}

#[derive(Subcommand)]
/// CLI subcommands supported by drift.
enum Commands {
    /// Summarize uncommitted changes in the working tree
    #[command(alias = "st")]
    Status,

    /// Show the working-tree diff, or the diff between two revisions
    Diff {
        /// Older revision to diff from (working tree against HEAD if omitted)
        from: Option<String>,

        /// Newer revision to diff to (defaults to the current revision)
        to: Option<String>,

        /// Print per-file change details instead of raw diff text
        #[arg(long)]
        stat: bool,
    },

    /// List recent commits, newest first
    Log {
        /// Maximum number of commits to list
        #[arg(short = 'n', long = "limit", value_name = "N", default_value_t = 20)]
        limit: usize,

        /// Only list commits not reachable from this revision
        #[arg(long, value_name = "REV")]
        exclude: Option<String>,
    },

    /// Show the changes introduced by a single revision
    Show {
        /// Revision to show
        revision: String,

        /// Print per-file change details instead of raw diff text
        #[arg(long)]
        stat: bool,
    },

    /// Watch the working tree and report when it changes
    Watch,
}

/// Expand a leading `~` in a filesystem path using the `HOME` environment variable.
fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~")
        && let Ok(home) = env::var("HOME")
    {
        return PathBuf::from(path.replacen("~", &home, 1));
    }
    PathBuf::from(path)
}

/// One-line rendering of aggregate diff stats.
fn format_stats(result: &DiffResult) -> String {
    format!(
        "{} file{} changed, +{} -{}",
        result.stats.files_changed,
        if result.stats.files_changed == 1 { "" } else { "s" },
        result.stats.additions,
        result.stats.deletions
    )
}

/// Print a per-file breakdown of a diff result to stdout.
fn print_file_stats(result: &DiffResult, max_file_bytes: usize) {
    let parsed = parse_diff(&result.raw_text, max_file_bytes);
    for file in &parsed.files {
        let marker = match file.kind {
            ChangeKind::Added => "A",
            ChangeKind::Deleted => "D",
            ChangeKind::Modified => "M",
            ChangeKind::Renamed => "R",
        };
        let detail = if file.is_binary {
            "binary".to_string()
        } else {
            format!("+{} -{}", file.additions, file.deletions)
        };
        match &file.old_path {
            Some(old) => println!("{marker}  {old} -> {}  {detail}", file.path),
            None => println!("{marker}  {}  {detail}", file.path),
        }
    }
    println!("{}", format_stats(result));
}

/// Run the `drift status` command logic.
fn status_command(capture: &DiffCapture, output: &dyn Output, root: &Path) -> Result<()> {
    if !capture.has_changes(root) {
        output.message("Working tree clean.");
        return Ok(());
    }

    let result = capture.working_tree_diff(root)?;
    for path in &result.changed_files {
        println!("{path}");
    }
    output.message(&format_stats(&result));
    Ok(())
}

/// Run the `drift diff` command logic.
fn diff_command(
    capture: &DiffCapture,
    output: &dyn Output,
    root: &Path,
    from: Option<&str>,
    to: Option<&str>,
    stat: bool,
) -> Result<()> {
    let result = match from {
        Some(from) => capture.revision_range_diff(root, from, to)?,
        None => capture.working_tree_diff(root)?,
    };

    if stat {
        print_file_stats(&result, libdrift::DEFAULT_MAX_FILE_BYTES);
    } else {
        print!("{}", result.raw_text);
        output.message(&format_stats(&result));
    }
    Ok(())
}

/// Render one commit in log output.
fn print_commit(record: &CommitRecord) {
    let short = record.revision.get(..8).unwrap_or(&record.revision);
    let subject = record.message.lines().next().unwrap_or("");
    println!(
        "{short}  {}  {}  {subject}  (+{} -{})",
        record.authored_at.format("%Y-%m-%d %H:%M"),
        record.author,
        record.stats.additions,
        record.stats.deletions
    );
}

/// Run the `drift log` command logic.
fn log_command(
    capture: &DiffCapture,
    output: &dyn Output,
    root: &Path,
    limit: usize,
    exclude: Option<&str>,
) -> Result<()> {
    let records = capture.commit_history(root, limit, exclude)?;
    if records.is_empty() {
        output.message("No commits found.");
        return Ok(());
    }
    for record in &records {
        print_commit(record);
    }
    Ok(())
}

/// Run the `drift show` command logic.
fn show_command(
    capture: &DiffCapture,
    output: &dyn Output,
    root: &Path,
    revision: &str,
    stat: bool,
) -> Result<()> {
    let result = capture.revision_diff(root, revision)?;
    if stat {
        print_file_stats(&result, libdrift::DEFAULT_MAX_FILE_BYTES);
    } else {
        print!("{}", result.raw_text);
        output.message(&format_stats(&result));
    }
    Ok(())
}

/// Run the `drift watch` command logic: block forever, reporting a fresh
/// working-tree summary whenever the tree settles with changes.
fn watch_command(
    capture: &DiffCapture,
    gateway: Arc<GitGateway>,
    output: Arc<dyn Output>,
    root: &Path,
) -> Result<()> {
    let (watcher, events) = ChangeWatcher::new(gateway, Arc::clone(&output));
    watcher.start_watching("cli", root)?;
    output.message(&format!("Watching {} (Ctrl-C to stop)...", root.display()));

    loop {
        match events.recv() {
            Ok(WatchEvent::NeedsRefresh(_)) => match capture.working_tree_diff(root) {
                Ok(result) => output.success(&format_stats(&result)),
                Err(e) => output.warn(&format!("recapture failed: {e}")),
            },
            Err(_) => return Ok(()),
        }
    }
}

/// CLI entrypoint.
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine color output preference early for error handling
    let color = if cli.color {
        true
    } else if cli.no_color {
        false
    } else {
        io::stdout().is_terminal()
    };

    let output: Arc<dyn Output> = if cli.quiet {
        Arc::new(Quiet)
    } else {
        Arc::new(Terminal::new(color))
    };

    if let Err(e) = run(cli, &output) {
        let exit_code = match e.downcast_ref::<DriftError>() {
            Some(err) => {
                output.fail(&format!("{e:#}"));
                err.exit_code()
            }
            None => {
                output.fail(&format!("{e:#}"));
                1
            }
        };
        process::exit(exit_code);
    }
    Ok(())
}

/// Execute the selected CLI command using the provided output implementation.
fn run(cli: Cli, output: &Arc<dyn Output>) -> Result<()> {
    let root = match &cli.repo_dir {
        Some(dir) => expand_tilde(dir),
        None => env::current_dir().context("Failed to determine current directory")?,
    };

    let gateway = Arc::new(GitGateway::default());
    let capture = DiffCapture::new(
        Arc::clone(&gateway) as Arc<dyn libdrift::Gateway>,
        Arc::clone(output),
    );

    match cli.command {
        Commands::Status => status_command(&capture, output.as_ref(), &root)?,
        Commands::Diff { from, to, stat } => diff_command(
            &capture,
            output.as_ref(),
            &root,
            from.as_deref(),
            to.as_deref(),
            stat,
        )?,
        Commands::Log { limit, exclude } => {
            log_command(&capture, output.as_ref(), &root, limit, exclude.as_deref())?;
        }
        Commands::Show { revision, stat } => {
            show_command(&capture, output.as_ref(), &root, &revision, stat)?;
        }
        Commands::Watch => watch_command(&capture, gateway, Arc::clone(output), &root)?,
    }

    Ok(())
}
