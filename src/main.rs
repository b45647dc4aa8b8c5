use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use strm_sync::remote::AlistClient;
use strm_sync::sync::{self, RunOutcome};
use strm_sync::{config, logging, output, tree};
use tracing::error;

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;
/// Exit status when the remote tree dump has not changed since the last run.
const EXIT_UNCHANGED: u8 = 3;

#[derive(clap::Args, Clone, Default)]
struct SyncArgs {
    /// Tree dump to use for this run (URL or local path), instead of the
    /// configured location
    #[arg(long)]
    tree: Option<String>,

    /// Report what would change without writing or deleting anything
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser)]
#[command(name = "strm-sync")]
#[command(about = "Keep a directory of .strm placeholders in sync with a remote media tree")]
#[command(long_about = "\
Keep a directory of .strm placeholders in sync with a remote media tree

A file server exposes a cloud drive under <host>/d<mount>. The drive's
exported directory tree (a text dump) is downloaded, flattened into paths,
and every media file in it gets a small .strm file holding its download URL.
Media servers read those files and stream straight from the file server.

Pipeline (one run):

  1. Acquire   download the tree dump, or stop early if its SHA-1 is unchanged
  2. Parse     decode the dump and flatten it into absolute paths
  3. Generate  write <root>/<relative path>.strm for every media entry
  4. Prune     delete .strm files that are no longer in the tree

Configuration is layered: stock defaults, then --config <FILE>, then the
environment (ALIST_HOST, ALIST_115_MOUNT_PATH, ALIST_115_TREE_FILE,
STRM_SAVE_PATH, EXCLUDE_OPTION, UPDATE_EXISTING, DELETE_ABSENT,
ALIST_115_TREE_FILE_FOR_GUEST, MEDIA_EXTENSIONS).

Exit status: 0 on success, 1 on failure, 3 when the tree was unchanged.
Log verbosity: STRM_SYNC_LOG (or RUST_LOG), e.g. STRM_SYNC_LOG=debug.

Run 'strm-sync gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (TOML), applied over the stock defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline (the default when no command is given)
    Sync(SyncArgs),
    /// Parse a tree dump and print or save the flattened paths
    Parse {
        /// Tree dump file
        file: PathBuf,
        /// Write the paths here instead of printing them
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    let result = run(cli);
    if let Err(e) = &result {
        error!("{e}");
    }
    ExitCode::from(exit_status(&result))
}

/// Process exit status for the result of a command.
fn exit_status(result: &Result<u8, Box<dyn std::error::Error>>) -> u8 {
    match result {
        Ok(status) => *status,
        Err(_) => EXIT_FAILURE,
    }
}

/// Exit status for a sync run that got through without error.
fn outcome_status(outcome: &RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Completed(_) => EXIT_SUCCESS,
        RunOutcome::Unchanged(_) => EXIT_UNCHANGED,
    }
}

fn run(cli: Cli) -> Result<u8, Box<dyn std::error::Error>> {
    let command = cli
        .command
        .unwrap_or_else(|| Command::Sync(SyncArgs::default()));

    match command {
        Command::Sync(args) => {
            let config = config::load_config(cli.config.as_deref())?;
            let location = args.tree.unwrap_or_else(|| config.tree_location());
            let host = AlistClient::new(&config)?;

            let outcome = sync::run(&config, &location, &host, args.dry_run)?;
            match &outcome {
                RunOutcome::Completed(summary) => {
                    output::print_summary(summary, Path::new(&config.strm_save_path));
                }
                RunOutcome::Unchanged(remote) => output::print_unchanged(remote),
            }
            return Ok(outcome_status(&outcome));
        }
        Command::Parse { file, output: dest } => match dest {
            Some(dest) => {
                let paths = tree::parse_tree_file(&file, &dest)?;
                println!("Wrote {} paths to {}", paths.len(), dest.display());
            }
            None => output::print_paths(&tree::read_tree(&file)?),
        },
        Command::Config => {
            let config = config::load_config(cli.config.as_deref())?;
            print!("{}", config.to_toml()?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(EXIT_SUCCESS)
}
