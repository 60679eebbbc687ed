//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// pkgstore - local package cache maintenance
///
/// Inspects and maintains a store of recipe and package revisions shared
/// by every build on this machine.
#[derive(Parser, Debug)]
#[command(name = "pkgstore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PKGSTORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Store root (overrides storage.path)
    #[arg(short, long, global = true, env = "PKGSTORE_STORE")]
    pub store: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the revisions of a recipe or package
    Revisions(RevisionsArgs),

    /// Print a reference pinned to its latest revision
    Latest(RefArgs),

    /// Show the folders of a recipe or package revision
    Path(RefArgs),

    /// Export a folder as a new recipe revision
    Export(ExportArgs),

    /// Remove a revision, or every revision of a recipe
    Remove(RemoveArgs),

    /// List packages built from an outdated recipe revision
    Outdated(OutdatedArgs),

    /// Download a file through the download cache
    Fetch(FetchArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// A single reference argument
#[derive(Parser, Debug)]
pub struct RefArgs {
    /// Recipe (`name/version[@user/channel][#rrev]`) or package
    /// (`<recipe>:<package_id>[#prev]`) reference
    pub reference: String,
}

/// Arguments for the revisions command
#[derive(Parser, Debug)]
pub struct RevisionsArgs {
    /// Recipe or package reference
    pub reference: String,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the export command
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Recipe reference, without revision
    pub reference: String,

    /// Folder holding the recipe files
    pub folder: PathBuf,
}

/// Arguments for the remove command
#[derive(Parser, Debug)]
pub struct RemoveArgs {
    /// Reference pinned to the revision to remove
    pub reference: String,

    /// Remove every revision of the recipe
    #[arg(short, long)]
    pub all: bool,
}

/// Arguments for the outdated command
#[derive(Parser, Debug)]
pub struct OutdatedArgs {
    /// Recipe reference
    pub reference: String,

    /// Remove the outdated packages
    #[arg(long)]
    pub remove: bool,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URL to download
    pub url: String,

    /// Destination file
    pub dest: PathBuf,

    /// Expected SHA-256 of the file (hex)
    #[arg(long)]
    pub sha256: Option<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., locks.enabled)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
