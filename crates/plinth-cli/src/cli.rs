//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// plinth - Install layered tooling plugins into a repository
#[derive(Parser, Debug)]
#[command(name = "plinth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Target repository root (defaults to the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Plugin manifest (TOML, YAML or JSON)
    #[arg(long, global = true, env = "PLINTH_MANIFEST", value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Install plugins and their dependencies
    ///
    /// Examples:
    ///   plinth install lang-python
    ///   plinth install lang-python -o python_version=3.11
    ///   plinth install lang-python std-security --dry-run
    Install {
        /// Plugin ids to install
        #[arg(required = true, value_name = "PLUGIN")]
        plugins: Vec<String>,

        /// Option value as name=value or plugin.name=value (repeatable)
        #[arg(short, long = "option", value_name = "ASSIGNMENT")]
        options: Vec<String>,

        /// Re-run every step of the named plugins even if detected as installed
        #[arg(long)]
        force: bool,

        /// Sibling plugins to run concurrently
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Default run-command timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Print the plan and conflicts without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Do not prompt; use defaults for interactive options
        #[arg(short, long)]
        yes: bool,
    },

    /// Continue plugins left in progress or failed by an earlier run
    Resume {
        /// Sibling plugins to run concurrently
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Default run-command timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Print the plan without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show recorded progress and detected state of every plugin
    Status {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Validate a manifest without touching any repository
    ValidateManifest {
        /// Manifest file to validate
        path: PathBuf,
    },

    /// Generate shell completions
    ///
    /// Outputs completion script for your shell.
    ///
    /// Examples:
    ///   plinth completions bash > ~/.local/share/bash-completion/completions/plinth
    ///   plinth completions zsh > ~/.zfunc/_plinth
    ///   plinth completions fish > ~/.config/fish/completions/plinth.fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
