//! plinth CLI
//!
//! Installs tooling plugins from a manifest into a target repository.
//!
//! Exit codes: 0 when everything requested is installed, 1 when the run was
//! rejected before any change (invalid manifest or options, conflicts, a
//! held lock), 2 when some plugins failed, were blocked or were interrupted.

mod cli;
mod commands;
mod context;
mod error;
mod interactive;

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use plinth_core::CancelFlag;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::Completion;
use commands::install::InstallArgs;
use context::TargetContext;
use error::Result;

const EXIT_REJECTED: u8 = 1;
const EXIT_NEEDS_ATTENTION: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(Completion::Done) => ExitCode::SUCCESS,
        Ok(Completion::NeedsAttention) => ExitCode::from(EXIT_NEEDS_ATTENTION),
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{}: {}", "hint".cyan(), hint);
            }
            ExitCode::from(EXIT_REJECTED)
        }
    }
}

/// `RUST_LOG` controls filtering; `--verbose` forces debug output.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Cancel `flag` on Ctrl-C. The listener runs on its own thread with a
/// single-threaded runtime; the run itself stays synchronous.
fn listen_for_interrupt(flag: CancelFlag) {
    let spawned = std::thread::Builder::new()
        .name("plinth-ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                    return;
                }
            };
            if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                eprintln!(
                    "{} finishing the current step, then stopping",
                    "interrupted:".yellow().bold()
                );
                flag.cancel();
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
    }
}

fn run(cli: Cli) -> Result<Completion> {
    let Some(command) = cli.command else {
        println!("{} - install tooling plugins into a repository", "plinth".green().bold());
        println!();
        println!("Run {} for available commands.", "plinth --help".cyan());
        return Ok(Completion::Done);
    };

    match command {
        Commands::ValidateManifest { path } => {
            commands::run_validate_manifest(&path)?;
            Ok(Completion::Done)
        }
        Commands::Completions { shell } => {
            commands::run_completions(shell);
            Ok(Completion::Done)
        }
        Commands::Status { json } => {
            let context = TargetContext::resolve(cli.repo.as_deref(), cli.manifest.as_deref())?;
            commands::run_status(&context, json)?;
            Ok(Completion::Done)
        }
        Commands::Install {
            plugins,
            options,
            force,
            jobs,
            timeout,
            dry_run,
            yes,
        } => {
            let context = TargetContext::resolve(cli.repo.as_deref(), cli.manifest.as_deref())?;
            let cancel = CancelFlag::new();
            listen_for_interrupt(cancel.clone());
            let args = InstallArgs {
                plugins,
                options,
                force,
                jobs,
                timeout,
                dry_run,
                yes,
            };
            commands::run_install(&context, args, cancel)
        }
        Commands::Resume {
            jobs,
            timeout,
            dry_run,
        } => {
            let context = TargetContext::resolve(cli.repo.as_deref(), cli.manifest.as_deref())?;
            let cancel = CancelFlag::new();
            listen_for_interrupt(cancel.clone());
            commands::run_resume(&context, jobs, timeout, dry_run, cancel)
        }
    }
}
