//! `install` and `resume` commands

use std::time::Duration;

use plinth_core::{CancelFlag, InstallRequest, ResumeRequest};

use super::{Completion, report};
use crate::context::TargetContext;
use crate::error::Result;
use crate::interactive::TerminalPrompter;

/// Arguments of `plinth install`.
#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
    pub plugins: Vec<String>,
    pub options: Vec<String>,
    pub force: bool,
    pub jobs: Option<usize>,
    pub timeout: Option<u64>,
    pub dry_run: bool,
    pub yes: bool,
}

pub fn run_install(context: &TargetContext, args: InstallArgs, cancel: CancelFlag) -> Result<Completion> {
    let mut orchestrator = context.orchestrator(cancel)?;
    if let Some(prompter) = TerminalPrompter::if_interactive(args.yes) {
        orchestrator = orchestrator.with_prompter(prompter);
    }

    let request = InstallRequest {
        plugins: args.plugins,
        options: args.options,
        force: args.force,
        dry_run: args.dry_run,
        jobs: args.jobs,
        step_timeout: args.timeout.map(Duration::from_secs),
    };
    let report = orchestrator.install(&request)?;
    Ok(report::finish(&report))
}

pub fn run_resume(
    context: &TargetContext,
    jobs: Option<usize>,
    timeout: Option<u64>,
    dry_run: bool,
    cancel: CancelFlag,
) -> Result<Completion> {
    let orchestrator = context.orchestrator(cancel)?;
    let request = ResumeRequest {
        dry_run,
        jobs,
        step_timeout: timeout.map(Duration::from_secs),
    };
    let report = orchestrator.resume(&request)?;
    Ok(report::finish(&report))
}
