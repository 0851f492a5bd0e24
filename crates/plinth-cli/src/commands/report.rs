//! Human-readable rendering of plans and run results.

use colored::Colorize;
use plinth_core::{InstallationPlan, OutcomeKind, PlanAction, RunReport, RunResult};

use super::Completion;

pub fn print_plan(plan: &InstallationPlan) {
    if plan.entries.is_empty() {
        println!("{}", "Nothing to do.".dimmed());
        return;
    }
    let width = plan
        .entries
        .iter()
        .map(|e| e.plugin_id.len())
        .max()
        .unwrap_or(0);

    println!("{}", "Plan:".bold());
    for (index, entry) in plan.entries.iter().enumerate() {
        let action = match entry.action {
            PlanAction::Skip => "skip ".dimmed(),
            PlanAction::Apply => "apply".green(),
        };
        let mut detail = entry.state.to_string();
        if entry.action == PlanAction::Apply && entry.start_step > 0 {
            detail.push_str(&format!(
                ", resume at step {}/{}",
                entry.start_step, entry.total_steps
            ));
        }
        println!(
            "  {:>2}. {}  {}  ({})",
            index + 1,
            format!("{:<width$}", entry.plugin_id).cyan(),
            action,
            detail.dimmed()
        );
    }

    for conflict in &plan.conflicts {
        println!("  {} {}", "conflict:".red().bold(), conflict);
    }
    for warning in &plan.warnings {
        println!("  {} {}", "warning:".yellow(), warning);
    }
}

pub fn print_result(result: &RunResult) {
    println!();
    println!("{}", "Result:".bold());
    for outcome in &result.outcomes {
        let marker = match &outcome.kind {
            OutcomeKind::Completed | OutcomeKind::Skipped => "✓".green(),
            OutcomeKind::Interrupted => "-".yellow(),
            OutcomeKind::Failed { .. } | OutcomeKind::Blocked { .. } => "✗".red(),
        };
        println!("  {} {} {}", marker, outcome.plugin_id.cyan(), outcome.kind);
    }
    for warning in &result.warnings {
        println!("  {} {}", "warning:".yellow(), warning);
    }
    println!();
    println!(
        "{} step(s) run, {} change(s) made",
        result.steps_executed, result.mutations
    );
}

/// Print a finished run and decide the exit status.
pub fn finish(report: &RunReport) -> Completion {
    print_plan(&report.plan);
    let Some(result) = &report.result else {
        println!();
        println!("{}", "Dry run: nothing was changed.".dimmed());
        return Completion::Done;
    };
    print_result(result);

    if result.is_success() {
        println!("{}", "All plugins installed.".green().bold());
        return Completion::Done;
    }

    let attention: Vec<&str> = result
        .outcomes
        .iter()
        .filter(|o| !o.is_satisfied())
        .map(|o| o.plugin_id.as_str())
        .collect();
    println!(
        "{} {}",
        "Needs attention:".yellow().bold(),
        attention.join(", ")
    );
    println!("Fix the cause and run {} to continue.", "plinth resume".cyan());
    Completion::NeedsAttention
}
