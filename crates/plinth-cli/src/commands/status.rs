//! Status command implementation

use colored::{ColoredString, Colorize};
use plinth_core::{CancelFlag, DetectedState, PluginStatus, StatusEntry};

use crate::context::TargetContext;
use crate::error::Result;

fn status_label(status: PluginStatus) -> ColoredString {
    let text = format!("{:<12}", status.as_str());
    match status {
        PluginStatus::Complete => text.green(),
        PluginStatus::InProgress => text.yellow(),
        PluginStatus::Failed => text.red(),
        PluginStatus::NotStarted => text.dimmed(),
    }
}

fn detected_label(detected: Option<DetectedState>) -> ColoredString {
    let text = match detected {
        Some(state) => format!("{:<16}", state.to_string()),
        None => format!("{:<16}", "not in manifest"),
    };
    match detected {
        Some(DetectedState::Installed) => text.green(),
        Some(DetectedState::Partial) => text.yellow(),
        Some(DetectedState::Absent) => text.dimmed(),
        None => text.red(),
    }
}

/// Run the status command
pub fn run_status(context: &TargetContext, json: bool) -> Result<()> {
    let orchestrator = context.orchestrator(CancelFlag::new())?;
    let entries = orchestrator.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{}", "Plugin Status".bold());
    println!();
    println!("{}:     {}", "Target".dimmed(), orchestrator.root().display());
    println!("{}:   {}", "Manifest".dimmed(), orchestrator.manifest().source());
    println!();
    if entries.is_empty() {
        println!("  {}", "No plugins".dimmed());
        return Ok(());
    }

    let width = entries.iter().map(|e| e.plugin_id.len()).max().unwrap_or(0);
    for entry in &entries {
        print_entry(entry, width);
    }
    Ok(())
}

fn print_entry(entry: &StatusEntry, width: usize) {
    let steps = match entry.total_steps {
        Some(total) => format!("{}/{total} steps", entry.completed_steps),
        None => format!("{} steps", entry.completed_steps),
    };
    println!(
        "  {}  {} {} {}",
        format!("{:<width$}", entry.plugin_id).cyan(),
        status_label(entry.status),
        detected_label(entry.detected),
        steps.dimmed()
    );
    if entry.definition_changed {
        println!("      {}", "definition changed since last run".yellow());
    }
    if let Some(failure) = &entry.last_failure {
        println!(
            "      {} step {}: {}",
            "last failure:".red(),
            failure.step,
            failure.message
        );
    }
    for warning in &entry.warnings {
        println!("      {} {}", "warning:".yellow(), warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_test_utils::{TestRepo, catalog};

    #[test]
    fn status_without_progress() {
        let repo = TestRepo::with_manifest(catalog::STANDARD);
        let context = TargetContext::resolve(Some(repo.root()), None).unwrap();
        assert!(run_status(&context, false).is_ok());
        assert!(run_status(&context, true).is_ok());
        repo.assert_file_not_exists(".plinth");
    }

    #[test]
    fn status_without_manifest_fails() {
        let repo = TestRepo::new();
        let context = TargetContext::resolve(Some(repo.root()), None).unwrap();
        assert!(run_status(&context, false).is_err());
    }
}
