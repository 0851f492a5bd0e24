//! Installation plan: what will happen to each plugin, in order.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::conflict::Conflict;
use crate::detector::DetectedState;

/// What the executor does with a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    /// Already installed; only the progress record is updated.
    Skip,
    /// Absent or partial; run the remaining steps.
    Apply,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skip => "skip",
            Self::Apply => "apply",
        })
    }
}

/// One plugin of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub plugin_id: String,
    pub action: PlanAction,
    pub state: DetectedState,
    /// Resolved option values
    pub options: BTreeMap<String, String>,
    /// Named on the command line rather than pulled in as a dependency
    pub requested: bool,
    /// Dependency depth; entries on one level never depend on each other
    pub level: usize,
    /// Index of the first step to run (resume point)
    pub start_step: usize,
    pub total_steps: usize,
}

/// Ordered plan produced before any mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallationPlan {
    pub entries: Vec<PlanEntry>,
    /// Detection warnings
    pub warnings: Vec<String>,
    /// Conflicts found between `apply` entries
    pub conflicts: Vec<Conflict>,
}

impl InstallationPlan {
    pub fn get(&self, plugin_id: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.plugin_id == plugin_id)
    }

    /// Plugin ids in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.plugin_id.as_str()).collect()
    }

    /// Entries that will run steps.
    pub fn to_apply(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.action == PlanAction::Apply)
    }

    pub fn is_noop(&self) -> bool {
        self.to_apply().next().is_none()
    }

    /// Entries grouped by dependency level, each group in plan order.
    pub fn levels(&self) -> Vec<Vec<&PlanEntry>> {
        let depth = self.entries.iter().map(|e| e.level + 1).max().unwrap_or(0);
        let mut levels = vec![Vec::new(); depth];
        for entry in &self.entries {
            levels[entry.level].push(entry);
        }
        levels
    }
}
