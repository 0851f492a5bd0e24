//! Collision checks between plugins that are about to be applied.
//!
//! Two plugins conflict when both are marked `apply` and they declare the
//! same output path or the same namespace token. Conflicts are diagnostic:
//! any conflict stops the run before the first mutation.

use std::collections::BTreeSet;
use std::fmt;

use plinth_manifest::Manifest;
use serde::Serialize;

use crate::plan::InstallationPlan;

/// What two plugins collide on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Collision {
    Output(String),
    NamespaceToken(String),
}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output(path) => write!(f, "output '{path}'"),
            Self::NamespaceToken(token) => write!(f, "namespace token '{token}'"),
        }
    }
}

/// A pair of plugins, in plan order, and what they collide on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub first: String,
    pub second: String,
    pub collision: Collision,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "plugins '{}' and '{}' both declare {}",
            self.first, self.second, self.collision
        )
    }
}

fn normalized_outputs(outputs: &BTreeSet<String>) -> BTreeSet<String> {
    outputs
        .iter()
        .map(|o| plinth_fs::validate_repo_relative(o).unwrap_or_else(|_| o.clone()))
        .collect()
}

/// Every conflict between `apply` entries of `plan`.
pub fn check(plan: &InstallationPlan, manifest: &Manifest) -> Vec<Conflict> {
    let applying: Vec<_> = plan
        .to_apply()
        .filter_map(|entry| manifest.get(&entry.plugin_id))
        .map(|plugin| (plugin, normalized_outputs(&plugin.declared_outputs)))
        .collect();

    let mut conflicts = Vec::new();
    for (i, (first, first_outputs)) in applying.iter().enumerate() {
        for (second, second_outputs) in &applying[i + 1..] {
            for path in first_outputs.intersection(second_outputs) {
                conflicts.push(Conflict {
                    first: first.id.clone(),
                    second: second.id.clone(),
                    collision: Collision::Output(path.clone()),
                });
            }
            for token in first
                .declared_namespace_tokens
                .intersection(&second.declared_namespace_tokens)
            {
                conflicts.push(Conflict {
                    first: first.id.clone(),
                    second: second.id.clone(),
                    collision: Collision::NamespaceToken(token.clone()),
                });
            }
        }
    }

    for conflict in &conflicts {
        tracing::warn!("{conflict}");
    }
    conflicts
}
