//! Manifest validation.
//!
//! Validation never stops at the first problem: every violation in the
//! manifest is collected so a single `validate-manifest` run reports them all.

use std::collections::{BTreeMap, BTreeSet};

use plinth_blocks::CommentStyle;

use crate::error::Violation;
use crate::plugin::{Payload, Plugin, Probe, Step};
use crate::template::{PLUGIN_ID_PLACEHOLDER, placeholders};

/// Check a plugin id: non-empty ASCII alphanumerics, `-`, `_` and `.`.
pub fn validate_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("id cannot be empty".to_string());
    }
    if id.starts_with('.') || id.ends_with('.') {
        return Err("id cannot start or end with '.'".to_string());
    }
    match id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        Some(c) => Err(format!("character '{c}' is not allowed")),
        None => Ok(()),
    }
}

/// Validate every plugin of a catalog.
pub fn validate_plugins(plugins: &BTreeMap<String, Plugin>) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (id, plugin) in plugins {
        if let Err(reason) = validate_id(id) {
            violations.push(Violation::InvalidId {
                id: id.clone(),
                reason,
            });
        }
        check_dependencies(plugin, plugins, &mut violations);
        check_options(plugin, &mut violations);
        let outputs = check_declared_outputs(plugin, &mut violations);
        check_steps(plugin, &outputs, &mut violations);
        check_probes(plugin, &mut violations);
    }

    for cycle in dependency_cycles(plugins) {
        violations.push(Violation::DependencyCycle { cycle });
    }

    violations
}

fn check_dependencies(
    plugin: &Plugin,
    plugins: &BTreeMap<String, Plugin>,
    violations: &mut Vec<Violation>,
) {
    for dependency in &plugin.dependencies {
        if dependency == &plugin.id {
            violations.push(Violation::SelfDependency {
                plugin: plugin.id.clone(),
            });
        } else if !plugins.contains_key(dependency) {
            violations.push(Violation::UnknownDependency {
                plugin: plugin.id.clone(),
                dependency: dependency.clone(),
            });
        }
    }
}

fn check_options(plugin: &Plugin, violations: &mut Vec<Violation>) {
    for (name, spec) in &plugin.options {
        if name.contains('.') || name.contains('=') || name.is_empty() {
            violations.push(Violation::InvalidId {
                id: format!("{}.{name}", plugin.id),
                reason: "option names cannot be empty or contain '.' or '='".to_string(),
            });
        }
        if !spec.accepts(&spec.default) {
            violations.push(Violation::DefaultNotAllowed {
                plugin: plugin.id.clone(),
                option: name.clone(),
                default: spec.default.clone(),
                allowed: spec.allowed.clone(),
            });
        }
    }
}

/// Returns the normalized set of valid declared outputs.
fn check_declared_outputs(plugin: &Plugin, violations: &mut Vec<Violation>) -> BTreeSet<String> {
    let mut outputs = BTreeSet::new();
    for output in &plugin.declared_outputs {
        if let Some(normalized) = check_path(plugin, "declared_outputs", output, violations) {
            outputs.insert(normalized);
        }
    }
    outputs
}

fn check_path(
    plugin: &Plugin,
    location: &str,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Option<String> {
    let result = if !placeholders(path).is_empty() {
        Err("placeholders are not allowed in paths".to_string())
    } else {
        plinth_fs::validate_repo_relative(path)
    };
    match result {
        Ok(normalized) => Some(normalized),
        Err(reason) => {
            violations.push(Violation::InvalidPath {
                plugin: plugin.id.clone(),
                location: location.to_string(),
                path: path.to_string(),
                reason,
            });
            None
        }
    }
}

fn check_steps(plugin: &Plugin, outputs: &BTreeSet<String>, violations: &mut Vec<Violation>) {
    let mut blocks: BTreeSet<(String, String)> = BTreeSet::new();

    for (index, step) in plugin.steps.iter().enumerate() {
        let location = format!("step {index} ({})", step.kind());
        let invalid = |reason: &str| Violation::InvalidStep {
            plugin: plugin.id.clone(),
            step: index,
            reason: reason.to_string(),
        };

        if let Some(target) = step.target() {
            if let Some(normalized) = check_path(plugin, &location, target, violations) {
                if !outputs.contains(&normalized) {
                    violations.push(Violation::UndeclaredOutput {
                        plugin: plugin.id.clone(),
                        step: index,
                        path: target.to_string(),
                    });
                }
            }
        }

        match step {
            Step::CopyFile(_) | Step::AppendFile(_) => match step.payload() {
                Some(Payload::Source(source)) => {
                    check_path(plugin, &format!("{location} source"), source, violations);
                }
                Some(Payload::Inline(_)) => {}
                None => violations.push(invalid("exactly one of 'source' or 'content' is required")),
            },
            Step::RunCommand(run) => {
                if run.command.trim().is_empty() {
                    violations.push(invalid("command cannot be empty"));
                }
                if let Some(cwd) = &run.cwd {
                    check_path(plugin, &format!("{location} cwd"), cwd, violations);
                }
                if run.timeout_secs == Some(0) {
                    violations.push(invalid("timeout_secs must be greater than zero"));
                }
            }
            Step::EnsureDirectory(_) => {}
        }

        if let Step::AppendFile(append) = step {
            if CommentStyle::for_path(&append.destination).is_none() {
                violations.push(invalid(&format!(
                    "'{}' has no comment syntax for managed blocks",
                    append.destination
                )));
            }
            let block_id = append.block_id(&plugin.id);
            if !plinth_blocks::is_valid_block_id(&block_id) {
                violations.push(invalid(&format!("invalid block name '{block_id}'")));
            }
            let destination = plinth_fs::validate_repo_relative(&append.destination)
                .unwrap_or_else(|_| append.destination.clone());
            if !blocks.insert((destination.clone(), block_id.clone())) {
                violations.push(Violation::DuplicateBlock {
                    plugin: plugin.id.clone(),
                    destination,
                    block: block_id,
                });
            }
        }

        let rendered = match step {
            Step::RunCommand(run) => Some(run.command.as_str()),
            _ if step.is_templated() => match step.payload() {
                Some(Payload::Inline(text)) => Some(text),
                // Source payloads are scanned when they are read.
                _ => None,
            },
            _ => None,
        };
        if let Some(text) = rendered {
            violations.extend(unknown_placeholders(plugin, index, text));
        }
    }
}

/// Placeholders in `text` that are neither built in nor options of `plugin`.
pub(crate) fn unknown_placeholders(plugin: &Plugin, step: usize, text: &str) -> Vec<Violation> {
    placeholders(text)
        .into_iter()
        .filter(|name| *name != PLUGIN_ID_PLACEHOLDER && !plugin.options.contains_key(*name))
        .map(|name| Violation::UnknownPlaceholder {
            plugin: plugin.id.clone(),
            step,
            name: name.to_string(),
        })
        .collect()
}

fn check_probes(plugin: &Plugin, violations: &mut Vec<Violation>) {
    for (index, probe) in plugin.probes.iter().enumerate() {
        if let Some(path) = probe.path() {
            check_path(plugin, &format!("probe {index}"), path, violations);
        }
        match probe {
            Probe::CommandVersion {
                command, expect, ..
            } => {
                if command.trim().is_empty() {
                    violations.push(Violation::InvalidVersionRequirement {
                        plugin: plugin.id.clone(),
                        probe: index,
                        requirement: expect.clone(),
                        reason: "command cannot be empty".to_string(),
                    });
                }
                if let Err(e) = semver::VersionReq::parse(expect) {
                    violations.push(Violation::InvalidVersionRequirement {
                        plugin: plugin.id.clone(),
                        probe: index,
                        requirement: expect.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            Probe::FileContains { marker, .. } if marker.is_empty() => {
                violations.push(Violation::InvalidPath {
                    plugin: plugin.id.clone(),
                    location: format!("probe {index}"),
                    path: probe.path().unwrap_or_default().to_string(),
                    reason: "marker cannot be empty".to_string(),
                });
            }
            Probe::ConfigKey { key, .. } if key.split('.').any(str::is_empty) => {
                violations.push(Violation::InvalidPath {
                    plugin: plugin.id.clone(),
                    location: format!("probe {index}"),
                    path: key.clone(),
                    reason: "dotted key has an empty segment".to_string(),
                });
            }
            _ => {}
        }
    }
}

/// Every distinct dependency cycle, each rotated to start at its smallest id
/// and closed (`[a, b, a]`).
///
/// Depth-first search over known dependencies; a back edge to a node on the
/// recursion stack closes a cycle.
pub fn dependency_cycles(plugins: &BTreeMap<String, Plugin>) -> Vec<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    fn visit<'a>(
        id: &'a str,
        plugins: &'a BTreeMap<String, Plugin>,
        marks: &mut BTreeMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        cycles: &mut BTreeSet<Vec<String>>,
    ) {
        marks.insert(id, Mark::OnStack);
        stack.push(id);

        if let Some(plugin) = plugins.get(id) {
            for dependency in &plugin.dependencies {
                // Self edges are reported separately.
                if dependency == id || !plugins.contains_key(dependency) {
                    continue;
                }
                match marks.get(dependency.as_str()).copied().unwrap_or(Mark::Unvisited) {
                    Mark::Unvisited => visit(dependency, plugins, marks, stack, cycles),
                    Mark::OnStack => {
                        if let Some(start) = stack.iter().position(|s| *s == dependency.as_str()) {
                            cycles.insert(canonical_cycle(&stack[start..]));
                        }
                    }
                    Mark::Done => {}
                }
            }
        }

        stack.pop();
        marks.insert(id, Mark::Done);
    }

    let mut marks = BTreeMap::new();
    let mut cycles = BTreeSet::new();
    for id in plugins.keys() {
        if marks.get(id.as_str()).copied().unwrap_or(Mark::Unvisited) == Mark::Unvisited {
            let mut stack = Vec::new();
            visit(id, plugins, &mut marks, &mut stack, &mut cycles);
        }
    }
    cycles.into_iter().collect()
}

fn canonical_cycle(members: &[&str]) -> Vec<String> {
    let start = members
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut cycle: Vec<String> = members[start..]
        .iter()
        .chain(&members[..start])
        .map(|s| s.to_string())
        .collect();
    if let Some(first) = cycle.first().cloned() {
        cycle.push(first);
    }
    cycle
}
