//! Option assignments and per-plugin option resolution.
//!
//! Precedence for each declared option, highest first:
//!
//! 1. an explicit assignment (`plugin.name=value` beats `name=value`)
//! 2. the value recorded in progress by an earlier run
//! 3. an interactive answer, for `ask_user` options only
//! 4. the declared default

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::plugin::{OptionSpec, Plugin};

/// Problem with a user-supplied option value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionProblem {
    #[error("malformed option '{input}' (expected name=value or plugin.name=value)")]
    Malformed { input: String },

    #[error("option '{name}' is not declared by any plugin being installed")]
    UnknownOption { name: String },

    #[error("plugin '{plugin}' declares no option '{name}'")]
    UndeclaredOption { plugin: String, name: String },

    #[error("option '{assignment}' targets plugin '{plugin}' which is not being installed")]
    PluginNotPlanned { plugin: String, assignment: String },

    #[error("plugin '{plugin}' option '{name}': '{value}' is not one of [{}]", .allowed.join(", "))]
    NotAllowed {
        plugin: String,
        name: String,
        value: String,
        allowed: Vec<String>,
    },
}

/// One `--option` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionAssignment {
    /// Target plugin; `None` applies to every plugin declaring `name`.
    pub plugin: Option<String>,
    pub name: String,
    pub value: String,
}

impl FromStr for OptionAssignment {
    type Err = OptionProblem;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = || OptionProblem::Malformed {
            input: input.to_string(),
        };
        let (key, value) = input.split_once('=').ok_or_else(malformed)?;
        let key = key.trim();
        // Plugin ids may contain dots; option names may not.
        let (plugin, name) = match key.rsplit_once('.') {
            Some((plugin, name)) => (Some(plugin.to_string()), name),
            None => (None, key),
        };
        if name.is_empty() || plugin.as_deref().is_some_and(str::is_empty) {
            return Err(malformed());
        }
        Ok(Self {
            plugin,
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

impl fmt::Display for OptionAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.plugin {
            Some(plugin) => write!(f, "{plugin}.{}={}", self.name, self.value),
            None => write!(f, "{}={}", self.name, self.value),
        }
    }
}

/// Parse every assignment, collecting all malformed inputs.
pub fn parse_assignments<S: AsRef<str>>(
    inputs: &[S],
) -> Result<Vec<OptionAssignment>, Vec<OptionProblem>> {
    let mut parsed = Vec::new();
    let mut problems = Vec::new();
    for input in inputs {
        match input.as_ref().parse() {
            Ok(assignment) => parsed.push(assignment),
            Err(problem) => problems.push(problem),
        }
    }
    if problems.is_empty() {
        Ok(parsed)
    } else {
        Err(problems)
    }
}

/// Source of interactive answers for `ask_user` options.
pub trait Prompter {
    /// Ask for a value. `None` keeps the default.
    fn choose(&self, plugin_id: &str, name: &str, spec: &OptionSpec) -> Option<String>;
}

/// Check that every assignment targets a planned plugin and a declared option.
pub fn check_assignments(
    assignments: &[OptionAssignment],
    planned: &[&Plugin],
) -> Vec<OptionProblem> {
    let mut problems = Vec::new();
    for assignment in assignments {
        match &assignment.plugin {
            Some(plugin_id) => match planned.iter().find(|p| &p.id == plugin_id) {
                None => problems.push(OptionProblem::PluginNotPlanned {
                    plugin: plugin_id.clone(),
                    assignment: assignment.to_string(),
                }),
                Some(plugin) if !plugin.options.contains_key(&assignment.name) => {
                    problems.push(OptionProblem::UndeclaredOption {
                        plugin: plugin_id.clone(),
                        name: assignment.name.clone(),
                    });
                }
                Some(_) => {}
            },
            None => {
                if !planned
                    .iter()
                    .any(|p| p.options.contains_key(&assignment.name))
                {
                    problems.push(OptionProblem::UnknownOption {
                        name: assignment.name.clone(),
                    });
                }
            }
        }
    }
    problems
}

/// Resolve every declared option of `plugin`.
///
/// Recorded values that are no longer allowed (the manifest changed) are
/// ignored rather than reported.
pub fn resolve_options(
    plugin: &Plugin,
    assignments: &[OptionAssignment],
    recorded: Option<&BTreeMap<String, String>>,
    prompter: Option<&dyn Prompter>,
) -> Result<BTreeMap<String, String>, Vec<OptionProblem>> {
    let mut resolved = BTreeMap::new();
    let mut problems = Vec::new();

    for (name, spec) in &plugin.options {
        let explicit = assignments
            .iter()
            .filter(|a| &a.name == name)
            .filter(|a| a.plugin.as_deref().is_none_or(|p| p == plugin.id))
            .max_by_key(|a| a.plugin.is_some())
            .map(|a| a.value.clone());

        let value = if let Some(value) = explicit {
            if !spec.accepts(&value) {
                problems.push(OptionProblem::NotAllowed {
                    plugin: plugin.id.clone(),
                    name: name.clone(),
                    value: value.clone(),
                    allowed: spec.allowed.clone(),
                });
            }
            value
        } else if let Some(value) = recorded
            .and_then(|r| r.get(name))
            .filter(|v| spec.accepts(v))
        {
            value.clone()
        } else if let Some(value) = prompter
            .filter(|_| spec.ask_user)
            .and_then(|p| p.choose(&plugin.id, name, spec))
        {
            if !spec.accepts(&value) {
                problems.push(OptionProblem::NotAllowed {
                    plugin: plugin.id.clone(),
                    name: name.clone(),
                    value: value.clone(),
                    allowed: spec.allowed.clone(),
                });
            }
            value
        } else {
            spec.default.clone()
        };

        tracing::debug!(plugin = %plugin.id, option = %name, %value, "resolved option");
        resolved.insert(name.clone(), value);
    }

    if problems.is_empty() {
        Ok(resolved)
    } else {
        Err(problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Category;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn python() -> Plugin {
        let mut plugin: Plugin = toml::from_str(
            r#"
category = "language"

[options.python_version]
allowed = ["3.11", "3.12", "3.13"]
default = "3.12"
ask_user = true

[options.layout]
default = "src"
"#,
        )
        .unwrap();
        plugin.id = "lang-python".to_string();
        plugin
    }

    struct Always(&'static str);

    impl Prompter for Always {
        fn choose(&self, _: &str, _: &str, _: &OptionSpec) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[rstest]
    #[case("python_version=3.13", None, "python_version", "3.13")]
    #[case("lang-python.layout=flat", Some("lang-python"), "layout", "flat")]
    #[case("org.tool.mode=a=b", Some("org.tool"), "mode", "a=b")]
    fn parses_assignments(
        #[case] input: &str,
        #[case] plugin: Option<&str>,
        #[case] name: &str,
        #[case] value: &str,
    ) {
        let parsed: OptionAssignment = input.parse().unwrap();
        assert_eq!(parsed.plugin.as_deref(), plugin);
        assert_eq!(parsed.name, name);
        assert_eq!(parsed.value, value);
    }

    #[rstest]
    #[case("novalue")]
    #[case("=x")]
    #[case(".name=x")]
    fn rejects_malformed_assignments(#[case] input: &str) {
        assert!(matches!(
            input.parse::<OptionAssignment>(),
            Err(OptionProblem::Malformed { .. })
        ));
    }

    #[test]
    fn precedence_explicit_recorded_prompt_default() {
        let plugin = python();
        let recorded = BTreeMap::from([("python_version".to_string(), "3.11".to_string())]);

        let explicit = vec!["python_version=3.13".parse().unwrap()];
        let values = resolve_options(&plugin, &explicit, Some(&recorded), Some(&Always("3.12")))
            .unwrap();
        assert_eq!(values["python_version"], "3.13");

        let values = resolve_options(&plugin, &[], Some(&recorded), Some(&Always("3.13"))).unwrap();
        assert_eq!(values["python_version"], "3.11");

        let values = resolve_options(&plugin, &[], None, Some(&Always("3.13"))).unwrap();
        assert_eq!(values["python_version"], "3.13");
        // `layout` is not ask_user, so the prompter is not consulted.
        assert_eq!(values["layout"], "src");

        let values = resolve_options(&plugin, &[], None, None).unwrap();
        assert_eq!(values["python_version"], "3.12");
    }

    #[test]
    fn plugin_scoped_assignment_wins_over_global() {
        let plugin = python();
        let assignments = vec![
            "lang-python.python_version=3.11".parse().unwrap(),
            "python_version=3.13".parse().unwrap(),
        ];
        let values = resolve_options(&plugin, &assignments, None, None).unwrap();
        assert_eq!(values["python_version"], "3.11");
    }

    #[test]
    fn disallowed_value_is_reported() {
        let plugin = python();
        let assignments = vec!["python_version=2.7".parse().unwrap()];
        let problems = resolve_options(&plugin, &assignments, None, None).unwrap_err();
        assert_eq!(
            problems,
            vec![OptionProblem::NotAllowed {
                plugin: "lang-python".to_string(),
                name: "python_version".to_string(),
                value: "2.7".to_string(),
                allowed: vec!["3.11".into(), "3.12".into(), "3.13".into()],
            }]
        );
    }

    #[test]
    fn stale_recorded_value_falls_back_to_default() {
        let plugin = python();
        let recorded = BTreeMap::from([("python_version".to_string(), "3.9".to_string())]);
        let values = resolve_options(&plugin, &[], Some(&recorded), None).unwrap();
        assert_eq!(values["python_version"], "3.12");
    }

    #[test]
    fn check_assignments_reports_every_problem() {
        let plugin = python();
        let mut other: Plugin = toml::from_str(r#"category = "foundation""#).unwrap();
        other.id = "foundation".to_string();
        assert_eq!(other.category, Category::Foundation);

        let assignments = vec![
            "python_version=3.12".parse().unwrap(),
            "colour=blue".parse().unwrap(),
            "foundation.layout=x".parse().unwrap(),
            "std-docs.theme=dark".parse().unwrap(),
        ];
        let problems = check_assignments(&assignments, &[&plugin, &other]);
        assert_eq!(problems.len(), 3);
        assert!(matches!(problems[0], OptionProblem::UnknownOption { .. }));
        assert!(matches!(problems[1], OptionProblem::UndeclaredOption { .. }));
        assert!(matches!(problems[2], OptionProblem::PluginNotPlanned { .. }));
    }
}
