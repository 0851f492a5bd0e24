//! Interactive prompts for `ask_user` options
//!
//! Uses dialoguer for terminal-based selection.

use std::io::IsTerminal;

use dialoguer::{Input, Select};
use plinth_manifest::{OptionSpec, Prompter};

/// Asks on the terminal. Prompt failures keep the default.
pub struct TerminalPrompter;

impl TerminalPrompter {
    /// A prompter, unless prompts are disabled or stdin is not a terminal.
    pub fn if_interactive(disabled: bool) -> Option<Box<dyn Prompter>> {
        if disabled || !std::io::stdin().is_terminal() {
            return None;
        }
        Some(Box::new(Self))
    }
}

fn prompt_text(plugin_id: &str, name: &str, spec: &OptionSpec) -> String {
    match &spec.description {
        Some(description) => format!("{plugin_id}: {name} ({description})"),
        None => format!("{plugin_id}: {name}"),
    }
}

impl Prompter for TerminalPrompter {
    fn choose(&self, plugin_id: &str, name: &str, spec: &OptionSpec) -> Option<String> {
        let prompt = prompt_text(plugin_id, name, spec);
        let answer = if spec.allowed.is_empty() {
            Input::<String>::new()
                .with_prompt(prompt)
                .default(spec.default.clone())
                .interact_text()
        } else {
            let default = spec
                .allowed
                .iter()
                .position(|v| *v == spec.default)
                .unwrap_or(0);
            Select::new()
                .with_prompt(prompt)
                .items(&spec.allowed)
                .default(default)
                .interact()
                .map(|index| spec.allowed[index].clone())
        };
        match answer {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(plugin = plugin_id, option = name, error = %e, "prompt failed, using default");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_prompts_yield_no_prompter() {
        assert!(TerminalPrompter::if_interactive(true).is_none());
    }

    #[test]
    fn prompt_mentions_description() {
        let spec = OptionSpec {
            allowed: vec!["3.11".to_string(), "3.12".to_string()],
            default: "3.12".to_string(),
            ask_user: true,
            description: Some("interpreter".to_string()),
        };
        assert_eq!(
            prompt_text("lang-python", "python_version", &spec),
            "lang-python: python_version (interpreter)"
        );
    }
}
