//! `{{name}}` placeholder scanning and rendering.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Name of the placeholder that is always available.
pub const PLUGIN_ID_PLACEHOLDER: &str = "plugin_id";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_\-]*)\s*\}\}").unwrap());

/// Render context for one plugin: its resolved options plus `plugin_id`.
pub fn context(plugin_id: &str, options: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut values = options.clone();
    values.insert(PLUGIN_ID_PLACEHOLDER.to_string(), plugin_id.to_string());
    values
}

/// Names of every placeholder in `text`, in order of appearance.
pub fn placeholders(text: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Replace each `{{name}}` with its value. Unknown names are left untouched;
/// validation guarantees they do not occur in a loaded manifest.
pub fn render(text: &str, values: &BTreeMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            match values.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn values() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("python_version".to_string(), "3.12".to_string()),
            ("plugin_id".to_string(), "lang-python".to_string()),
        ])
    }

    #[test]
    fn finds_placeholders_with_whitespace() {
        assert_eq!(
            placeholders("uv python pin {{ python_version }} # {{plugin_id}}"),
            vec!["python_version", "plugin_id"]
        );
    }

    #[test]
    fn renders_known_and_keeps_unknown() {
        assert_eq!(
            render("{{python_version}}/{{missing}}/{{plugin_id}}", &values()),
            "3.12/{{missing}}/lang-python"
        );
    }

    #[test]
    fn single_braces_are_not_placeholders() {
        assert!(placeholders("fn main() { {x} }").is_empty());
    }
}
