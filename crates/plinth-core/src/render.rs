//! Rendering of step arguments with resolved option values.

use std::collections::BTreeMap;

use plinth_manifest::template;
use plinth_manifest::{Manifest, Plugin, RunCommand, Step};

use crate::Result;

/// Placeholder values for one plugin.
pub(crate) fn values(plugin: &Plugin, options: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    template::context(&plugin.id, options)
}

/// Payload a file step should produce, rendered when the step asks for it.
pub(crate) fn payload(
    manifest: &Manifest,
    plugin: &Plugin,
    step: &Step,
    values: &BTreeMap<String, String>,
) -> Result<Option<String>> {
    let templated = match step {
        Step::CopyFile(copy) => copy.template,
        Step::AppendFile(append) => append.template,
        _ => false,
    };
    let raw = manifest.read_payload(plugin, step)?;
    Ok(raw.map(|text| {
        if templated {
            template::render(&text, values)
        } else {
            text
        }
    }))
}

/// Command line of a run-command step.
pub(crate) fn command(run: &RunCommand, values: &BTreeMap<String, String>) -> String {
    template::render(&run.command, values)
}
