//! `validate-manifest` command

use std::path::Path;

use colored::Colorize;
use plinth_manifest::Manifest;

use crate::error::Result;

/// Load and validate `path`; every violation is reported on failure.
pub fn run_validate_manifest(path: &Path) -> Result<()> {
    let manifest = Manifest::load(path)?;
    println!(
        "{} {} ({} plugin(s))",
        "✓".green(),
        path.display(),
        manifest.len()
    );
    for plugin in manifest.plugins() {
        let dependencies: Vec<&str> = plugin.dependencies.iter().map(String::as_str).collect();
        if dependencies.is_empty() {
            println!("  {} [{}]", plugin.id.cyan(), plugin.category);
        } else {
            println!(
                "  {} [{}] -> {}",
                plugin.id.cyan(),
                plugin.category,
                dependencies.join(", ").dimmed()
            );
        }
    }
    Ok(())
}
