//! Manifest loading.
//!
//! A manifest is a catalog of plugins keyed by id:
//!
//! ```toml
//! version = 1
//!
//! [plugins.foundation]
//! category = "foundation"
//! declared_outputs = [".editorconfig"]
//!
//! [[plugins.foundation.steps]]
//! type = "copy-file"
//! args = { destination = ".editorconfig", source = "templates/editorconfig" }
//! ```
//!
//! The same document may be written as YAML or JSON; the format follows the
//! file extension.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result, ValidationError, Violation};
use crate::plugin::{Payload, Plugin, Step};
use crate::validation::{unknown_placeholders, validate_plugins};

/// Manifest document version understood by this crate.
pub const MANIFEST_VERSION: u32 = 1;

/// Default manifest filename at a target repository root.
pub const DEFAULT_MANIFEST_FILENAME: &str = "plinth.toml";

/// Serialization format of a structured document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Yaml,
    Json,
}

impl Format {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
            Self::Json => "JSON",
        }
    }

    /// Deserialize `content` in this format. Errors are rendered to text.
    pub fn parse<T: DeserializeOwned>(self, content: &str) -> std::result::Result<T, String> {
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }

    /// Parse `content` into a format-neutral value tree.
    pub fn parse_value(self, content: &str) -> std::result::Result<serde_json::Value, String> {
        self.parse(content)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default, deserialize_with = "unique_plugins")]
    plugins: BTreeMap<String, Plugin>,
}

/// Deserialize the plugin table, rejecting repeated ids in every format
/// (JSON objects would otherwise keep the last duplicate silently).
fn unique_plugins<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, Plugin>, D::Error>
where
    D: Deserializer<'de>,
{
    struct UniqueVisitor;

    impl<'de> Visitor<'de> for UniqueVisitor {
        type Value = BTreeMap<String, Plugin>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a table of plugins keyed by id")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut plugins = BTreeMap::new();
            while let Some((id, plugin)) = map.next_entry::<String, Plugin>()? {
                if plugins.contains_key(&id) {
                    return Err(serde::de::Error::custom(format!(
                        "duplicate plugin id '{id}'"
                    )));
                }
                plugins.insert(id, plugin);
            }
            Ok(plugins)
        }
    }

    deserializer.deserialize_map(UniqueVisitor)
}

/// A validated, immutable plugin catalog.
#[derive(Debug, Clone)]
pub struct Manifest {
    plugins: BTreeMap<String, Plugin>,
    base_dir: PathBuf,
    source: String,
    path: Option<PathBuf>,
}

impl Manifest {
    /// Load and validate a manifest file.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the file does not exist
    /// - [`Error::UnsupportedFormat`] for unknown extensions
    /// - [`Error::Parse`] for syntax errors, unknown keys and duplicate ids
    /// - [`Error::Validation`] listing every rule violation
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = Format::from_path(path).ok_or_else(|| Error::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })?;
        let content = plinth_fs::io::read_text_optional(path)?
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))?;

        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        tracing::debug!(path = %path.display(), %format, "loading manifest");
        let mut manifest =
            Self::parse_with_source(&content, format, base_dir, path.display().to_string())?;
        manifest.path = Some(path.to_path_buf());
        Ok(manifest)
    }

    /// Parse and validate manifest text. `source` payload paths resolve
    /// against `base_dir`.
    pub fn parse(content: &str, format: Format, base_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::parse_with_source(content, format, base_dir.into(), "<inline>".to_string())
    }

    fn parse_with_source(
        content: &str,
        format: Format,
        base_dir: PathBuf,
        source: String,
    ) -> Result<Self> {
        let document: Document = format.parse(content).map_err(|message| Error::Parse {
            source_name: format!("{source} ({format})"),
            message,
        })?;

        let mut violations = Vec::new();
        if let Some(found) = document.version {
            if found != MANIFEST_VERSION {
                violations.push(Violation::UnsupportedVersion { found });
            }
        }

        Self::build(document.plugins, base_dir, source, violations)
    }

    /// Build a manifest from already-constructed plugins, running the same
    /// validation as [`Manifest::load`].
    pub fn from_plugins(
        plugins: impl IntoIterator<Item = Plugin>,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let plugins = plugins.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self::build(plugins, base_dir.into(), "<memory>".to_string(), Vec::new())
    }

    fn build(
        mut plugins: BTreeMap<String, Plugin>,
        base_dir: PathBuf,
        source: String,
        mut violations: Vec<Violation>,
    ) -> Result<Self> {
        for (id, plugin) in plugins.iter_mut() {
            plugin.id = id.clone();
        }

        violations.extend(validate_plugins(&plugins));
        violations.extend(check_sources(&plugins, &base_dir));

        if !violations.is_empty() {
            return Err(ValidationError { source, violations }.into());
        }

        tracing::debug!(plugins = plugins.len(), %source, "manifest validated");
        Ok(Self {
            plugins,
            base_dir,
            source,
            path: None,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Plugin> {
        self.plugins.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.plugins.contains_key(id)
    }

    /// Plugins in id order.
    pub fn plugins(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Directory `source` payloads are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Where the manifest was loaded from, for messages.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// File the manifest was loaded from; `None` when built in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw (unrendered) payload of a file step.
    ///
    /// Returns `Ok(None)` for steps without a payload.
    pub fn read_payload(&self, plugin: &Plugin, step: &Step) -> Result<Option<String>> {
        match step.payload() {
            Some(Payload::Inline(text)) => Ok(Some(text.to_string())),
            Some(Payload::Source(source)) => {
                let path = plinth_fs::confine(&self.base_dir, source).map_err(|e| {
                    Error::Payload {
                        plugin: plugin.id.clone(),
                        path: source.to_string(),
                        source: e,
                    }
                })?;
                plinth_fs::io::read_text(&path)
                    .map(Some)
                    .map_err(|e| Error::Payload {
                        plugin: plugin.id.clone(),
                        path: source.to_string(),
                        source: e,
                    })
            }
            None => Ok(None),
        }
    }
}

/// Source payloads must exist; templated ones may only use known
/// placeholders.
fn check_sources(plugins: &BTreeMap<String, Plugin>, base_dir: &Path) -> Vec<Violation> {
    let mut violations = Vec::new();
    for plugin in plugins.values() {
        for (index, step) in plugin.steps.iter().enumerate() {
            let Some(Payload::Source(source)) = step.payload() else {
                continue;
            };
            // Invalid paths are reported by validation.
            let Ok(path) = plinth_fs::confine(base_dir, source) else {
                continue;
            };
            if !path.is_file() {
                violations.push(Violation::InvalidStep {
                    plugin: plugin.id.clone(),
                    step: index,
                    reason: format!("source '{}' not found in {}", source, base_dir.display()),
                });
                continue;
            }
            if !step.is_templated() {
                continue;
            }
            match plinth_fs::io::read_text(&path) {
                Ok(text) => violations.extend(unknown_placeholders(plugin, index, &text)),
                Err(e) => violations.push(Violation::InvalidStep {
                    plugin: plugin.id.clone(),
                    step: index,
                    reason: format!("source '{source}' cannot be read: {e}"),
                }),
            }
        }
    }
    violations
}
