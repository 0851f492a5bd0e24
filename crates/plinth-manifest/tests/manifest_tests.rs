//! Loading and validating manifests from disk.

use std::fs;

use plinth_manifest::{Error, Format, Manifest, Step, Violation};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;

const CATALOG_TOML: &str = r#"
version = 1

[plugins.foundation]
category = "foundation"
declared_outputs = [".editorconfig", ".plinth-foundation"]

[[plugins.foundation.steps]]
type = "copy-file"
args = { destination = ".editorconfig", source = "templates/editorconfig" }

[[plugins.foundation.probes]]
type = "file-exists"
path = ".plinth-foundation"

[plugins.lang-python]
category = "language"
dependencies = ["foundation"]
declared_outputs = [".python-version"]

[plugins.lang-python.options.python_version]
allowed = ["3.11", "3.12"]
default = "3.12"

[[plugins.lang-python.steps]]
type = "copy-file"
args = { destination = ".python-version", content = "{{python_version}}\n", template = true }
"#;

const CATALOG_YAML: &str = r#"
version: 1
plugins:
  foundation:
    category: foundation
    declared_outputs: [".editorconfig", ".plinth-foundation"]
    steps:
      - type: copy-file
        args: { destination: ".editorconfig", source: "templates/editorconfig" }
    probes:
      - type: file-exists
        path: .plinth-foundation
  lang-python:
    category: language
    dependencies: [foundation]
    declared_outputs: [".python-version"]
    options:
      python_version: { allowed: ["3.11", "3.12"], default: "3.12" }
    steps:
      - type: copy-file
        args: { destination: ".python-version", content: "{{python_version}}\n", template: true }
"#;

const CATALOG_JSON: &str = r#"{
  "version": 1,
  "plugins": {
    "foundation": {
      "category": "foundation",
      "declared_outputs": [".editorconfig", ".plinth-foundation"],
      "steps": [
        {"type": "copy-file", "args": {"destination": ".editorconfig", "source": "templates/editorconfig"}}
      ],
      "probes": [{"type": "file-exists", "path": ".plinth-foundation"}]
    },
    "lang-python": {
      "category": "language",
      "dependencies": ["foundation"],
      "declared_outputs": [".python-version"],
      "options": {"python_version": {"allowed": ["3.11", "3.12"], "default": "3.12"}},
      "steps": [
        {"type": "copy-file", "args": {"destination": ".python-version", "content": "{{python_version}}\n", "template": true}}
      ]
    }
  }
}"#;

fn catalog_dir(file: &str, content: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("templates")).unwrap();
    fs::write(dir.path().join("templates/editorconfig"), "root = true\n").unwrap();
    fs::write(dir.path().join(file), content).unwrap();
    dir
}

fn violations(err: Error) -> Vec<Violation> {
    match err {
        Error::Validation(e) => e.violations,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[rstest]
#[case("plinth.toml", CATALOG_TOML)]
#[case("plinth.yaml", CATALOG_YAML)]
#[case("plinth.json", CATALOG_JSON)]
fn every_format_loads_the_same_catalog(#[case] file: &str, #[case] content: &str) {
    let dir = catalog_dir(file, content);
    let manifest = Manifest::load(dir.path().join(file)).unwrap();

    assert_eq!(manifest.ids().collect::<Vec<_>>(), vec!["foundation", "lang-python"]);
    assert_eq!(manifest.base_dir(), dir.path());

    let python = manifest.get("lang-python").unwrap();
    assert!(python.dependencies.contains("foundation"));
    assert_eq!(python.options["python_version"].default, "3.12");

    let foundation = manifest.get("foundation").unwrap();
    let payload = manifest
        .read_payload(foundation, &foundation.steps[0])
        .unwrap();
    assert_eq!(payload.as_deref(), Some("root = true\n"));
}

#[test]
fn checksums_match_across_formats() {
    let toml_dir = catalog_dir("plinth.toml", CATALOG_TOML);
    let json_dir = catalog_dir("plinth.json", CATALOG_JSON);
    let from_toml = Manifest::load(toml_dir.path().join("plinth.toml")).unwrap();
    let from_json = Manifest::load(json_dir.path().join("plinth.json")).unwrap();

    for id in ["foundation", "lang-python"] {
        assert_eq!(
            from_toml.get(id).unwrap().definition_checksum(),
            from_json.get(id).unwrap().definition_checksum()
        );
    }
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = Manifest::load(dir.path().join("plinth.toml")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = catalog_dir("plinth.ini", "");
    let err = Manifest::load(dir.path().join("plinth.ini")).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat { .. }));
}

#[rstest]
#[case::top_level("colour = 'blue'")]
#[case::plugin("[plugins.a]\ncategory = 'standard'\nprioirty = 1")]
#[case::category("[plugins.a]\ncategory = 'misc'")]
#[case::step("[plugins.a]\ncategory = 'standard'\n[[plugins.a.steps]]\ntype = 'delete-file'\nargs = { path = 'x' }")]
#[case::probe("[plugins.a]\ncategory = 'standard'\n[[plugins.a.probes]]\ntype = 'file-exists'\npath = 'x'\nmarker = 'y'")]
fn unknown_keys_fail_closed(#[case] content: &str) {
    let err = Manifest::parse(content, Format::Toml, ".").unwrap_err();
    assert!(matches!(err, Error::Parse { .. }), "{err:?}");
}

#[test]
fn toml_duplicate_ids_are_a_parse_error() {
    let content = "[plugins.a]\ncategory = 'standard'\n[plugins.a]\ncategory = 'language'\n";
    let err = Manifest::parse(content, Format::Toml, ".").unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
}

#[test]
fn cycles_are_rejected_with_members() {
    let content = r#"
[plugins.a]
category = "standard"
dependencies = ["b"]

[plugins.b]
category = "standard"
dependencies = ["c"]

[plugins.c]
category = "standard"
dependencies = ["a"]

[plugins.d]
category = "standard"
dependencies = ["d", "a"]
"#;
    let found = violations(Manifest::parse(content, Format::Toml, ".").unwrap_err());
    assert_eq!(
        found,
        vec![
            Violation::SelfDependency {
                plugin: "d".to_string()
            },
            Violation::DependencyCycle {
                cycle: vec!["a", "b", "c", "a"].into_iter().map(String::from).collect()
            },
        ]
    );
}

#[test]
fn every_violation_is_collected() {
    let content = r#"
[plugins."bad id"]
category = "standard"

[plugins.tool]
category = "infrastructure"
dependencies = ["ghost"]
declared_outputs = ["../outside", "Makefile", "settings.json"]

[plugins.tool.options.mode]
allowed = ["fast", "slow"]
default = "medium"

[[plugins.tool.steps]]
type = "copy-file"
args = { destination = "undeclared.txt", content = "x" }

[[plugins.tool.steps]]
type = "copy-file"
args = { destination = "Makefile" }

[[plugins.tool.steps]]
type = "append-file"
args = { destination = "Makefile", content = "a" }

[[plugins.tool.steps]]
type = "append-file"
args = { destination = "Makefile", content = "b" }

[[plugins.tool.steps]]
type = "append-file"
args = { destination = "settings.json", content = "{}" }

[[plugins.tool.steps]]
type = "run-command"
args = { command = "make {{target}}" }

[[plugins.tool.probes]]
type = "command-version"
command = "make"
expect = "not a version"
"#;
    let found = violations(Manifest::parse(content, Format::Toml, ".").unwrap_err());
    let rendered: Vec<String> = found.iter().map(ToString::to_string).collect();

    let expect = [
        "invalid plugin id 'bad id'",
        "depends on unknown plugin 'ghost'",
        "default 'medium' is not one of [fast, slow]",
        "invalid path '../outside'",
        "writes 'undeclared.txt' which is not in declared_outputs",
        "step 1: exactly one of 'source' or 'content' is required",
        "two append-file steps for block 'tool' in 'Makefile'",
        "'settings.json' has no comment syntax",
        "unknown placeholder '{{target}}'",
        "invalid version requirement 'not a version'",
    ];
    for needle in expect {
        assert!(
            rendered.iter().any(|r| r.contains(needle)),
            "missing violation containing {needle:?} in {rendered:#?}"
        );
    }
}

#[test]
fn plugin_id_placeholder_is_built_in() {
    let content = r#"
[plugins.tool]
category = "standard"

[[plugins.tool.steps]]
type = "run-command"
args = { command = "echo {{plugin_id}}" }
"#;
    let manifest = Manifest::parse(content, Format::Toml, ".").unwrap();
    assert!(matches!(
        manifest.get("tool").unwrap().steps[0],
        Step::RunCommand(_)
    ));
}

#[test]
fn missing_source_payload_is_a_violation() {
    let dir = tempfile::tempdir().unwrap();
    let content = r#"
[plugins.tool]
category = "standard"
declared_outputs = ["out.txt"]

[[plugins.tool.steps]]
type = "copy-file"
args = { destination = "out.txt", source = "templates/missing.txt" }
"#;
    fs::write(dir.path().join("plinth.toml"), content).unwrap();
    let found = violations(Manifest::load(dir.path().join("plinth.toml")).unwrap_err());
    assert_eq!(found.len(), 1);
    assert!(found[0].to_string().contains("templates/missing.txt"));
}

#[test]
fn templated_source_payload_is_scanned_for_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("templates")).unwrap();
    fs::write(
        dir.path().join("templates/pyproject.toml"),
        "requires-python = \">={{python_version}}\"\nname = \"{{project}}\"\n",
    )
    .unwrap();
    let content = r#"
[plugins.tool]
category = "language"
declared_outputs = ["pyproject.toml"]

[plugins.tool.options.python_version]
default = "3.12"

[[plugins.tool.steps]]
type = "copy-file"
args = { destination = "pyproject.toml", source = "templates/pyproject.toml", template = true }
"#;
    fs::write(dir.path().join("plinth.toml"), content).unwrap();

    let found = violations(Manifest::load(dir.path().join("plinth.toml")).unwrap_err());
    assert_eq!(found.len(), 1);
    assert!(
        matches!(&found[0], Violation::UnknownPlaceholder { step: 0, name, .. } if name == "project"),
        "{found:?}"
    );
}

#[test]
fn plain_source_payload_is_not_scanned() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("templates")).unwrap();
    fs::write(dir.path().join("templates/README.md"), "Use {{handlebars}} here\n").unwrap();
    let content = r#"
[plugins.docs]
category = "standard"
declared_outputs = ["README.md"]

[[plugins.docs.steps]]
type = "copy-file"
args = { destination = "README.md", source = "templates/README.md" }
"#;
    fs::write(dir.path().join("plinth.toml"), content).unwrap();
    assert!(Manifest::load(dir.path().join("plinth.toml")).is_ok());
}

#[test]
fn placeholders_in_paths_are_rejected() {
    let content = r#"
[plugins.tool]
category = "standard"
declared_outputs = ["{{name}}.txt"]

[plugins.tool.options.name]
default = "x"
"#;
    let found = violations(Manifest::parse(content, Format::Toml, ".").unwrap_err());
    assert!(matches!(found[0], Violation::InvalidPath { .. }));
}
