//! State detection from declared probes.

use std::collections::BTreeMap;

use plinth_core::{DetectedState, Detection, DetectionBasis, Detector, ProbeOutcome};
use plinth_test_utils::TestRepo;
use pretty_assertions::assert_eq;
use rstest::rstest;

const PROBED: &str = r#"
version = 1

[plugins.probed]
category = "standard"

[[plugins.probed.probes]]
type = "file-exists"
path = "marker.txt"

[[plugins.probed.probes]]
type = "file-contains"
path = "notes.md"
marker = "ready"

[[plugins.probed.probes]]
type = "config-key"
path = "tool.toml"
key = "tool.name"
"#;

fn detect(repo: &TestRepo) -> Detection {
    let manifest = repo.manifest();
    let plugin = manifest.get("probed").unwrap();
    Detector::new(repo.root(), &manifest).detect(plugin, &BTreeMap::new(), None)
}

#[rstest]
#[case::all_pass(&[("marker.txt", ""), ("notes.md", "ready\n"), ("tool.toml", "[tool]\nname = \"x\"\n")], DetectedState::Installed)]
#[case::mixed(&[("marker.txt", ""), ("notes.md", "not yet\n")], DetectedState::Partial)]
#[case::one_of_three(&[("tool.toml", "[tool]\nname = \"x\"\n")], DetectedState::Partial)]
#[case::all_fail(&[], DetectedState::Absent)]
#[case::wrong_content(&[("notes.md", "draft\n"), ("tool.toml", "[other]\n")], DetectedState::Absent)]
fn probes_classify_state(#[case] files: &[(&str, &str)], #[case] expected: DetectedState) {
    let repo = TestRepo::with_manifest(PROBED);
    for (path, content) in files {
        repo.write_file(path, content);
    }

    let detection = detect(&repo);
    assert_eq!(detection.basis, DetectionBasis::Probes);
    assert_eq!(detection.probes.len(), 3);
    assert_eq!(detection.state, expected);
    assert!(detection.warnings.is_empty(), "{:?}", detection.warnings);
}

#[test]
fn unreadable_config_is_partial_with_warning() {
    let repo = TestRepo::with_manifest(PROBED);
    repo.write_file("marker.txt", "");
    repo.write_file("notes.md", "ready\n");
    repo.write_file("tool.toml", "[tool\nname = ");

    let detection = detect(&repo);
    assert_eq!(detection.state, DetectedState::Partial);
    assert!(matches!(detection.probes[2].outcome, ProbeOutcome::Error(_)));
    assert_eq!(detection.warnings.len(), 1);
    assert!(detection.warnings[0].contains("probed"), "{}", detection.warnings[0]);
    assert!(detection.warnings[0].contains("tool.toml"), "{}", detection.warnings[0]);
}

#[test]
fn error_outweighs_all_other_failures() {
    let repo = TestRepo::with_manifest(PROBED);
    repo.write_file("tool.toml", "not = [valid");

    let detection = detect(&repo);
    assert_eq!(detection.state, DetectedState::Partial);
    assert_eq!(detection.warnings.len(), 1);
}
