//! Golden DOM fixtures stored as TOML or JSON manifests.
//!
//! Each manifest carries a `format` header and a list of cases. The expected
//! tree is the line-based snapshot format of `dom_handler::dom_snapshot`.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const FIXTURE_FORMAT_V1: &str = "dom-fixture-v1";

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FixtureStatus {
    #[default]
    Active,
    Xfail,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FixtureOptions {
    pub xml_mode: bool,
    pub normalize_whitespace: bool,
    pub with_indices: bool,
    pub with_dom_lvl1: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FixtureCase {
    pub id: String,
    pub input: String,
    #[serde(default)]
    pub options: FixtureOptions,
    pub expected: String,
    #[serde(default)]
    pub status: FixtureStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

impl FixtureCase {
    /// Expected snapshot lines; trailing whitespace and blank lines are ignored.
    pub fn expected_lines(&self) -> Vec<String> {
        self.expected
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
struct FixtureManifest {
    format: String,
    cases: Vec<FixtureCase>,
}

#[derive(Clone, Debug)]
pub struct LoadedFixture {
    pub path: PathBuf,
    pub case: FixtureCase,
}

/// Load every `*.toml` and `*.json` manifest under `dir`, sorted by path.
///
/// Panics on unreadable files, unknown formats, duplicate ids, or an xfail
/// case without a reason.
pub fn load_fixture_dir(dir: &Path) -> Vec<LoadedFixture> {
    let entries = fs::read_dir(dir)
        .unwrap_or_else(|err| panic!("failed to read fixture dir {dir:?}: {err}"));
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("toml") | Some("json")
            )
        })
        .collect();
    paths.sort();

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for path in paths {
        for case in load_manifest(&path) {
            assert!(
                seen.insert(case.id.clone()),
                "duplicate fixture id '{}' in {path:?}",
                case.id
            );
            out.push(LoadedFixture {
                path: path.clone(),
                case,
            });
        }
    }
    out
}

pub fn load_manifest(path: &Path) -> Vec<FixtureCase> {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read fixture manifest {path:?}: {err}"));
    let manifest: FixtureManifest = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .unwrap_or_else(|err| panic!("failed to parse fixture JSON {path:?}: {err}")),
        _ => toml::from_str(&content)
            .unwrap_or_else(|err| panic!("failed to parse fixture TOML {path:?}: {err}")),
    };
    assert_eq!(
        manifest.format, FIXTURE_FORMAT_V1,
        "unsupported fixture format in {path:?}"
    );
    for case in &manifest.cases {
        assert!(
            case.status == FixtureStatus::Active || case.reason.is_some(),
            "xfail fixture '{}' in {path:?} needs a reason",
            case.id
        );
        assert!(
            case.expected_lines()
                .first()
                .is_some_and(|line| line.starts_with("#document")),
            "fixture '{}' in {path:?} must start with #document",
            case.id
        );
    }
    manifest.cases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_manifests_decode_to_the_same_cases() {
        let toml_src = r#"
format = "dom-fixture-v1"

[[cases]]
id = "one"
input = "<p>x"
options = { with_indices = true }
expected = """
#document
  <p>
"""
"#;
        let json_src = r##"{
  "format": "dom-fixture-v1",
  "cases": [
    { "id": "one", "input": "<p>x", "options": { "with_indices": true },
      "expected": "#document\n  <p>\n" }
  ]
}"##;
        let from_toml: FixtureManifest = toml::from_str(toml_src).expect("toml");
        let from_json: FixtureManifest = serde_json::from_str(json_src).expect("json");
        assert_eq!(from_toml, from_json);
        let case = &from_toml.cases[0];
        assert!(case.options.with_indices);
        assert!(!case.options.xml_mode);
        assert_eq!(case.status, FixtureStatus::Active);
        assert_eq!(case.expected_lines(), vec!["#document", "  <p>"]);
    }

    #[test]
    fn unknown_option_keys_are_rejected() {
        let src = r##"
format = "dom-fixture-v1"
[[cases]]
id = "bad"
input = ""
options = { xmlmode = true }
expected = "#document"
"##;
        assert!(toml::from_str::<FixtureManifest>(src).is_err());
    }
}
