//! Integration tests that analyze the script trees under `tests/fixtures/`.

use std::path::{Path, PathBuf};

use pslint_testutil::fixture::{load_fixtures, run_fixtures};
use rstest::rstest;

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures")
}

#[test]
fn all_fixtures_pass() {
    let cases = load_fixtures(&fixtures_root()).expect("fixtures directory should be readable");
    assert!(!cases.is_empty(), "no fixtures found under {}", fixtures_root().display());

    let summary = run_fixtures(&cases);
    println!("{summary}");
    assert!(summary.all_passed(), "{summary}");
    assert_eq!(summary.skipped(), 0, "every fixture should declare expectations");
}

#[rstest]
#[case::forward_reference("ForwardReference")]
#[case::undefined_command("UndefinedCommand")]
#[case::redefinition("Redefinition")]
#[case::dot_source_include("DotSourceInclude")]
#[case::sibling_isolation("SiblingIsolation")]
#[case::cyclic_include("CyclicInclude")]
#[case::recursive_function("RecursiveFunction")]
#[case::syntax_recovery("SyntaxRecovery")]
#[case::function_body_include("FunctionBodyInclude")]
#[case::depth_limit("DepthLimit")]
fn fixture(#[case] name: &str) {
    let cases = load_fixtures(&fixtures_root()).expect("fixtures directory should be readable");
    let case = cases
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("fixture {name} not found"));

    let verdict = case.run();
    assert!(verdict.is_pass(), "{name}: {verdict}");
}
