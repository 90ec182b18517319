//! Fixture script parser and runner.
//!
//! A fixture is a directory holding `Main.ps1` plus whatever it dot-sources.
//! The leading comment lines of `Main.ps1` declare expectations:
//!
//! ```text
//! # ResolutionErrors = 1
//! # Expect = DoesNotExist is not defined
//! # Functions = Build, Test
//! ```
//!
//! Recognized keys: `SyntaxErrors`, `ResolutionErrors`, `Unsupported`
//! (counts), `Expect` (a message that must be reported, repeatable),
//! `Functions` (exact set of defined functions, case-insensitive), and
//! `MaxDepth` (analyzer depth limit). Comment lines without `=` are ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pslint_engine::analysis::{AnalysisResult, Analyzer, Diagnostic};
use pslint_engine::registry::CommandRegistry;

use crate::{Check, Summary, Verdict};

/// Entry script name inside each fixture directory.
pub const ENTRY: &str = "Main.ps1";

/// What a fixture declares analysis should report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixtureExpectation {
    pub syntax_errors: Option<usize>,
    pub resolution_errors: Option<usize>,
    pub unsupported: Option<usize>,
    pub messages: Vec<String>,
    pub functions: Option<Vec<String>>,
    pub max_depth: Option<usize>,
}

impl FixtureExpectation {
    /// True when the header declared nothing to check.
    pub fn is_empty(&self) -> bool {
        self.syntax_errors.is_none()
            && self.resolution_errors.is_none()
            && self.unsupported.is_none()
            && self.messages.is_empty()
            && self.functions.is_none()
    }
}

/// A single fixture.
#[derive(Debug, Clone)]
pub struct FixtureCase {
    /// Directory name.
    pub name: String,
    /// Path of the entry script.
    pub path: PathBuf,
    /// Parsed header, or why it could not be parsed.
    pub expected: Result<FixtureExpectation, String>,
}

/// Parse the `# Key = Value` header of a fixture script.
pub fn parse_header(content: &str) -> Result<FixtureExpectation, String> {
    let mut expected = FixtureExpectation::default();

    for (index, line) in content.lines().enumerate() {
        let Some(comment) = line.trim().strip_prefix('#') else {
            break;
        };
        let Some((key, value)) = comment.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let count = || {
            value
                .parse::<usize>()
                .map_err(|e| format!("line {}: bad count {value:?}: {e}", index + 1))
        };

        match key.trim() {
            "SyntaxErrors" => expected.syntax_errors = Some(count()?),
            "ResolutionErrors" => expected.resolution_errors = Some(count()?),
            "Unsupported" => expected.unsupported = Some(count()?),
            "MaxDepth" => expected.max_depth = Some(count()?),
            "Expect" => expected.messages.push(value.to_string()),
            "Functions" => {
                let names = value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
                expected.functions = Some(names);
            }
            other => return Err(format!("line {}: unknown key {other:?}", index + 1)),
        }
    }

    Ok(expected)
}

/// Load every fixture directory under `root`, sorted by name.
pub fn load_fixtures(root: &Path) -> io::Result<Vec<FixtureCase>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.join(ENTRY).is_file())
        .collect();
    dirs.sort();

    dirs.into_iter()
        .map(|dir| {
            let path = dir.join(ENTRY);
            let content = fs::read_to_string(&path)?;
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(FixtureCase {
                name,
                path,
                expected: parse_header(&content),
            })
        })
        .collect()
}

impl FixtureCase {
    /// Analyze the entry script with the built-in command set and compare.
    pub fn run(&self) -> Verdict {
        let expected = match &self.expected {
            Ok(expected) if expected.is_empty() => return Verdict::Skip,
            Ok(expected) => expected,
            Err(message) => return Verdict::Broken(message.clone()),
        };

        let commands = CommandRegistry::with_builtins().list_external_commands(&[]);
        let mut analyzer = Analyzer::new(commands);
        if let Some(depth) = expected.max_depth {
            analyzer = analyzer.with_max_depth(depth);
        }

        match analyzer.analyze(&self.path) {
            Ok(result) => compare(expected, &result),
            Err(err) => Verdict::Broken(err.to_string()),
        }
    }
}

/// Check `result` against each declared expectation, stopping at the first miss.
pub fn compare(expected: &FixtureExpectation, result: &AnalysisResult) -> Verdict {
    let counts = [
        (Check::SyntaxErrors, expected.syntax_errors, result.syntax_errors.len()),
        (Check::ResolutionErrors, expected.resolution_errors, result.resolution_errors.len()),
        (Check::Unsupported, expected.unsupported, result.unsupported.len()),
    ];
    for (check, want, got) in counts {
        match want {
            Some(want) if want != got => {
                return Verdict::Mismatch {
                    check,
                    expected: want.to_string(),
                    actual: format!("{got} ({})", describe(result)),
                };
            }
            _ => {}
        }
    }

    for message in &expected.messages {
        if !result.all_diagnostics().any(|d| d.message() == message.as_str()) {
            return Verdict::Mismatch {
                check: Check::Expect,
                expected: message.clone(),
                actual: describe(result),
            };
        }
    }

    if let Some(functions) = &expected.functions {
        let mut want: Vec<String> = functions.iter().map(|f| f.to_lowercase()).collect();
        want.sort();
        let got: Vec<String> = result.local_functions().keys().cloned().collect();
        if want != got {
            return Verdict::Mismatch {
                check: Check::Functions,
                expected: want.join(", "),
                actual: got.join(", "),
            };
        }
    }

    Verdict::Pass
}

fn describe(result: &AnalysisResult) -> String {
    let messages: Vec<String> = result.all_diagnostics().map(Diagnostic::to_string).collect();
    if messages.is_empty() {
        "no diagnostics".to_string()
    } else {
        messages.join("; ")
    }
}

/// Run all fixtures and return a summary.
pub fn run_fixtures(cases: &[FixtureCase]) -> Summary {
    let mut summary = Summary::new();
    for case in cases {
        summary.record(&case.name, case.run());
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use pslint_engine::vfs::MemoryFs;

    fn analyze(script: &str) -> AnalysisResult {
        let commands = CommandRegistry::with_builtins().list_external_commands(&[]);
        Analyzer::new(commands)
            .with_fs(MemoryFs::new().with_file("/f/Main.ps1", script))
            .analyze("/f/Main.ps1")
            .expect("entry script is readable")
    }

    #[test]
    fn count_mismatch_names_its_key() {
        let expected = parse_header("# SyntaxErrors = 0\n# ResolutionErrors = 0\n").expect("header parses");
        let verdict = compare(&expected, &analyze("Invoke-Missing\n"));

        let Verdict::Mismatch { check, expected, actual } = verdict else {
            panic!("expected a mismatch, got {verdict:?}");
        };
        assert_eq!(check, Check::ResolutionErrors);
        assert_eq!(expected, "0");
        assert!(actual.starts_with("1 ("), "{actual}");
        assert!(actual.contains("Invoke-Missing is not defined"), "{actual}");
    }

    #[test]
    fn missing_message_and_function_set_name_their_keys() {
        let result = analyze("function Build { }\nBuild\n");

        let expected = parse_header("# Expect = Build is not defined\n").expect("header parses");
        assert!(matches!(
            compare(&expected, &result),
            Verdict::Mismatch { check: Check::Expect, .. }
        ));

        let expected = parse_header("# Functions = Build, Test\n").expect("header parses");
        assert_eq!(
            compare(&expected, &result),
            Verdict::Mismatch {
                check: Check::Functions,
                expected: "build, test".into(),
                actual: "build".into(),
            }
        );

        let expected = parse_header("# ResolutionErrors = 0\n# Functions = BUILD\n").expect("header parses");
        assert_eq!(compare(&expected, &result), Verdict::Pass);
    }

    #[test]
    fn parse_counts_and_messages() {
        let content = "# A fixture about includes\n\
                       # ResolutionErrors = 1\n\
                       # Expect = DoesNotExist is not defined\n\
                       # Functions = Build, Test\n\
                       Build\n\
                       # SyntaxErrors = 9\n";
        let expected = parse_header(content).expect("header parses");
        assert_eq!(expected.resolution_errors, Some(1));
        assert_eq!(expected.syntax_errors, None);
        assert_eq!(expected.messages, vec!["DoesNotExist is not defined"]);
        assert_eq!(expected.functions, Some(vec!["Build".to_string(), "Test".to_string()]));
    }

    #[test]
    fn unknown_key_is_an_error() {
        let err = parse_header("# Warnings = 2\n").expect_err("unknown key");
        assert!(err.contains("Warnings"));
    }

    #[test]
    fn bad_count_is_an_error() {
        assert!(parse_header("# ResolutionErrors = many\n").is_err());
    }

    #[test]
    fn no_header_is_empty() {
        let expected = parse_header("Write-Host hi\n").expect("empty header");
        assert!(expected.is_empty());
    }
}
