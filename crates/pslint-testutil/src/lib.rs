//! Test utilities for pslint.
//!
//! Provides the fixture runner used by the engine's integration tests:
//! - `tests/fixtures/<Case>/Main.ps1`: a script tree whose leading
//!   `# Key = Value` comment lines declare what analysis should report

pub mod fixture;

use std::fmt;

/// A header key whose expectation can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    SyntaxErrors,
    ResolutionErrors,
    Unsupported,
    Expect,
    Functions,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Check::SyntaxErrors => "SyntaxErrors",
            Check::ResolutionErrors => "ResolutionErrors",
            Check::Unsupported => "Unsupported",
            Check::Expect => "Expect",
            Check::Functions => "Functions",
        })
    }
}

/// How one fixture went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// The header declared nothing to check.
    Skip,
    /// The first declared check that did not hold.
    Mismatch {
        check: Check,
        expected: String,
        actual: String,
    },
    /// Malformed header or unreadable entry script.
    Broken(String),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Verdict::Mismatch { .. } | Verdict::Broken(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("pass"),
            Verdict::Skip => f.write_str("skipped, no expectations declared"),
            Verdict::Mismatch { check, expected, actual } => {
                write!(f, "{check}: expected {expected}, got {actual}")
            }
            Verdict::Broken(message) => write!(f, "broken: {message}"),
        }
    }
}

/// Verdicts of a fixture run, in the order they were recorded.
#[derive(Debug, Default)]
pub struct Summary {
    verdicts: Vec<(String, Verdict)>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: impl Into<String>, verdict: Verdict) {
        self.verdicts.push((name.into(), verdict));
    }

    fn count(&self, keep: impl Fn(&Verdict) -> bool) -> usize {
        self.verdicts.iter().filter(|(_, v)| keep(v)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(Verdict::is_pass)
    }

    pub fn failed(&self) -> usize {
        self.count(Verdict::is_failure)
    }

    pub fn skipped(&self) -> usize {
        self.count(|v| matches!(v, Verdict::Skip))
    }

    pub fn total(&self) -> usize {
        self.verdicts.len()
    }

    /// Failing fixtures with their verdicts.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Verdict)> {
        self.verdicts
            .iter()
            .filter(|(_, v)| v.is_failure())
            .map(|(name, v)| (name.as_str(), v))
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "fixtures: {} passed, {} failed, {} skipped of {}",
            self.passed(),
            self.failed(),
            self.skipped(),
            self.total()
        )?;
        for (name, verdict) in self.failures() {
            writeln!(f, "  {name}: {verdict}")?;
        }
        Ok(())
    }
}
