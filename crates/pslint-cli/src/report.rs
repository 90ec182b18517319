//! Rendering analysis results.
//!
//! Results from every root script are collected into one [`Report`].
//! Identical diagnostics reached through several roots (a shared library
//! dot-sourced by two scripts, say) are listed once, in the order first seen.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ariadne::{Config, IndexType, Label, ReportKind, Source};
use serde::Serialize;

use pslint_engine::analysis::{AnalysisResult, Category, Diagnostic};

const SYNTAX_HEADING: &str = "Parse errors found:";
const RESOLUTION_HEADING: &str = "Issues found:";
const UNSUPPORTED_HEADING: &str =
    "This tool does not support 100% of PowerShell syntax. Please check the following areas manually:";

/// Deduplicated diagnostics for a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    files: Vec<PathBuf>,
    syntax_errors: Vec<Diagnostic>,
    resolution_errors: Vec<Diagnostic>,
    unsupported: Vec<Diagnostic>,
    #[serde(skip)]
    seen: HashSet<Diagnostic>,
    #[serde(skip)]
    base: PathBuf,
}

#[derive(Serialize)]
struct Summary {
    syntax_errors: usize,
    resolution_errors: usize,
    unsupported: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a Report,
    summary: Summary,
}

impl Report {
    /// Start an empty report. Paths are shown relative to `base` where possible.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            ..Self::default()
        }
    }

    /// Add the result of analyzing one root script.
    pub fn add(&mut self, root: &Path, result: &AnalysisResult) {
        self.files.push(root.to_path_buf());
        for diagnostic in result.all_diagnostics() {
            if !self.seen.insert(diagnostic.clone()) {
                continue;
            }
            let list = match diagnostic.category() {
                Category::Syntax => &mut self.syntax_errors,
                Category::Resolution => &mut self.resolution_errors,
                Category::Unsupported => &mut self.unsupported,
            };
            list.push(diagnostic.clone());
        }
    }

    pub fn syntax_errors(&self) -> &[Diagnostic] {
        &self.syntax_errors
    }

    pub fn resolution_errors(&self) -> &[Diagnostic] {
        &self.resolution_errors
    }

    pub fn unsupported(&self) -> &[Diagnostic] {
        &self.unsupported
    }

    /// True when nothing would fail at run time.
    pub fn is_clean(&self) -> bool {
        self.syntax_errors.is_empty() && self.resolution_errors.is_empty()
    }

    fn sections(&self) -> [(&'static str, &[Diagnostic]); 3] {
        [
            (SYNTAX_HEADING, &self.syntax_errors),
            (RESOLUTION_HEADING, &self.resolution_errors),
            (UNSUPPORTED_HEADING, &self.unsupported),
        ]
    }

    /// `./relative/path` under the base directory, the full path otherwise.
    pub fn display_path(&self, path: &Path) -> String {
        match path.strip_prefix(&self.base) {
            Ok(relative) => format!("./{}", relative.display()),
            Err(_) => path.display().to_string(),
        }
    }

    /// Plain text, one section per category.
    pub fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        for (heading, diagnostics) in self.sections() {
            if diagnostics.is_empty() {
                continue;
            }
            writeln!(out, "{heading}")?;
            for diagnostic in diagnostics {
                let location = diagnostic.location();
                writeln!(
                    out,
                    "{} in file {}",
                    diagnostic.message(),
                    self.display_path(location.file())
                )?;
                let text = location.text().lines().next().unwrap_or_default();
                writeln!(out, "{}:    {}", location.line(), text)?;
            }
            writeln!(out)?;
        }
        writeln!(out, "Complete")
    }

    pub fn write_json(&self, out: &mut dyn Write) -> io::Result<()> {
        let json = JsonReport {
            report: self,
            summary: Summary {
                syntax_errors: self.syntax_errors.len(),
                resolution_errors: self.resolution_errors.len(),
                unsupported: self.unsupported.len(),
            },
        };
        serde_json::to_writer_pretty(&mut *out, &json)?;
        writeln!(out)
    }

    /// Source excerpts with labels. Falls back to the text form for
    /// diagnostics whose file can no longer be read.
    pub fn write_pretty(&self, out: &mut dyn Write, color: bool) -> io::Result<()> {
        let mut sources: HashMap<PathBuf, Option<String>> = HashMap::new();
        let config = Config::default()
            .with_index_type(IndexType::Byte)
            .with_color(color);

        for (_, diagnostics) in self.sections() {
            for diagnostic in diagnostics {
                let location = diagnostic.location();
                let text = sources
                    .entry(location.file().to_path_buf())
                    .or_insert_with(|| fs::read_to_string(location.file()).ok());
                match text {
                    Some(text) => self.write_excerpt(out, diagnostic, text, config)?,
                    None => writeln!(
                        out,
                        "{}: {}: {}",
                        diagnostic.category(),
                        diagnostic,
                        location.text()
                    )?,
                }
            }
        }
        writeln!(out, "Complete")
    }

    fn write_excerpt(
        &self,
        out: &mut dyn Write,
        diagnostic: &Diagnostic,
        text: &str,
        config: Config,
    ) -> io::Result<()> {
        let location = diagnostic.location();
        let id = self.display_path(location.file());
        let end = location.span().end.min(text.len());
        let start = location.span().start.min(end);
        let kind = match diagnostic.category() {
            Category::Unsupported => ReportKind::Warning,
            Category::Syntax | Category::Resolution => ReportKind::Error,
        };

        ariadne::Report::build(kind, (id.clone(), start..end))
            .with_config(config)
            .with_message(diagnostic.message())
            .with_label(
                Label::new((id.clone(), start..end)).with_message(diagnostic.category()),
            )
            .finish()
            .write((id, Source::from(text)), &mut *out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pslint_engine::analysis::Analyzer;
    use pslint_engine::registry::CommandRegistry;
    use pslint_engine::vfs::MemoryFs;

    fn analyze(files: &[(&str, &str)], root: &str) -> AnalysisResult {
        let mut fs = MemoryFs::new();
        for (path, text) in files {
            fs = fs.with_file(*path, *text);
        }
        Analyzer::new(CommandRegistry::with_builtins().list_external_commands(&[]))
            .with_fs(fs)
            .analyze(root)
            .expect("root is readable")
    }

    fn text(report: &Report) -> String {
        let mut out = Vec::new();
        report.write_text(&mut out).expect("write to vec");
        String::from_utf8(out).expect("utf-8")
    }

    #[test]
    fn clean_run_prints_only_complete() {
        let mut report = Report::new("/w");
        report.add(Path::new("/w/a.ps1"), &analyze(&[("/w/a.ps1", "Get-Date\n")], "/w/a.ps1"));
        assert!(report.is_clean());
        assert_eq!(text(&report), "Complete\n");
    }

    #[test]
    fn text_lists_message_file_and_line() {
        let mut report = Report::new("/w");
        let result = analyze(&[("/w/scripts/a.ps1", "Get-Date\nInvoke-Missing -Force\n")], "/w/scripts/a.ps1");
        report.add(Path::new("/w/scripts/a.ps1"), &result);

        assert_eq!(
            text(&report),
            "Issues found:\n\
             Invoke-Missing is not defined in file ./scripts/a.ps1\n\
             2:    Invoke-Missing -Force\n\
             \n\
             Complete\n"
        );
    }

    #[test]
    fn shared_library_diagnostics_are_listed_once() {
        let files = [
            ("/w/lib.ps1", "Invoke-Nowhere\n"),
            ("/w/a.ps1", ". $PSScriptRoot/lib.ps1\n"),
            ("/w/b.ps1", ". $PSScriptRoot/lib.ps1\n"),
        ];
        let mut report = Report::new("/w");
        report.add(Path::new("/w/a.ps1"), &analyze(&files, "/w/a.ps1"));
        report.add(Path::new("/w/b.ps1"), &analyze(&files, "/w/b.ps1"));

        assert_eq!(report.resolution_errors().len(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn multi_line_text_shows_first_line() {
        let mut report = Report::new("/w");
        let script = "function Foo {\n  'a'\n}\nfunction Foo {\n  'b'\n}\n";
        report.add(Path::new("/w/a.ps1"), &analyze(&[("/w/a.ps1", script)], "/w/a.ps1"));

        let rendered = text(&report);
        assert!(rendered.contains("Overwriting existing function in file ./a.ps1\n4:    function Foo {\n"), "{rendered}");
    }

    #[test]
    fn sections_follow_category_order() {
        let mut report = Report::new("/w");
        let script = "enum Color { Red; Green }\n}\nInvoke-Missing\n";
        report.add(Path::new("/w/a.ps1"), &analyze(&[("/w/a.ps1", script)], "/w/a.ps1"));

        let rendered = text(&report);
        let syntax = rendered.find(SYNTAX_HEADING).expect("syntax section");
        let unsupported = rendered.find(UNSUPPORTED_HEADING).expect("unsupported section");
        assert!(syntax < unsupported);
        assert!(rendered.ends_with("Complete\n"));
    }

    #[test]
    fn json_has_lists_and_summary() {
        let mut report = Report::new("/w");
        report.add(Path::new("/w/a.ps1"), &analyze(&[("/w/a.ps1", "Invoke-Missing\n")], "/w/a.ps1"));

        let mut out = Vec::new();
        report.write_json(&mut out).expect("write to vec");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("valid json");

        assert_eq!(value["summary"]["resolution_errors"], 1);
        assert_eq!(value["summary"]["syntax_errors"], 0);
        assert_eq!(value["files"][0], "/w/a.ps1");
        let first = &value["resolution_errors"][0];
        assert_eq!(first["category"], "resolution");
        assert_eq!(first["message"], "Invoke-Missing is not defined");
        assert_eq!(first["location"]["line"], 1);
        assert_eq!(first["location"]["column"], 1);
    }

    #[test]
    fn pretty_falls_back_when_source_is_gone() {
        let mut report = Report::new("/w");
        report.add(
            Path::new("/nonexistent/a.ps1"),
            &analyze(&[("/nonexistent/a.ps1", "Invoke-Missing\n")], "/nonexistent/a.ps1"),
        );

        let mut out = Vec::new();
        report.write_pretty(&mut out, false).expect("write to vec");
        let rendered = String::from_utf8(out).expect("utf-8");
        assert!(rendered.contains("Invoke-Missing is not defined"), "{rendered}");
        assert!(rendered.ends_with("Complete\n"));
    }

    #[test]
    fn pretty_renders_source_excerpt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.ps1");
        fs::write(&path, "Get-Date\nInvoke-Missing\n").expect("write script");
        let result = Analyzer::new(CommandRegistry::with_builtins().list_external_commands(&[]))
            .analyze(&path)
            .expect("root is readable");

        let mut report = Report::new(dir.path());
        report.add(&path, &result);
        let mut out = Vec::new();
        report.write_pretty(&mut out, false).expect("write to vec");
        let rendered = String::from_utf8(out).expect("utf-8");

        assert!(rendered.contains("Invoke-Missing is not defined"), "{rendered}");
        assert!(rendered.contains("./a.ps1"), "{rendered}");
        assert!(rendered.contains("resolution error"), "{rendered}");
    }
}
