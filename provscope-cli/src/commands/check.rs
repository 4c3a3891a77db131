use std::path::Path;

use provscope::prelude::*;

use crate::{app::GlobalOptions, output::print_output};

const EXIT_PASS: i32 = 0;
const EXIT_FAIL: i32 = 1;
const EXIT_UNAVAILABLE: i32 = 69;

pub fn run(
    path: &Path,
    extensions: &[String],
    strict_headers: bool,
    token: &CancellationToken,
    opts: &GlobalOptions,
) -> anyhow::Result<i32> {
    let mut options = if strict_headers {
        ValidationOptions::strict()
    } else {
        ValidationOptions::default()
    };
    if !extensions.is_empty() {
        options.extensions = extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();
    }

    let validator = PackageValidator::new(options);
    let report = match validator.validate_path(path, token) {
        Ok(report) => report,
        Err(error @ (Error::ArchiveNotFound(_) | Error::ArchiveCorrupt(_))) => {
            eprintln!("error: {error}");
            return Ok(EXIT_UNAVAILABLE);
        }
        Err(Error::FileError(error)) => {
            eprintln!("error: {error}");
            return Ok(EXIT_UNAVAILABLE);
        }
        Err(error) => return Err(error.into()),
    };

    print_output(&report, opts, display_report)?;

    if report.has_failures() || !report.is_complete {
        Ok(EXIT_FAIL)
    } else {
        Ok(EXIT_PASS)
    }
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Pass => "PASS",
        Severity::Warn => "WARN",
        Severity::Fail => "FAIL",
    }
}

fn display_report(report: &ValidationReport) {
    if let Some(package) = &report.package {
        println!("Package: {} {}", package.id, package.version);
    }

    let lines = [
        (
            Category::SourceLink,
            report.source_link.verdict.severity(),
            report.source_link.message.as_deref(),
        ),
        (
            Category::Deterministic,
            report.deterministic.verdict.severity(),
            report.deterministic.message.as_deref(),
        ),
        (
            Category::CompilerFlags,
            report.compiler_flags.verdict.severity(),
            report.compiler_flags.message.as_deref(),
        ),
    ];

    for (category, severity, message) in lines {
        println!("{}  {}", severity_marker(severity), report.describe(category));
        if let Some(message) = message {
            println!("      {message}");
        }
    }

    if !report.is_complete {
        println!("NOTE  validation incomplete: cancelled before all binaries were checked");
    }
}
