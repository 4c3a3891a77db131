//! The immutable validation report.
//!
//! Built exactly once per run from already-evaluated verdicts; construction cannot
//! fail and nothing mutates a report afterwards. The [`ValidationReport::describe`]
//! lines are the canonical human-readable rendering, shared verbatim by every consumer
//! so CLI and GUI never disagree on wording.

use serde::Serialize;

use crate::{
    archive::PackageManifest,
    validation::{
        BinaryVerdict, DeterministicResult, HasCompilerFlagsResult, Severity,
        SymbolValidationResult,
    },
};

/// The three verdict categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Source link coverage
    SourceLink,
    /// Deterministic build evidence
    Deterministic,
    /// Compiler flags record
    CompilerFlags,
}

impl Category {
    fn label(self) -> &'static str {
        match self {
            Category::SourceLink => "Source link",
            Category::Deterministic => "Deterministic build",
            Category::CompilerFlags => "Compiler flags",
        }
    }
}

/// Package-level roll-up of one category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRollup<T> {
    /// Worst verdict across all binaries
    pub verdict: T,
    /// Paths of every binary whose verdict in this category is not a pass
    pub offending_files: Vec<String>,
    /// Detail message from the first offending binary, when it had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The complete, immutable result of one validation run.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Package identity from the manifest, when one was readable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageManifest>,
    /// Source-link roll-up
    pub source_link: CategoryRollup<SymbolValidationResult>,
    /// Deterministic-build roll-up
    pub deterministic: CategoryRollup<DeterministicResult>,
    /// Compiler-flags roll-up
    pub compiler_flags: CategoryRollup<HasCompilerFlagsResult>,
    /// Per-binary verdicts, in entry order
    pub binaries: Vec<BinaryVerdict>,
    /// `false` when the run was cancelled before every candidate was judged
    pub is_complete: bool,
}

impl ValidationReport {
    /// Fold per-binary verdicts into a package-level report.
    ///
    /// The roll-up per category keeps the worst severity seen; between verdicts of
    /// equal severity the first-encountered one (and its message) wins, so the result
    /// is independent of worker completion order but fixed by entry order.
    ///
    /// # Arguments
    /// * `package` - Manifest identity, when available
    /// * `binaries` - All evaluated verdicts
    /// * `is_complete` - Whether every candidate was judged (no cancellation)
    #[must_use]
    pub fn new(
        package: Option<PackageManifest>,
        binaries: Vec<BinaryVerdict>,
        is_complete: bool,
    ) -> ValidationReport {
        let source_link = roll_up(
            &binaries,
            SymbolValidationResult::NothingToValidate,
            |verdict| verdict.source_link,
            SymbolValidationResult::severity,
        );
        let deterministic = roll_up(
            &binaries,
            DeterministicResult::NothingToValidate,
            |verdict| verdict.deterministic,
            DeterministicResult::severity,
        );
        let compiler_flags = roll_up(
            &binaries,
            HasCompilerFlagsResult::NothingToValidate,
            |verdict| verdict.compiler_flags,
            HasCompilerFlagsResult::severity,
        );

        ValidationReport {
            package,
            source_link,
            deterministic,
            compiler_flags,
            binaries,
            is_complete,
        }
    }

    /// Worst severity across the three package-level verdicts.
    #[must_use]
    pub fn worst_severity(&self) -> Severity {
        self.source_link
            .verdict
            .severity()
            .max(self.deterministic.verdict.severity())
            .max(self.compiler_flags.verdict.severity())
    }

    /// Whether any category's roll-up is a failing verdict.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.worst_severity() == Severity::Fail
    }

    /// Render the canonical one-line description of a category.
    #[must_use]
    pub fn describe(&self, category: Category) -> String {
        let (text, files) = match category {
            Category::SourceLink => (
                self.source_link.verdict.to_string(),
                &self.source_link.offending_files,
            ),
            Category::Deterministic => (
                self.deterministic.verdict.to_string(),
                &self.deterministic.offending_files,
            ),
            Category::CompilerFlags => (
                self.compiler_flags.verdict.to_string(),
                &self.compiler_flags.offending_files,
            ),
        };

        if files.is_empty() {
            format!("{}: {}", category.label(), text)
        } else {
            format!("{}: {} ({})", category.label(), text, files.join(", "))
        }
    }
}

fn roll_up<T, F, S>(
    binaries: &[BinaryVerdict],
    empty: T,
    verdict_of: F,
    severity_of: S,
) -> CategoryRollup<T>
where
    T: Copy,
    F: Fn(&BinaryVerdict) -> T,
    S: Fn(&T) -> Severity,
{
    let mut worst: Option<T> = None;
    let mut message = None;
    let mut offending_files = Vec::new();

    for binary in binaries {
        let verdict = verdict_of(binary);
        let severity = severity_of(&verdict);

        if severity > Severity::Pass {
            offending_files.push(binary.candidate.path.clone());
        }

        let replace = match &worst {
            None => true,
            Some(current) => severity > severity_of(current),
        };
        if replace {
            worst = Some(verdict);
            message = if severity > Severity::Pass {
                binary.message.clone()
            } else {
                None
            };
        }
    }

    CategoryRollup {
        verdict: worst.unwrap_or(empty),
        offending_files,
        message,
    }
}
