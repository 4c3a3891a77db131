//! Provenance verdicts and the per-binary evaluator.
//!
//! Three independent categories are judged per binary - source link, deterministic
//! build, compiler flags - each over a small closed enumeration with a total severity
//! order (pass < warn < fail). [`evaluate`] is a pure mapping from extracted facts (or
//! the per-binary error that replaced them) onto one [`BinaryVerdict`]; no verdict
//! ever re-reads binary data.
//!
//! Package-level aggregation lives in [`crate::validation::report`]; the worker pool
//! driving evaluation lives in [`crate::validation::runner`].

pub mod report;
pub mod runner;

use serde::Serialize;
use strum::{Display, EnumIter};

use crate::{pdb::DebugFacts, pe::BinaryCandidate, Result};

/// Severity of a verdict. Roll-ups keep the worst severity seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    /// Nothing wrong
    Pass,
    /// Suspicious but not conclusive
    Warn,
    /// Provenance claim failed
    Fail,
}

/// Source-link verdict for one binary (or the package roll-up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize)]
pub enum SymbolValidationResult {
    /// Source link present and covering every document
    #[strum(to_string = "Valid")]
    Valid,
    /// Valid, with symbols obtained from an external source.
    /// Reserved for a future symbol-server collaborator; never produced here.
    #[strum(to_string = "Valid (external symbols)")]
    ValidExternal,
    /// No managed binaries to check
    #[strum(to_string = "Nothing to validate")]
    NothingToValidate,
    /// A source-link blob exists but is not a well-formed mapping
    #[strum(to_string = "Invalid source link metadata")]
    InvalidSourceLink,
    /// Source link present but some documents are not covered by it
    #[strum(to_string = "Contains untracked source files")]
    HasUntrackedSources,
    /// Debug information present but carries no source link
    #[strum(to_string = "Missing source link metadata")]
    NoSourceLink,
    /// No debug information found at all
    #[strum(to_string = "Missing symbols")]
    NoSymbols,
}

impl SymbolValidationResult {
    /// Severity of this verdict.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            SymbolValidationResult::Valid
            | SymbolValidationResult::ValidExternal
            | SymbolValidationResult::NothingToValidate => Severity::Pass,
            SymbolValidationResult::HasUntrackedSources => Severity::Warn,
            SymbolValidationResult::InvalidSourceLink
            | SymbolValidationResult::NoSourceLink
            | SymbolValidationResult::NoSymbols => Severity::Fail,
        }
    }
}

/// Deterministic-build verdict for one binary (or the package roll-up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize)]
pub enum DeterministicResult {
    /// Deterministic-build evidence present and paired to the binary
    #[strum(to_string = "Deterministic")]
    Valid,
    /// No managed binaries to check
    #[strum(to_string = "Nothing to validate")]
    NothingToValidate,
    /// Untracked sources make determinism unverifiable
    #[strum(to_string = "Contains untracked source files")]
    HasUntrackedSources,
    /// No deterministic-build evidence
    #[strum(to_string = "Non deterministic")]
    NonDeterministic,
}

impl DeterministicResult {
    /// Severity of this verdict.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            DeterministicResult::Valid | DeterministicResult::NothingToValidate => Severity::Pass,
            DeterministicResult::HasUntrackedSources => Severity::Warn,
            DeterministicResult::NonDeterministic => Severity::Fail,
        }
    }
}

/// Compiler-flags verdict for one binary (or the package roll-up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize)]
pub enum HasCompilerFlagsResult {
    /// Compiler options record present
    #[strum(to_string = "Compiler flags present")]
    Present,
    /// No managed binaries to check
    #[strum(to_string = "Nothing to validate")]
    NothingToValidate,
    /// No compiler options record
    #[strum(to_string = "Compiler flags missing")]
    Missing,
}

impl HasCompilerFlagsResult {
    /// Severity of this verdict.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            HasCompilerFlagsResult::Present | HasCompilerFlagsResult::NothingToValidate => {
                Severity::Pass
            }
            HasCompilerFlagsResult::Missing => Severity::Fail,
        }
    }
}

/// The three verdicts for one binary, plus an optional per-file message.
#[derive(Debug, Clone, Serialize)]
pub struct BinaryVerdict {
    /// The judged binary's identity
    pub candidate: BinaryCandidate,
    /// Source-link verdict
    pub source_link: SymbolValidationResult,
    /// Deterministic-build verdict
    pub deterministic: DeterministicResult,
    /// Compiler-flags verdict
    pub compiler_flags: HasCompilerFlagsResult,
    /// Human-readable detail for non-pass verdicts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BinaryVerdict {
    /// Worst severity across the three categories.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.source_link
            .severity()
            .max(self.deterministic.severity())
            .max(self.compiler_flags.severity())
    }
}

/// Validation behavior switches.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Entry extensions considered candidate binaries (lower case, no dot)
    pub extensions: Vec<String>,
    /// Treat malformed candidate headers as failures instead of silently excluding
    /// the file. The permissive default matches long-observed consumer behavior:
    /// a file whose header does not parse is handled like a native binary.
    pub strict_headers: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions {
            extensions: vec!["dll".to_string(), "exe".to_string(), "winmd".to_string()],
            strict_headers: false,
        }
    }
}

impl ValidationOptions {
    /// Strict preset: malformed candidate headers become per-file failures.
    #[must_use]
    pub fn strict() -> Self {
        ValidationOptions {
            strict_headers: true,
            ..ValidationOptions::default()
        }
    }

    /// Whether an entry path's extension is in the candidate allow-list.
    #[must_use]
    pub fn matches_extension(&self, path: &str) -> bool {
        let Some(extension) = path.rsplit('.').next() else {
            return false;
        };

        path.contains('.')
            && self
                .extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

/// Map one binary's extraction outcome onto its verdicts.
///
/// This is a pure function of its inputs; the property tests iterate it over the whole
/// fact space.
///
/// # Arguments
/// * `candidate` - The judged binary's identity
/// * `outcome` - Extracted facts, or the per-binary error that replaced them
#[must_use]
pub fn evaluate(candidate: BinaryCandidate, outcome: Result<DebugFacts>) -> BinaryVerdict {
    match outcome {
        Ok(facts) => {
            let source_link = if facts.source_link_error.is_some() {
                SymbolValidationResult::InvalidSourceLink
            } else if facts.has_source_link && !facts.has_untracked_sources {
                SymbolValidationResult::Valid
            } else if facts.has_source_link {
                SymbolValidationResult::HasUntrackedSources
            } else {
                SymbolValidationResult::NoSourceLink
            };

            // Untracked sources leave nothing to verify determinism against
            let deterministic = if facts.has_untracked_sources {
                DeterministicResult::HasUntrackedSources
            } else if facts.is_deterministic {
                DeterministicResult::Valid
            } else {
                DeterministicResult::NonDeterministic
            };

            let compiler_flags = if facts.compiler_flags.is_some() {
                HasCompilerFlagsResult::Present
            } else {
                HasCompilerFlagsResult::Missing
            };

            let message = if let Some(error) = &facts.source_link_error {
                Some(error.clone())
            } else if facts.has_untracked_sources {
                Some(format!(
                    "untracked sources: {}",
                    facts.untracked_sources.join(", ")
                ))
            } else {
                None
            };

            BinaryVerdict {
                candidate,
                source_link,
                deterministic,
                compiler_flags,
                message,
            }
        }
        Err(crate::Error::NoSymbols) => BinaryVerdict {
            candidate,
            source_link: SymbolValidationResult::NoSymbols,
            deterministic: DeterministicResult::NonDeterministic,
            compiler_flags: HasCompilerFlagsResult::Missing,
            message: None,
        },
        // Unreadable (or otherwise failed) debug information: present, but proves
        // nothing. Fails every category while preserving the reason per file.
        Err(error) => BinaryVerdict {
            candidate,
            source_link: SymbolValidationResult::InvalidSourceLink,
            deterministic: DeterministicResult::NonDeterministic,
            compiler_flags: HasCompilerFlagsResult::Missing,
            message: Some(error.to_string()),
        },
    }
}
