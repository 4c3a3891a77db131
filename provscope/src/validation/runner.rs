//! The package validation driver.
//!
//! Candidate binaries inside one package are independent: each worker owns its entry
//! buffers and produces one verdict, with no shared mutable state beyond the archive
//! handle (entry extraction serializes on a lock; parsing and evaluation run fully in
//! parallel). Aggregation happens only after the pool joins, and the roll-up keys off
//! entry order, so results are deterministic regardless of completion order.
//!
//! Cancellation is cooperative: workers check the package-scoped token before taking
//! a candidate and abandon in-flight work without emitting a partial verdict for it.
//! No timeouts are imposed here - the core performs no network I/O, so pacing belongs
//! to the caller.

use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use rayon::prelude::*;

use crate::{
    archive::{PackageArchive, PackageEntry},
    pdb,
    pe::{self, AssemblyKind, BinaryCandidate},
    validation::{
        evaluate, report::ValidationReport, BinaryVerdict, DeterministicResult,
        HasCompilerFlagsResult, SymbolValidationResult, ValidationOptions,
    },
    Result,
};

/// Package-scoped cooperative cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    /// Request cancellation; workers stop picking up candidates.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

fn lock(archive: &Mutex<PackageArchive>) -> MutexGuard<'_, PackageArchive> {
    archive.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Validates the build provenance of every managed binary in a package.
pub struct PackageValidator {
    options: ValidationOptions,
}

impl PackageValidator {
    /// Create a validator with the given options.
    #[must_use]
    pub fn new(options: ValidationOptions) -> PackageValidator {
        PackageValidator { options }
    }

    /// Create a validator with default options.
    #[must_use]
    pub fn with_defaults() -> PackageValidator {
        PackageValidator::new(ValidationOptions::default())
    }

    /// Open and validate a package file.
    ///
    /// # Errors
    /// Returns [`crate::Error::ArchiveNotFound`] / [`crate::Error::ArchiveCorrupt`]
    /// when the container itself is unusable; per-binary problems become verdicts,
    /// never errors.
    pub fn validate_path(
        &self,
        path: &Path,
        token: &CancellationToken,
    ) -> Result<ValidationReport> {
        let archive = PackageArchive::open(path)?;
        self.validate(archive, token)
    }

    /// Validate an already-open package.
    ///
    /// # Errors
    /// Returns an archive error only when entry enumeration is impossible.
    pub fn validate(
        &self,
        mut archive: PackageArchive,
        token: &CancellationToken,
    ) -> Result<ValidationReport> {
        let manifest = archive.manifest();

        let candidates: Vec<PackageEntry> = archive
            .entries()
            .iter()
            .filter(|entry| self.options.matches_extension(&entry.path))
            .cloned()
            .collect();

        log::debug!(
            "Validating {} candidate entries out of {}",
            candidates.len(),
            archive.entries().len()
        );

        let shared = Mutex::new(archive);

        let verdicts: Vec<BinaryVerdict> = candidates
            .par_iter()
            .map(|entry| {
                if token.is_cancelled() {
                    return None;
                }
                self.judge_entry(&shared, entry)
            })
            .collect::<Vec<Option<BinaryVerdict>>>()
            .into_iter()
            .flatten()
            .collect();

        Ok(ValidationReport::new(
            manifest,
            verdicts,
            !token.is_cancelled(),
        ))
    }

    /// Judge one candidate entry; `None` when it is not a managed binary (or was
    /// skipped by the permissive header policy).
    fn judge_entry(
        &self,
        archive: &Mutex<PackageArchive>,
        entry: &PackageEntry,
    ) -> Option<BinaryVerdict> {
        let data = {
            let mut guard = lock(archive);
            match guard.read(entry) {
                Ok(data) => data,
                Err(error) => {
                    if self.options.strict_headers {
                        return Some(header_failure(&entry.path, &error));
                    }
                    log::warn!("{}: entry unreadable, excluded ({error})", entry.path);
                    return None;
                }
            }
        };

        let mut classified = match pe::classify(&entry.path, data, self.options.strict_headers) {
            Ok(Some(classified)) => classified,
            Ok(None) => return None,
            Err(error) => return Some(header_failure(&entry.path, &error)),
        };

        let outcome = pdb::locate(&entry.path, &mut classified.debug, |sibling| {
            let mut guard = lock(archive);
            let sibling_entry = guard.find(sibling).cloned()?;
            guard.read(&sibling_entry).ok()
        })
        .and_then(|source| pdb::extract(&source, &classified.debug));

        Some(evaluate(classified.candidate, outcome))
    }
}

/// Failing verdict for a candidate whose header (or entry) could not be read at all.
/// Only produced in strict mode; identity is limited to what the path tells us.
fn header_failure(path: &str, error: &crate::Error) -> BinaryVerdict {
    BinaryVerdict {
        candidate: BinaryCandidate {
            path: path.to_string(),
            kind: AssemblyKind::from_path(path).unwrap_or(AssemblyKind::Dll),
            mvid: uguid::Guid::ZERO,
        },
        source_link: SymbolValidationResult::InvalidSourceLink,
        deterministic: DeterministicResult::NonDeterministic,
        compiler_flags: HasCompilerFlagsResult::Missing,
        message: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_state() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());

        let observer = token.clone();
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn strict_header_failure_identity() {
        let verdict = header_failure("lib/broken.dll", &crate::Error::NotSupported);
        assert_eq!(verdict.candidate.path, "lib/broken.dll");
        assert_eq!(verdict.candidate.kind, AssemblyKind::Dll);
        assert_eq!(verdict.source_link, SymbolValidationResult::InvalidSourceLink);
        assert!(verdict.message.is_some());
    }
}
