//! Curated re-exports of the types most consumers touch.
//!
//! ```rust,no_run
//! use provscope::prelude::*;
//!
//! let report = PackageValidator::new(ValidationOptions::default())
//!     .validate_path("pkg.nupkg".as_ref(), &CancellationToken::new())?;
//! println!("{}", report.describe(Category::SourceLink));
//! # Ok::<(), provscope::Error>(())
//! ```

pub use crate::archive::{PackageArchive, PackageEntry, PackageManifest};
pub use crate::pdb::{DebugFacts, DebugFormat, DebugInfoSource};
pub use crate::pe::{AssemblyKind, BinaryCandidate};
pub use crate::validation::{
    report::{Category, CategoryRollup, ValidationReport},
    runner::{CancellationToken, PackageValidator},
    BinaryVerdict, DeterministicResult, HasCompilerFlagsResult, Severity,
    SymbolValidationResult, ValidationOptions,
};
pub use crate::{Error, Result};
