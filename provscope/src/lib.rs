// Copyright 2026 The provscope authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # provscope
//!
//! Build-provenance validation for .NET packages. `provscope` opens a package, finds
//! every managed binary inside it, and judges three independent provenance claims per
//! binary:
//!
//! - **Source link** - does the debug information map every compiled source document
//!   to an exact, retrievable URL?
//! - **Deterministic build** - did the compiler mark the build reproducible, and does
//!   the debug information actually belong to this binary?
//! - **Compiler flags** - are the compiler's own option records embedded, so the
//!   build can be audited and replayed?
//!
//! Everything is parsed in pure Rust from the containers themselves: the zip package,
//! the PE headers of each binary, and the portable debug format (with a legacy-format
//! probe for old symbol files). No network I/O is ever performed; symbol-server
//! lookup is a deliberate non-feature of the core.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use provscope::prelude::*;
//! use std::path::Path;
//!
//! let validator = PackageValidator::with_defaults();
//! let token = CancellationToken::new();
//! let report = validator.validate_path(Path::new("Contoso.Widgets.1.2.3.nupkg"), &token)?;
//!
//! println!("{}", report.describe(Category::SourceLink));
//! println!("{}", report.describe(Category::Deterministic));
//! println!("{}", report.describe(Category::CompilerFlags));
//!
//! if report.has_failures() {
//!     for binary in &report.binaries {
//!         println!("  {}: {}", binary.candidate.path, binary.source_link);
//!     }
//! }
//! # Ok::<(), provscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! Validation is a straight pipeline; each stage is its own module so format decoders
//! can be swapped without touching the judgment logic:
//!
//! 1. [`archive`] enumerates package entries and materializes them on demand
//! 2. [`pe`] classifies entries into managed binaries and extracts header facts
//!    (module version id, debug directory, CodeView record, reproducible marker)
//! 3. [`pdb`] locates each binary's debug information (embedded record, sibling
//!    entry, or missing) and decodes it into [`pdb::DebugFacts`]
//! 4. [`validation`] maps facts onto verdicts, runs the candidate pool, and folds
//!    everything into an immutable [`validation::report::ValidationReport`]
//!
//! One bad binary never aborts a run: every per-binary problem becomes a verdict.
//! Only an unreadable package container is fatal.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result):
//!
//! ```rust,no_run
//! use provscope::{Error, PackageValidator, CancellationToken};
//! use std::path::Path;
//!
//! let validator = PackageValidator::with_defaults();
//! match validator.validate_path(Path::new("pkg.nupkg"), &CancellationToken::new()) {
//!     Ok(report) => println!("validated, failures: {}", report.has_failures()),
//!     Err(Error::ArchiveNotFound(path)) => eprintln!("no such package: {}", path.display()),
//!     Err(Error::ArchiveCorrupt(reason)) => eprintln!("unreadable package: {reason}"),
//!     Err(e) => eprintln!("internal error: {e}"),
//! }
//! ```

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use provscope::prelude::*;
///
/// let validator = PackageValidator::with_defaults();
/// let report = validator.validate_path("pkg.nupkg".as_ref(), &CancellationToken::new())?;
/// # Ok::<(), provscope::Error>(())
/// ```
pub mod prelude;

/// Package archive reading: entry enumeration, scoped materialization, manifest
/// identity. See [`archive::PackageArchive`].
pub mod archive;

/// Shared physical metadata container (root header, stream directory, heaps), read by
/// both the assembly and the debug-information side.
pub mod metadata;

/// Managed binary classification and header parsing: CLR header, module version id,
/// debug directory records. See [`pe::classify`].
pub mod pe;

/// Debug information location, format decoding, and fact extraction. See
/// [`pdb::locate`] and [`pdb::extract`].
pub mod pdb;

/// Verdicts, the per-binary evaluator, the package report, and the worker-pool
/// runner. See [`validation::runner::PackageValidator`].
pub mod validation;

/// `provscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always
/// [`Error`], used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `provscope` Error type
///
/// The main error type for all operations in this crate. See the variant docs for the
/// split between fatal archive errors and per-binary errors that become verdicts.
pub use error::Error;

/// Low-level bounds-checked byte cursor used by all format decoders.
pub use file::parser::Parser;

/// Trait bound for primitive types readable by [`Parser`].
pub use file::io::RawIO;

/// The main entry point: validates every managed binary in a package.
pub use validation::runner::{CancellationToken, PackageValidator};

/// The immutable result of a validation run.
pub use validation::report::{Category, ValidationReport};

/// Behavior switches for a validation run.
pub use validation::ValidationOptions;
