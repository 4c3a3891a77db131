//! Debug information location, decoding, and fact extraction.
//!
//! This module answers two questions per managed binary: *where* its debug information
//! lives ([`crate::pdb::locator`]) and *what it proves* ([`crate::pdb::facts`]).
//! Format decoding sits behind that seam so either decoder can be swapped without
//! touching the evaluator:
//!
//! - [`crate::pdb::portable`] - the portable debug format (the only one carrying
//!   source link, determinism evidence, and compiler records)
//! - [`crate::pdb::windows`] - the legacy MSF probe, enough to tell "old symbols"
//!   from "garbage"
//! - [`crate::pdb::debuginfo`] - GUID-identified custom debug information kinds
//! - [`crate::pdb::sourcelink`] - the source-link JSON document mapping

pub mod debuginfo;
pub mod facts;
pub mod locator;
pub mod portable;
pub mod sourcelink;
pub mod windows;

pub use facts::{extract, DebugFacts, DebugFormat};
pub use locator::{locate, DebugInfoSource};
pub use portable::{Document, HashAlgorithm, PortablePdb};
pub use sourcelink::SourceLinkMap;
