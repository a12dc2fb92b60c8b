//! Purpose: Define the stable public Rust API boundary for mshar.
//! Exports: Core types and operations needed by bindings and CLI.
//! Role: Public, additive-only surface; hides internal format modules.
//! Invariants: This module is the only public path to bundling primitives.
//! Invariants: Internal modules remain private and are not directly exposed.

mod archive;
mod report;

pub use crate::core::builder::{BuildOptions, BuildOutcome, ErrorPolicy, SkippedFile};
pub use crate::core::entry::{Bundle, BundleRequest, FileEntry};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::scan::{ScanIssue, ScannedBundle, ScannedEntry};
pub use archive::{
    read_script_file, scan_archive, scan_archive_file, verify_archive_file, Archiver,
};
pub use report::{VerifyIssue, VerifyReport, VerifyStatus};
