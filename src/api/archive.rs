//! Purpose: Define the public API surface for building and inspecting archives.
//! Exports: `Archiver` plus file-level scan, verify, and script loading helpers.
//! Role: Stable boundary for bindings; mirrors CLI behavior.
//! Invariants: Building reads input files exactly once, in request order.
//! Invariants: Scanning and verification never execute embedded script text.
#![allow(clippy::result_large_err)]

use super::report::{VerifyReport, report_from_error, report_from_scan};
use crate::core::builder::{self, BuildOptions, BuildOutcome, ErrorPolicy};
use crate::core::entry::BundleRequest;
use crate::core::error::{Error, ErrorKind};
use crate::core::scan::{self, ScannedBundle};
use std::path::Path;

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug)]
pub struct Archiver {
    options: BuildOptions,
}

impl Archiver {
    pub fn new() -> Self {
        Self {
            options: BuildOptions::new(),
        }
    }

    pub fn with_error_policy(mut self, on_error: ErrorPolicy) -> Self {
        self.options = self.options.with_error_policy(on_error);
        self
    }

    pub fn options(&self) -> BuildOptions {
        self.options
    }

    pub fn build(&self, request: &BundleRequest) -> ApiResult<BuildOutcome> {
        builder::build(request, self.options)
    }
}

impl Default for Archiver {
    fn default() -> Self {
        Self::new()
    }
}

pub fn scan_archive(text: &[u8]) -> ApiResult<ScannedBundle> {
    scan::scan(text)
}

pub fn scan_archive_file(path: &Path) -> ApiResult<ScannedBundle> {
    let text = read_archive_bytes(path)?;
    scan::scan(&text).map_err(|err| err.with_path(path))
}

/// Verifies the archive at `path`. Structural corruption becomes a corrupt
/// report rather than an error; only failures to read the file propagate.
pub fn verify_archive_file(path: &Path) -> ApiResult<VerifyReport> {
    let text = read_archive_bytes(path)?;
    let label = path.to_string_lossy().to_string();
    match scan::scan(&text) {
        Ok(scanned) => Ok(report_from_scan(&scanned, path).with_archive(label)),
        Err(err) if matches!(err.kind(), ErrorKind::Corrupt | ErrorKind::Usage) => {
            Ok(report_from_error(&err, path).with_archive(label))
        }
        Err(err) => Err(err),
    }
}

/// Loads a prologue or postscript body from disk; scripts must be UTF-8.
pub fn read_script_file(path: &Path) -> ApiResult<String> {
    let bytes = std::fs::read(path).map_err(|err| {
        Error::new(map_io_error_kind(&err))
            .with_message("failed to read script file")
            .with_path(path)
            .with_source(err)
    })?;
    String::from_utf8(bytes).map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("script file is not valid UTF-8")
            .with_path(path)
            .with_hint("Prologue and postscript scripts are embedded as text.")
    })
}

fn read_archive_bytes(path: &Path) -> ApiResult<Vec<u8>> {
    std::fs::read(path).map_err(|err| {
        Error::new(map_io_error_kind(&err))
            .with_message("failed to read archive")
            .with_path(path)
            .with_source(err)
    })
}

fn map_io_error_kind(err: &std::io::Error) -> ErrorKind {
    match err.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound,
        std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}
