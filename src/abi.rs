//! Purpose: C ABI bridge for bindings (libmshar).
//! Exports: C-callable build/scan functions and buffer/error helpers.
//! Role: Stable ABI surface for non-Rust bindings in v0.
//! Invariants: Archive text and listings cross the boundary as owned buffers.
//! Invariants: Error kinds map 1:1 with core error kinds.
//! Notes: NULL prescript/postscript pointers are treated as empty scripts.
#![allow(clippy::result_large_err)]
#![allow(non_camel_case_types)]

use crate::api::{Archiver, BundleRequest, ErrorPolicy, scan_archive};
use crate::core::error::{Error, ErrorKind};
use serde_json::json;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;
use std::ptr;

#[repr(C)]
pub struct mshar_buf {
    data: *mut u8,
    len: usize,
}

#[repr(C)]
pub struct mshar_error {
    kind: i32,
    message: *mut c_char,
    path: *mut c_char,
    entry: *mut c_char,
    offset: u64,
    has_offset: u8,
}

/// Builds an archive from `files` and writes the artifact text to
/// `out_archive`. `on_error` selects the policy: 0 stops on the first
/// unreadable input, 1 skips it. Returns 0 on success, -1 on error.
#[unsafe(no_mangle)]
pub extern "C" fn mshar_build(
    prescript: *const c_char,
    postscript: *const c_char,
    files: *const *const c_char,
    files_len: usize,
    on_error: u32,
    out_archive: *mut mshar_buf,
    out_err: *mut *mut mshar_error,
) -> i32 {
    let prologue = match parse_script(prescript, "prescript") {
        Ok(text) => text,
        Err(err) => return fail(out_err, err),
    };
    let postscript = match parse_script(postscript, "postscript") {
        Ok(text) => text,
        Err(err) => return fail(out_err, err),
    };
    let files = match parse_files(files, files_len) {
        Ok(files) => files,
        Err(err) => return fail(out_err, err),
    };
    let on_error = match on_error {
        0 => ErrorPolicy::Stop,
        1 => ErrorPolicy::Skip,
        _ => {
            return fail(
                out_err,
                Error::new(ErrorKind::Usage).with_message("invalid on_error"),
            );
        }
    };

    let request = BundleRequest::new(prologue, postscript, files);
    let outcome = match Archiver::new().with_error_policy(on_error).build(&request) {
        Ok(outcome) => outcome,
        Err(err) => return fail(out_err, err),
    };
    if let Err(err) = write_buf(out_archive, outcome.bundle.render().into_bytes()) {
        return fail(out_err, err);
    }
    0
}

/// Scans archive text and writes a JSON listing of its entries to
/// `out_listing`. Returns 0 on success, -1 on error.
#[unsafe(no_mangle)]
pub extern "C" fn mshar_scan_names(
    archive: *const u8,
    archive_len: usize,
    out_listing: *mut mshar_buf,
    out_err: *mut *mut mshar_error,
) -> i32 {
    if archive.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("archive is null"),
        );
    }
    let text = unsafe { std::slice::from_raw_parts(archive, archive_len) };
    let scanned = match scan_archive(text) {
        Ok(scanned) => scanned,
        Err(err) => return fail(out_err, err),
    };
    let entries = scanned
        .entries
        .iter()
        .map(|entry| {
            json!({
                "name": entry.name,
                "size": entry.declared_size,
                "sha256": entry.declared_sha256,
            })
        })
        .collect::<Vec<_>>();
    let listing = json!({ "entries": entries });
    let bytes = match serde_json::to_vec(&listing) {
        Ok(bytes) => bytes,
        Err(err) => {
            return fail(
                out_err,
                Error::new(ErrorKind::Internal)
                    .with_message("failed to serialize listing")
                    .with_source(err),
            );
        }
    };
    if let Err(err) = write_buf(out_listing, bytes) {
        return fail(out_err, err);
    }
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn mshar_buf_free(buf: *mut mshar_buf) {
    if buf.is_null() {
        return;
    }
    unsafe {
        let buf = &mut *buf;
        if !buf.data.is_null() && buf.len != 0 {
            drop(Vec::from_raw_parts(buf.data, buf.len, buf.len));
        }
        buf.data = ptr::null_mut();
        buf.len = 0;
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn mshar_error_free(err: *mut mshar_error) {
    if err.is_null() {
        return;
    }
    unsafe {
        let err = Box::from_raw(err);
        if !err.message.is_null() {
            drop(CString::from_raw(err.message));
        }
        if !err.path.is_null() {
            drop(CString::from_raw(err.path));
        }
        if !err.entry.is_null() {
            drop(CString::from_raw(err.entry));
        }
    }
}

fn parse_script(input: *const c_char, what: &str) -> Result<String, Error> {
    if input.is_null() {
        return Ok(String::new());
    }
    unsafe { CStr::from_ptr(input) }
        .to_str()
        .map(str::to_string)
        .map_err(|_| Error::new(ErrorKind::Usage).with_message(format!("{what} is not valid UTF-8")))
}

fn parse_files(files: *const *const c_char, len: usize) -> Result<Vec<PathBuf>, Error> {
    if files.is_null() {
        if len != 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("files is null"));
        }
        return Ok(Vec::new());
    }
    let slice = unsafe { std::slice::from_raw_parts(files, len) };
    let mut out = Vec::with_capacity(len);
    for item in slice {
        if item.is_null() {
            return Err(Error::new(ErrorKind::Usage).with_message("files contains null"));
        }
        let value = unsafe { CStr::from_ptr(*item) }
            .to_str()
            .map_err(|_| Error::new(ErrorKind::Usage).with_message("files invalid UTF-8"))?;
        out.push(PathBuf::from(value));
    }
    Ok(out)
}

fn write_buf(out: *mut mshar_buf, bytes: Vec<u8>) -> Result<(), Error> {
    if out.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message("out buffer is null"));
    }
    unsafe {
        let buf = &mut *out;
        let mut data = bytes.into_boxed_slice();
        buf.len = data.len();
        buf.data = data.as_mut_ptr();
        std::mem::forget(data);
    }
    Ok(())
}

fn fail(out_err: *mut *mut mshar_error, err: Error) -> i32 {
    if out_err.is_null() {
        return -1;
    }
    let error = Box::new(mshar_error {
        kind: error_kind_code(err.kind()),
        message: to_c_string(err.message().unwrap_or("")),
        path: err
            .path()
            .map(|path| to_c_string(path.to_string_lossy().as_ref()))
            .unwrap_or(ptr::null_mut()),
        entry: err
            .entry()
            .map(to_c_string)
            .unwrap_or(ptr::null_mut()),
        offset: err.offset().unwrap_or(0),
        has_offset: if err.offset().is_some() { 1 } else { 0 },
    });
    unsafe {
        *out_err = Box::into_raw(error);
    }
    -1
}

fn to_c_string(input: &str) -> *mut c_char {
    CString::new(input)
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}

fn error_kind_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::AlreadyExists => 4,
        ErrorKind::Permission => 5,
        ErrorKind::Corrupt => 6,
        ErrorKind::Io => 7,
    }
}
