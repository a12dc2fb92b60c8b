// One-pass bundle construction: validate the request, read inputs in order,
// form the Bundle. Strict mode is all-or-nothing; skip mode records failures
// at file boundaries and keeps going.
use crate::core::entry::{Bundle, BundleRequest, FileEntry, base_name, duplicate_name_error};
use crate::core::error::{Error, ErrorKind};
use std::collections::HashSet;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorPolicy {
    Stop,
    Skip,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BuildOptions {
    pub on_error: ErrorPolicy,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self {
            on_error: ErrorPolicy::Stop,
        }
    }

    pub fn with_error_policy(mut self, on_error: ErrorPolicy) -> Self {
        self.on_error = on_error;
        self
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct BuildOutcome {
    pub bundle: Bundle,
    pub skipped: Vec<SkippedFile>,
}

pub fn build(request: &BundleRequest, options: BuildOptions) -> Result<BuildOutcome, Error> {
    // Name validation happens before any file is opened, so a bad request
    // fails the same way regardless of what is on disk.
    let names = resolve_names(&request.files)?;

    let mut entries = Vec::with_capacity(request.files.len());
    let mut skipped = Vec::new();
    for (path, name) in request.files.iter().zip(&names) {
        match read_regular_file(path) {
            Ok(content) => {
                debug!(path = %path.display(), bytes = content.len(), "read input file");
                entries.push(FileEntry::new(name.clone(), content)?);
            }
            Err(err) => match options.on_error {
                ErrorPolicy::Stop => return Err(err),
                ErrorPolicy::Skip => {
                    warn!(path = %path.display(), "skipping unreadable input");
                    skipped.push(SkippedFile {
                        path: path.clone(),
                        message: error_summary(&err),
                    });
                }
            },
        }
    }

    let bundle = Bundle::new(
        request.prologue.clone(),
        entries,
        request.postscript.clone(),
    )?;
    Ok(BuildOutcome { bundle, skipped })
}

fn resolve_names(files: &[PathBuf]) -> Result<Vec<String>, Error> {
    let mut names = Vec::with_capacity(files.len());
    let mut seen = HashSet::new();
    for path in files {
        let name = base_name(path)?;
        if !seen.insert(name.clone()) {
            return Err(duplicate_name_error(&name).with_path(path));
        }
        names.push(name);
    }
    Ok(names)
}

fn read_regular_file(path: &Path) -> Result<Vec<u8>, Error> {
    let metadata =
        fs::metadata(path).map_err(|err| io_error(path, "failed to read input file", err))?;
    if !metadata.is_file() {
        return Err(Error::new(ErrorKind::Io)
            .with_message("input is not a regular file")
            .with_path(path));
    }
    fs::read(path).map_err(|err| io_error(path, "failed to read input file", err))
}

fn io_error(path: &Path, message: &str, err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message(message)
        .with_path(path)
        .with_source(err)
}

fn error_summary(err: &Error) -> String {
    match (err.message(), err.source()) {
        (Some(message), Some(source)) => format!("{message}: {source}"),
        (Some(message), None) => message.to_string(),
        _ => err.to_string(),
    }
}
