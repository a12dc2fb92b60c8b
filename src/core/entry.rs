// Bundle data model: file entries, build requests, and assembled bundles.
// Entry names are base names; uniqueness is enforced when a bundle is formed.
use crate::core::error::{Error, ErrorKind};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One embedded file: base name plus the exact bytes read from disk.
/// Immutable once constructed; the digest is fixed at read time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileEntry {
    name: String,
    content: Vec<u8>,
    sha256: [u8; 32],
}

impl FileEntry {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Result<Self, Error> {
        let name = name.into();
        validate_entry_name(&name)?;
        let sha256 = Sha256::digest(&content).into();
        Ok(Self {
            name,
            content,
            sha256,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn sha256(&self) -> &[u8; 32] {
        &self.sha256
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }
}

/// Caller-supplied build input; consumed once by the builder.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BundleRequest {
    pub prologue: String,
    pub postscript: String,
    pub files: Vec<PathBuf>,
}

impl BundleRequest {
    pub fn new(
        prologue: impl Into<String>,
        postscript: impl Into<String>,
        files: Vec<PathBuf>,
    ) -> Self {
        Self {
            prologue: prologue.into(),
            postscript: postscript.into(),
            files,
        }
    }
}

/// The single output artifact: prologue, ordered entries, postscript.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bundle {
    prologue: String,
    entries: Vec<FileEntry>,
    postscript: String,
}

impl Bundle {
    /// Forms a bundle, enforcing the unique-name invariant across entries.
    pub fn new(
        prologue: impl Into<String>,
        entries: Vec<FileEntry>,
        postscript: impl Into<String>,
    ) -> Result<Self, Error> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name().to_string()) {
                return Err(duplicate_name_error(entry.name()));
            }
        }
        Ok(Self {
            prologue: prologue.into(),
            entries,
            postscript: postscript.into(),
        })
    }

    pub fn prologue(&self) -> &str {
        &self.prologue
    }

    pub fn postscript(&self) -> &str {
        &self.postscript
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Serializes the bundle into the self-extracting artifact text.
    pub fn render(&self) -> String {
        crate::core::format::render(self)
    }
}

/// Resolves the manifest name for an input path: its final component.
pub fn base_name(path: &Path) -> Result<String, Error> {
    let name = path.file_name().ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message("input path has no file name")
            .with_path(path)
    })?;
    let name = name.to_str().ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message("input file name is not valid UTF-8")
            .with_path(path)
    })?;
    validate_entry_name(name).map_err(|err| err.with_path(path))?;
    Ok(name.to_string())
}

/// Entry names must survive both the marker line and the shell assignment:
/// non-empty, no path separators, no control characters (covers newline/NUL).
pub fn validate_entry_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("entry name is empty"));
    }
    if name.contains('/') {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("entry name contains a path separator")
            .with_entry(name));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("entry name contains control characters")
            .with_entry(name));
    }
    Ok(())
}

pub(crate) fn duplicate_name_error(name: &str) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message("duplicate entry name in bundle")
        .with_entry(name)
        .with_hint("Entries are stored under their base names; rename inputs that collide.")
}
