// Structural walk over an artifact: markers, sized sections, payload decode.
// Structural breakage fails fast with an offset; per-entry integrity
// mismatches are collected as issues so verification can report them all.
// Scanning never executes any of the embedded script text.
use crate::core::error::{Error, ErrorKind};
use crate::core::format::{
    self, FORMAT_VERSION, HEREDOC_DELIM, MARKER_END, MARKER_ENTRY, MARKER_POSTSCRIPT,
    MARKER_PROLOGUE, SHEBANG,
};
use bstr::ByteSlice;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::debug;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScannedEntry {
    pub name: String,
    pub declared_size: u64,
    pub declared_sha256: String,
    /// Decoded payload bytes; `None` when the payload failed to decode.
    pub content: Option<Vec<u8>>,
    /// Byte offset of the entry marker line in the artifact.
    pub offset: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScanIssue {
    pub code: String,
    pub message: String,
    pub entry: Option<String>,
    pub offset: Option<u64>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScannedBundle {
    pub prologue: String,
    pub postscript: String,
    pub entries: Vec<ScannedEntry>,
    pub declared_entries: u64,
    pub issues: Vec<ScanIssue>,
}

pub fn scan(text: &[u8]) -> Result<ScannedBundle, Error> {
    let mut cursor = Cursor::new(text);

    let (first, offset) = cursor.next_line("missing shell archive shebang")?;
    if first != SHEBANG.as_bytes() {
        return Err(corrupt_at("missing shell archive shebang", offset));
    }
    let (version_line, offset) = cursor.next_line("missing format version line")?;
    check_format_version(version_line, offset)?;

    let prologue = read_sized_section(&mut cursor, MARKER_PROLOGUE, "prologue")?;

    let mut entries: Vec<ScannedEntry> = Vec::new();
    let mut issues = Vec::new();
    let mut seen_names = HashSet::new();
    let postscript = loop {
        let (line, offset) = cursor.next_line("missing postscript marker")?;
        if line.is_empty() {
            continue;
        }
        if line.starts_with(MARKER_POSTSCRIPT.as_bytes()) {
            break read_section_body(&mut cursor, line, offset, MARKER_POSTSCRIPT, "postscript")?;
        }
        if line.starts_with(MARKER_ENTRY.as_bytes()) {
            let entry = read_entry_block(&mut cursor, line, offset, &mut issues)?;
            if !seen_names.insert(entry.name.clone()) {
                issues.push(ScanIssue {
                    code: "duplicate-name".to_string(),
                    message: "entry name appears more than once".to_string(),
                    entry: Some(entry.name.clone()),
                    offset: Some(entry.offset),
                });
            }
            entries.push(entry);
            continue;
        }
        return Err(corrupt_at("unexpected content between entry blocks", offset));
    };

    let declared_entries = loop {
        let (line, offset) = cursor.next_line("missing archive trailer")?;
        if line.is_empty() {
            continue;
        }
        if line.starts_with(MARKER_END.as_bytes()) {
            let text = line_as_str(line, offset)?;
            break format::parse_end_marker(text).map_err(|err| err.with_offset(offset))?;
        }
        return Err(corrupt_at("missing archive trailer", offset));
    };
    if declared_entries != entries.len() as u64 {
        issues.push(ScanIssue {
            code: "count-mismatch".to_string(),
            message: format!(
                "trailer declares {declared_entries} entries, found {}",
                entries.len()
            ),
            entry: None,
            offset: None,
        });
    }

    debug!(
        entries = entries.len(),
        issues = issues.len(),
        "scanned archive"
    );
    Ok(ScannedBundle {
        prologue,
        postscript,
        entries,
        declared_entries,
        issues,
    })
}

fn check_format_version(line: &[u8], offset: u64) -> Result<(), Error> {
    let text = line_as_str(line, offset)?;
    let version = text
        .strip_prefix("# mshar ")
        .and_then(|rest| rest.split_once(':'))
        .and_then(|(version, _)| version.parse::<u32>().ok())
        .ok_or_else(|| corrupt_at("missing format version line", offset))?;
    if version != FORMAT_VERSION {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("unsupported mshar format version {version}"))
            .with_hint(format!("This build reads mshar format {FORMAT_VERSION}.")));
    }
    Ok(())
}

// Scans forward to the section marker, then slices the declared byte count.
fn read_sized_section(cursor: &mut Cursor<'_>, marker: &str, what: &str) -> Result<String, Error> {
    loop {
        let missing = format!("missing {what} marker");
        let (line, offset) = cursor.next_line(&missing)?;
        if line.starts_with(marker.as_bytes()) {
            return read_section_body(cursor, line, offset, marker, what);
        }
    }
}

fn read_section_body(
    cursor: &mut Cursor<'_>,
    line: &[u8],
    offset: u64,
    marker: &str,
    what: &str,
) -> Result<String, Error> {
    let text = line_as_str(line, offset)?;
    let size = format::parse_sized_marker(text, marker).map_err(|err| err.with_offset(offset))?;
    let size = usize::try_from(size)
        .map_err(|_| corrupt_at(&format!("{what} section exceeds archive length"), offset))?;
    let body = cursor.take(size, what)?;
    let body = std::str::from_utf8(body)
        .map_err(|_| corrupt_at(&format!("{what} is not valid UTF-8"), offset))?
        .to_string();
    cursor.expect_newline(what)?;
    Ok(body)
}

fn read_entry_block(
    cursor: &mut Cursor<'_>,
    marker_line: &[u8],
    marker_offset: u64,
    issues: &mut Vec<ScanIssue>,
) -> Result<ScannedEntry, Error> {
    let text = line_as_str(marker_line, marker_offset)?;
    let marker = format::parse_entry_marker(text).map_err(|err| err.with_offset(marker_offset))?;

    let assign = format!("mshar_name={}", format::shell_quote(&marker.name));
    expect_line(cursor, assign.as_bytes(), "malformed entry block")?;
    expect_line(
        cursor,
        b"echo \"x - $mshar_name\"",
        "malformed entry block",
    )?;
    expect_line(
        cursor,
        format::decode_line().as_bytes(),
        "malformed entry block",
    )?;

    let mut payload = String::new();
    loop {
        let (line, offset) = cursor.next_line("unterminated entry payload")?;
        if line == HEREDOC_DELIM.as_bytes() {
            break;
        }
        let line = line_as_str(line, offset)?;
        if !payload.is_empty() {
            payload.push('\n');
        }
        payload.push_str(line);
    }

    let content = match format::decode_payload(&payload) {
        Ok(content) => Some(content),
        Err(err) => {
            issues.push(ScanIssue {
                code: "payload".to_string(),
                message: err
                    .message()
                    .unwrap_or("entry payload is not valid base64")
                    .to_string(),
                entry: Some(marker.name.clone()),
                offset: Some(marker_offset),
            });
            None
        }
    };
    if let Some(content) = &content {
        if content.len() as u64 != marker.size {
            issues.push(ScanIssue {
                code: "size-mismatch".to_string(),
                message: format!(
                    "declared size {} does not match decoded {} bytes",
                    marker.size,
                    content.len()
                ),
                entry: Some(marker.name.clone()),
                offset: Some(marker_offset),
            });
        }
        let digest = hex::encode(Sha256::digest(content));
        if digest != marker.sha256_hex {
            issues.push(ScanIssue {
                code: "digest-mismatch".to_string(),
                message: "decoded content does not match declared sha256".to_string(),
                entry: Some(marker.name.clone()),
                offset: Some(marker_offset),
            });
        }
    }

    Ok(ScannedEntry {
        name: marker.name,
        declared_size: marker.size,
        declared_sha256: marker.sha256_hex,
        content,
        offset: marker_offset,
    })
}

fn expect_line(cursor: &mut Cursor<'_>, expected: &[u8], message: &str) -> Result<(), Error> {
    let (line, offset) = cursor.next_line(message)?;
    if line != expected {
        return Err(corrupt_at(message, offset));
    }
    Ok(())
}

fn line_as_str(line: &[u8], offset: u64) -> Result<&str, Error> {
    line.to_str()
        .map_err(|_| corrupt_at("archive line is not valid UTF-8", offset))
}

fn corrupt_at(message: &str, offset: u64) -> Error {
    Error::new(ErrorKind::Corrupt)
        .with_message(message)
        .with_offset(offset)
}

struct Cursor<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a [u8]) -> Self {
        Self { text, pos: 0 }
    }

    fn next_line(&mut self, eof_message: &str) -> Result<(&'a [u8], u64), Error> {
        if self.pos >= self.text.len() {
            return Err(corrupt_at(eof_message, self.pos as u64));
        }
        let offset = self.pos as u64;
        let rest = &self.text[self.pos..];
        match rest.find_byte(b'\n') {
            Some(index) => {
                self.pos += index + 1;
                Ok((&rest[..index], offset))
            }
            None => {
                self.pos = self.text.len();
                Ok((rest, offset))
            }
        }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.text.len())
            .ok_or_else(|| {
                corrupt_at(
                    &format!("{what} section exceeds archive length"),
                    self.pos as u64,
                )
            })?;
        let body = &self.text[self.pos..end];
        self.pos = end;
        Ok(body)
    }

    fn expect_newline(&mut self, what: &str) -> Result<(), Error> {
        if self.text.get(self.pos) != Some(&b'\n') {
            return Err(corrupt_at(
                &format!("{what} section is not newline-terminated"),
                self.pos as u64,
            ));
        }
        self.pos += 1;
        Ok(())
    }
}
