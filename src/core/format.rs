// Artifact layout: shell preamble/trailer, manifest markers, entry blocks,
// base64 wrapping, and the quoting grammar shared by the writer and scanner.
// Sections are size-delimited so prologue/postscript round-trip byte-exactly.
use crate::core::entry::{Bundle, FileEntry};
use crate::core::error::{Error, ErrorKind};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

pub const FORMAT_VERSION: u32 = 1;
pub const SHEBANG: &str = "#!/bin/sh";
pub const MARKER_PROLOGUE: &str = "#mshar:prologue";
pub const MARKER_ENTRY: &str = "#mshar:entry";
pub const MARKER_POSTSCRIPT: &str = "#mshar:postscript";
pub const MARKER_END: &str = "#mshar:end";
// '@' is outside the base64 alphabet, so a payload line can never match.
pub const HEREDOC_DELIM: &str = "@mshar@";
pub const B64_LINE_WIDTH: usize = 76;

pub fn preamble() -> String {
    format!(
        "{SHEBANG}\n\
         # mshar {FORMAT_VERSION}: self-extracting shell archive.\n\
         # Run this file with a POSIX shell in the directory to extract into.\n\
         # Extraction needs a base64 decoder (coreutils base64 or compatible) on PATH.\n\
         mshar_b64=\"$(command -v base64 || true)\"\n\
         if test -z \"$mshar_b64\"; then\n\
         \x20   echo 'mshar: no base64 decoder found on PATH; cannot extract' >&2\n\
         \x20   exit 1\n\
         fi\n"
    )
}

pub fn render(bundle: &Bundle) -> String {
    let mut out = String::new();
    out.push_str(&preamble());
    push_sized_section(&mut out, MARKER_PROLOGUE, bundle.prologue());
    for entry in bundle.entries() {
        push_entry_block(&mut out, entry);
    }
    push_sized_section(&mut out, MARKER_POSTSCRIPT, bundle.postscript());
    out.push_str(MARKER_END);
    out.push_str(&format!(" entries={}\n", bundle.entries().len()));
    out.push_str("exit 0\n");
    out
}

// Marker line, verbatim section bytes, then one structural newline. The
// declared size lets the scanner slice the section without interpreting it.
fn push_sized_section(out: &mut String, marker: &str, text: &str) {
    out.push_str(marker);
    out.push_str(&format!(" size={}\n", text.len()));
    out.push_str(text);
    out.push('\n');
}

fn push_entry_block(out: &mut String, entry: &FileEntry) {
    let quoted = shell_quote(entry.name());
    out.push_str(&format!(
        "{MARKER_ENTRY} name={quoted} size={} sha256={}\n",
        entry.size(),
        entry.sha256_hex()
    ));
    out.push_str(&format!("mshar_name={quoted}\n"));
    out.push_str("echo \"x - $mshar_name\"\n");
    out.push_str(&format!(
        "\"$mshar_b64\" -d > \"./$mshar_name\" << '{HEREDOC_DELIM}'\n"
    ));
    out.push_str(&encode_payload(entry.content()));
    out.push_str(HEREDOC_DELIM);
    out.push('\n');
    out.push('\n');
}

/// The exact decode line an entry block uses; the scanner matches it verbatim.
pub fn decode_line() -> String {
    format!("\"$mshar_b64\" -d > \"./$mshar_name\" << '{HEREDOC_DELIM}'")
}

pub fn encode_payload(content: &[u8]) -> String {
    let encoded = STANDARD.encode(content);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / B64_LINE_WIDTH + 2);
    let mut rest = encoded.as_str();
    while rest.len() > B64_LINE_WIDTH {
        let (line, tail) = rest.split_at(B64_LINE_WIDTH);
        out.push_str(line);
        out.push('\n');
        rest = tail;
    }
    if !rest.is_empty() {
        out.push_str(rest);
        out.push('\n');
    }
    out
}

pub fn decode_payload(lines: &str) -> Result<Vec<u8>, Error> {
    let joined: String = lines.split('\n').collect();
    STANDARD.decode(joined.as_bytes()).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message("entry payload is not valid base64")
            .with_source(err)
    })
}

/// POSIX single-quote escaping: wrap in quotes, embed quotes as `'\''`.
pub fn shell_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Inverse of `shell_quote` for tokens at the start of `input`; returns the
/// unquoted value and the number of bytes consumed.
pub fn shell_unquote(input: &str) -> Result<(String, usize), Error> {
    let bytes = input.as_bytes();
    if bytes.first() != Some(&b'\'') {
        return Err(Error::new(ErrorKind::Corrupt).with_message("marker name is not single-quoted"));
    }
    let mut out = String::new();
    let mut pos = 0usize;
    loop {
        match bytes.get(pos) {
            Some(b'\'') => {
                pos += 1;
                let start = pos;
                while let Some(&b) = bytes.get(pos) {
                    if b == b'\'' {
                        break;
                    }
                    pos += 1;
                }
                if bytes.get(pos) != Some(&b'\'') {
                    return Err(Error::new(ErrorKind::Corrupt)
                        .with_message("unterminated quote in marker name"));
                }
                out.push_str(&input[start..pos]);
                pos += 1;
            }
            Some(b'\\') if bytes.get(pos + 1) == Some(&b'\'') => {
                out.push('\'');
                pos += 2;
            }
            _ => break,
        }
    }
    Ok((out, pos))
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntryMarker {
    pub name: String,
    pub size: u64,
    pub sha256_hex: String,
}

pub fn parse_entry_marker(line: &str) -> Result<EntryMarker, Error> {
    let rest = line
        .strip_prefix(MARKER_ENTRY)
        .and_then(|rest| rest.strip_prefix(" name="))
        .ok_or_else(|| corrupt("malformed entry marker"))?;
    let (name, consumed) = shell_unquote(rest)?;
    crate::core::entry::validate_entry_name(&name)
        .map_err(|_| corrupt("invalid entry name in marker"))?;
    let rest = rest[consumed..]
        .strip_prefix(" size=")
        .ok_or_else(|| corrupt("entry marker is missing size"))?;
    let (size_text, rest) = rest
        .split_once(' ')
        .ok_or_else(|| corrupt("entry marker is missing digest"))?;
    let size: u64 = size_text
        .parse()
        .map_err(|_| corrupt("entry marker size is not a number"))?;
    let sha256_hex = rest
        .strip_prefix("sha256=")
        .ok_or_else(|| corrupt("entry marker is missing digest"))?;
    if sha256_hex.len() != 64 || !sha256_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(corrupt("entry marker digest is malformed"));
    }
    Ok(EntryMarker {
        name,
        size,
        sha256_hex: sha256_hex.to_ascii_lowercase(),
    })
}

pub fn parse_sized_marker(line: &str, marker: &str) -> Result<u64, Error> {
    line.strip_prefix(marker)
        .and_then(|rest| rest.strip_prefix(" size="))
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| corrupt("malformed section marker"))
}

pub fn parse_end_marker(line: &str) -> Result<u64, Error> {
    line.strip_prefix(MARKER_END)
        .and_then(|rest| rest.strip_prefix(" entries="))
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| corrupt("malformed end marker"))
}

fn corrupt(message: &str) -> Error {
    Error::new(ErrorKind::Corrupt).with_message(message)
}
