// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Declaration parsing.
//!
//! Minimal scanner for the `keyword argument` declarations found at the top
//! of Go-style source files, e.g., `module github.com/foo/bar` in a manifest,
//! or `package main` in a source file. It is not a real parser. It only knows
//! enough about line comments, block comments, and quoted literals to avoid
//! being fooled by them.
//!
//! # Comments
//!
//! Anything after `//` on a line is ignored. A `/*` opens a block comment
//! that runs until the next `*/` anywhere in the remaining input, and
//! scanning picks back up right after it. A block comment that never closes
//! swallows the rest of the input.

use std::{
    fs::{read, read_dir},
    path::Path,
};
use tracing::{debug, instrument};

/// File name of the manifest that declares a project's identity.
pub const MANIFEST_FILE: &str = "go.mod";

/// Suffix of the source files inspected by [`try_find_package`].
pub const SOURCE_SUFFIX: &str = ".go";

const MODULE_KEYWORD: &[u8] = b"module";
const PACKAGE_KEYWORD: &[u8] = b"package";

const LINE_COMMENT: &[u8] = b"//";
const BLOCK_COMMENT_START: &[u8] = b"/*";
const BLOCK_COMMENT_END: &[u8] = b"*/";

/// Extract module path declared in manifest contents.
///
/// Returns `None` if no `module` declaration exists, or if its argument is
/// a malformed quoted literal.
pub fn module_path(contents: &[u8]) -> Option<Vec<u8>> {
    parse_declaration(contents, MODULE_KEYWORD)
}

/// Extract package name declared in source file contents.
pub fn package_name(contents: &[u8]) -> Option<Vec<u8>> {
    parse_declaration(contents, PACKAGE_KEYWORD)
}

/// Extract argument of first `keyword` declaration in `contents`.
///
/// The keyword must start its line (after leading whitespace), and must be
/// followed by whitespace, so `module` never matches `moduleX`. Quoted or raw
/// string arguments are unquoted. A malformed quoted argument stops the scan
/// entirely and yields `None`.
pub fn parse_declaration(contents: &[u8], keyword: &[u8]) -> Option<Vec<u8>> {
    let mut pos = 0;
    while pos < contents.len() {
        let line_start = pos;
        let (mut line, next) = match find(&contents[pos..], b"\n") {
            Some(idx) => (&contents[pos..pos + idx], pos + idx + 1),
            None => (&contents[pos..], contents.len()),
        };
        pos = next;

        if let Some(idx) = find(line, LINE_COMMENT) {
            line = &line[..idx];
        }

        // INVARIANT: Block comments may close on a later line, so search the
        // whole remaining input starting right after the opening marker.
        if let Some(idx) = find(line, BLOCK_COMMENT_START) {
            let open = line_start + idx + BLOCK_COMMENT_START.len();
            match find(&contents[open..], BLOCK_COMMENT_END) {
                Some(end) => pos = open + end + BLOCK_COMMENT_END.len(),
                None => return None,
            }
            continue;
        }

        let line = trim_space(line);
        let Some(argument) = line.strip_prefix(keyword) else {
            continue;
        };

        // INVARIANT: Keyword must be a whole word.
        if !starts_with_space(argument) {
            continue;
        }

        let argument = trim_space(argument);
        if argument.is_empty() {
            continue;
        }

        if argument[0] == b'"' || argument[0] == b'`' {
            return match unquote(argument) {
                Ok(value) => Some(value),
                Err(error) => {
                    debug!("malformed declaration argument: {error}");
                    None
                }
            };
        }

        return Some(argument.to_vec());
    }

    None
}

/// Discover package name of Go source files next to or inside `path`.
///
/// A `path` with a file extension is treated as a file: its directory gets
/// searched, and the file itself is skipped. Only the top-level of the
/// directory is searched. Unreadable files are skipped silently.
#[instrument(skip(path), level = "debug")]
pub fn try_find_package(path: impl AsRef<Path>) -> Option<Vec<u8>> {
    let path = path.as_ref();

    // INVARIANT: Decide by extension alone, since the path may not exist yet.
    let (dir, ignore) = if has_extension(path) {
        (path.parent().unwrap_or(Path::new("")), path.file_name())
    } else {
        (path, None)
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    let entries = match read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            debug!("cannot read {:?}: {error}", dir.display());
            return None;
        }
    };

    let mut candidates = Vec::new();
    for entry in entries.flatten() {
        if entry.file_type().is_ok_and(|kind| kind.is_dir()) {
            continue;
        }

        let name = entry.file_name();
        if ignore == Some(name.as_os_str()) {
            continue;
        }

        if !name.to_string_lossy().ends_with(SOURCE_SUFFIX) {
            continue;
        }

        candidates.push(entry.path());
    }
    candidates.sort();

    candidates.into_iter().find_map(|candidate| {
        debug!("inspect {:?}", candidate.display());
        read(&candidate)
            .ok()
            .and_then(|contents| package_name(&contents))
            .filter(|pkg| !pkg.is_empty())
    })
}

/// Decode a Go string literal.
///
/// Accepts interpreted literals (`"..."` with backslash escapes) and raw
/// literals (`` `...` ``). The entire input must be exactly one literal.
///
/// # Errors
///
/// - Return [`UnquoteError`] if the literal is unterminated, has trailing
///   text, or contains an invalid escape sequence.
pub fn unquote(literal: &[u8]) -> Result<Vec<u8>> {
    let (&quote, body) = literal.split_first().ok_or(UnquoteError::Empty)?;
    let body = body
        .strip_suffix(&[quote])
        .ok_or(UnquoteError::Unterminated)?;

    match quote {
        b'`' => {
            if body.contains(&b'`') {
                return Err(UnquoteError::Unterminated);
            }

            // INVARIANT: Carriage returns are discarded from raw literals.
            Ok(body.iter().copied().filter(|byte| *byte != b'\r').collect())
        }
        b'"' => unescape(body),
        other => Err(UnquoteError::BadQuote(other as char)),
    }
}

fn unescape(body: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(body.len());
    let mut idx = 0;
    while idx < body.len() {
        let byte = body[idx];
        match byte {
            b'"' | b'\n' => return Err(UnquoteError::Unterminated),
            b'\\' => {
                let escape = *body.get(idx + 1).ok_or(UnquoteError::Unterminated)?;
                idx += 2;
                match escape {
                    b'a' => out.push(0x07),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'v' => out.push(0x0b),
                    b'\\' => out.push(b'\\'),
                    b'"' => out.push(b'"'),
                    b'x' => {
                        out.push(hex_value(body, idx, 2)? as u8);
                        idx += 2;
                    }
                    b'u' | b'U' => {
                        let width = if escape == b'u' { 4 } else { 8 };
                        let code = hex_value(body, idx, width)?;
                        let ch = char::from_u32(code).ok_or(UnquoteError::BadEscape)?;
                        let mut buf = [0u8; 4];
                        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                        idx += width;
                    }
                    b'0'..=b'7' => {
                        let digits = body.get(idx - 1..idx + 2).ok_or(UnquoteError::BadEscape)?;
                        let mut value: u32 = 0;
                        for digit in digits {
                            if !(b'0'..=b'7').contains(digit) {
                                return Err(UnquoteError::BadEscape);
                            }
                            value = value * 8 + u32::from(digit - b'0');
                        }
                        out.push(u8::try_from(value).map_err(|_| UnquoteError::BadEscape)?);
                        idx += 2;
                    }
                    _ => return Err(UnquoteError::BadEscape),
                }
            }
            _ => {
                out.push(byte);
                idx += 1;
            }
        }
    }

    Ok(out)
}

fn hex_value(body: &[u8], start: usize, width: usize) -> Result<u32> {
    let digits = body
        .get(start..start + width)
        .ok_or(UnquoteError::BadEscape)?;
    digits.iter().try_fold(0u32, |acc, digit| {
        let value = (*digit as char).to_digit(16).ok_or(UnquoteError::BadEscape)?;
        Ok(acc * 16 + value)
    })
}

/// Check for a dot in the final path segment.
///
/// Unlike [`Path::extension`], dotfiles like ".hidden" count as having an
/// extension, and a trailing separator means no extension.
fn has_extension(path: &Path) -> bool {
    let path = path.to_string_lossy();
    let segment = match path.rfind(std::path::is_separator) {
        Some(idx) => &path[idx + 1..],
        None => &path[..],
    };

    segment.contains('.')
}

/// Trim leading and trailing Unicode whitespace.
///
/// Invalid UTF-8 is never whitespace, and is left in place.
fn trim_space(bytes: &[u8]) -> &[u8] {
    let start = match bytes.utf8_chunks().next() {
        Some(chunk) => chunk.valid().len() - chunk.valid().trim_start().len(),
        None => return bytes,
    };
    let bytes = &bytes[start..];

    let end = match bytes.utf8_chunks().last() {
        Some(chunk) if chunk.invalid().is_empty() => {
            bytes.len() - (chunk.valid().len() - chunk.valid().trim_end().len())
        }
        _ => bytes.len(),
    };

    &bytes[..end]
}

fn starts_with_space(bytes: &[u8]) -> bool {
    bytes
        .utf8_chunks()
        .next()
        .and_then(|chunk| chunk.valid().chars().next())
        .is_some_and(char::is_whitespace)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Quoted declaration argument cannot be decoded.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UnquoteError {
    /// Nothing to unquote.
    #[error("empty literal")]
    Empty,

    /// Literal is not closed, or has text trailing its closing quote.
    #[error("unterminated string literal")]
    Unterminated,

    /// Literal does not start with a supported quote character.
    #[error("unsupported quote character {0:?}")]
    BadQuote(char),

    /// Literal contains an invalid escape sequence.
    #[error("invalid escape sequence")]
    BadEscape,
}

/// Friendly result alias :3
type Result<T, E = UnquoteError> = std::result::Result<T, E>;
