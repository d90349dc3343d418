//! Reading module source from disk

use crate::error::BuildError;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// PEP 263 encoding declaration
static CODING_COOKIE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t\f]*#.*?coding[:=][ \t]*([-\w.]+)").expect("coding cookie pattern"));

/// Decoded file content
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub text: String,
    pub bytes: Vec<u8>,
    pub encoding: String,
}

/// Read `path` and decode it according to its declared encoding
pub fn read_source(path: &Path, modname: &str) -> Result<SourceFile, BuildError> {
    let bytes = std::fs::read(path).map_err(|source| BuildError::Io {
        modname: modname.to_string(),
        path: path.to_path_buf(),
        source,
    })?;
    let encoding = detect_encoding(&bytes);
    let text = decode(&bytes, &encoding, modname)?;
    Ok(SourceFile { text, bytes, encoding })
}

/// Encoding from a BOM or a coding declaration on the first two lines.
///
/// The second line only counts when the first is blank or a comment.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if bytes.starts_with(b"\xef\xbb\xbf") {
        return "utf-8".to_string();
    }
    for line in bytes.split(|b| *b == b'\n').take(2) {
        let line = String::from_utf8_lossy(line);
        if let Some(cookie) = CODING_COOKIE.captures(&line) {
            return cookie[1].to_ascii_lowercase();
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            break;
        }
    }
    "utf-8".to_string()
}

fn decode(bytes: &[u8], encoding: &str, modname: &str) -> Result<String, BuildError> {
    let invalid = || BuildError::Decode {
        modname: modname.to_string(),
        encoding: encoding.to_string(),
    };
    match encoding.replace('_', "-").as_str() {
        "utf-8" | "utf8" | "utf-8-sig" => {
            let body = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
            String::from_utf8(body.to_vec()).map_err(|_| invalid())
        }
        "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => Ok(bytes.iter().map(|b| char::from(*b)).collect()),
        "ascii" | "us-ascii" => {
            if bytes.is_ascii() {
                Ok(String::from_utf8_lossy(bytes).into_owned())
            } else {
                Err(invalid())
            }
        }
        _ => Err(BuildError::Encoding {
            modname: modname.to_string(),
            encoding: encoding.to_string(),
        }),
    }
}
