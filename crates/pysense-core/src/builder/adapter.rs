//! Syntax adapter: raw text to a primitive parse tree

use crate::tree::Location;
use rustpython_ast::Suite;
use rustpython_parser::Parse;
use std::fmt;

/// Structured failure reported by a [`SyntaxAdapter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub location: Location,
    /// The failure is an annotation comment in a position the grammar rejects
    pub misplaced_type_annotation: bool,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.location)
    }
}

/// Producer of primitive parse trees.
///
/// Implementations must be deterministic: the same text always yields the
/// same tree or the same error.
pub trait SyntaxAdapter: Send + Sync {
    fn parse(&self, text: &str, source_path: &str, type_comments: bool) -> Result<Suite, SyntaxError>;
}

/// Adapter backed by the RustPython parser
#[derive(Debug, Default, Clone, Copy)]
pub struct RustPythonAdapter;

impl RustPythonAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SyntaxAdapter for RustPythonAdapter {
    fn parse(&self, text: &str, source_path: &str, _type_comments: bool) -> Result<Suite, SyntaxError> {
        // The RustPython grammar treats annotation comments as plain comments,
        // so the flag never changes the outcome here.
        Suite::parse(text, source_path).map_err(|err| SyntaxError {
            message: err.error.to_string(),
            location: LineIndex::new(text).location(usize::from(err.offset)),
            misplaced_type_annotation: false,
        })
    }
}

/// Byte offset to line/column mapping for one source text
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    pub fn location(&self, offset: usize) -> Location {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        };
        let column = offset.saturating_sub(self.line_starts[line]);
        Location::new(line as u32 + 1, column as u32)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index_locations() {
        let index = LineIndex::new("a = 1\nbb = 2\n\nc");
        assert_eq!(index.location(0), Location::new(1, 0));
        assert_eq!(index.location(4), Location::new(1, 4));
        assert_eq!(index.location(6), Location::new(2, 0));
        assert_eq!(index.location(9), Location::new(2, 3));
        assert_eq!(index.location(14), Location::new(4, 0));
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn test_parse_ok() {
        let suite = RustPythonAdapter.parse("x = 1\n", "<test>", true).unwrap();
        assert_eq!(suite.len(), 1);
    }

    #[test]
    fn test_parse_error_has_location() {
        let err = RustPythonAdapter.parse("x = 1\ndef (:\n", "<test>", true).unwrap_err();
        assert_eq!(err.location.line, 2);
        assert!(!err.misplaced_type_annotation);
        assert!(!err.message.is_empty());
    }
}
