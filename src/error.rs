//! Diagnostic reporting: source filename, line, column caret, message.
//!
//! Layers `anyhow::Context` over a root cause but gives lex/parse/semantic
//! failures a typed payload instead of a bare string, so a caret-annotated
//! report can be rendered uniformly no matter how many `.context(...)`
//! frames wrap it.

use std::fmt;

use anyhow::Error;

/// A single fatal front-end error: file, 1-based line/column, the offending
/// source line, and a human message. `Display` renders it the way a C
/// compiler traditionally does: the message, then the line, then a caret.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub source_line: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:{}: error: {}", self.file, self.line, self.message)?;
        writeln!(f, "{}", self.source_line)?;
        write!(f, "{}^", " ".repeat(self.column.saturating_sub(1)))
    }
}

impl std::error::Error for Diagnostic {}

/// Build a `Diagnostic` for a byte offset into `buf`, computing line/column
/// by scanning backwards/forwards from `loc`.
pub fn diagnostic_at(file: &str, buf: &[u8], loc: usize, message: impl Into<String>) -> Diagnostic {
    let loc = loc.min(buf.len().saturating_sub(1));
    let line_start = buf[..loc].iter().rposition(|&b| b == b'\n').map(|i| i + 1).unwrap_or(0);
    let line_end = buf[loc..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| loc + i)
        .unwrap_or(buf.len());
    let line = buf[..loc].iter().filter(|&&b| b == b'\n').count() + 1;
    let column = loc - line_start + 1;
    let source_line = String::from_utf8_lossy(&buf[line_start..line_end]).into_owned();
    Diagnostic {
        file: file.to_string(),
        line,
        column,
        source_line,
        message: message.into(),
    }
}

/// Wraps a `Diagnostic` as an `anyhow::Error` so call sites can `bail!`/`?`
/// it like any other error.
pub fn error_at(file: &str, buf: &[u8], loc: usize, message: impl Into<String>) -> Error {
    Error::new(diagnostic_at(file, buf, loc, message))
}
