//! Lexical analysis: turns a source buffer into a flat, indexable token
//! stream. Accepts any `Read`-like source and normalizes it into an owned
//! byte buffer up front rather than streaming: the whole translation unit
//! is small enough that holding it in memory is simpler and lets every
//! token keep a cheap byte offset instead of an owning slice.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::error_at;

/// One already-read-in source file: name (for diagnostics) plus a buffer
/// guaranteed to end with `'\n'` then `'\0'`.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub buf: Vec<u8>,
}

impl SourceFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut buf = Vec::new();
        std::fs::File::open(path)
            .with_context(|| format!("opening {}", path.display()))?
            .read_to_end(&mut buf)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Self::new(path.display().to_string(), buf))
    }

    pub fn from_stdin() -> Result<Self> {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("reading standard input")?;
        Ok(Self::new("<stdin>".to_string(), buf))
    }

    /// Test/library entry point: wrap an in-memory string as a translation
    /// unit instead of touching the filesystem.
    pub fn from_str(name: &str, text: &str) -> Self {
        Self::new(name.to_string(), text.as_bytes().to_vec())
    }

    fn new(name: String, mut buf: Vec<u8>) -> Self {
        if buf.last() != Some(&b'\n') {
            buf.push(b'\n');
        }
        buf.push(b'\0');
        Self { name, buf }
    }

    pub fn error_at(&self, loc: usize, message: impl Into<String>) -> anyhow::Error {
        error_at(&self.name, &self.buf, loc, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Punct,
    Keyword,
    Num,
    Str,
    Eof,
}

/// A lexeme plus everything downstream consumers need: its source span
/// (`loc`/`len`), its 1-based line, and, for the kinds that carry one, a
/// decoded value. Strings keep their cooked bytes; numbers keep the parsed
/// integer; everything else is re-read from the source buffer via `loc..loc+len`.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: usize,
    pub len: usize,
    pub line: usize,
    pub val: i64,
    pub str_val: Option<Vec<u8>>,
}

impl Token {
    pub fn text<'a>(&self, src: &'a SourceFile) -> &'a str {
        std::str::from_utf8(&src.buf[self.loc..self.loc + self.len]).unwrap_or("")
    }

    pub fn is(&self, src: &SourceFile, s: &str) -> bool {
        self.text(src) == s
    }
}

const KEYWORDS: &[&str] = &[
    "return", "if", "else", "while", "for", "int", "sizeof", "char", "struct", "union", "long",
    "short", "void", "typedef", "_Bool", "enum", "static", "switch", "case", "default", "break",
    "continue", "goto", "const", "volatile", "restrict", "signed", "unsigned", "register",
    "extern", "inline", "_Alignof",
];

/// Longest-match-first multi-character punctuators. Order matters: `<<=`
/// must be tried before `<<` before `<`.
const PUNCTUATORS: &[&str] = &[
    "<<=", ">>=", "...", "==", "!=", "<=", ">=", "->", "+=", "-=", "*=", "/=", "%=", "&=", "|=",
    "^=", "++", "--", "<<", ">>", "&&", "||",
];

pub fn tokenize(src: &SourceFile) -> Result<Vec<Token>> {
    let buf = &src.buf;
    let mut toks = Vec::new();
    let mut i = 0usize;
    let mut line = 1usize;

    while i < buf.len() {
        let c = buf[i];

        if c == b'\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if c == 0 {
            break;
        }

        // Line comment.
        if c == b'/' && buf.get(i + 1) == Some(&b'/') {
            while i < buf.len() && buf[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        // Block comment.
        if c == b'/' && buf.get(i + 1) == Some(&b'*') {
            let start = i;
            i += 2;
            let mut closed = false;
            while i + 1 < buf.len() {
                if buf[i] == b'\n' {
                    line += 1;
                }
                if buf[i] == b'*' && buf[i + 1] == b'/' {
                    i += 2;
                    closed = true;
                    break;
                }
                i += 1;
            }
            if !closed {
                return Err(src.error_at(start, "unterminated block comment"));
            }
            continue;
        }

        // String literal.
        if c == b'"' {
            let start = i;
            i += 1;
            let mut bytes = Vec::new();
            loop {
                match buf.get(i) {
                    None | Some(0) | Some(b'\n') => {
                        return Err(src.error_at(start, "unterminated string literal"));
                    }
                    Some(b'"') => {
                        i += 1;
                        break;
                    }
                    Some(b'\\') => {
                        i += 1;
                        let (byte, adv) = decode_escape(buf, i).map_err(|m| src.error_at(i, m))?;
                        bytes.push(byte);
                        i += adv;
                    }
                    Some(&b) => {
                        bytes.push(b);
                        i += 1;
                    }
                }
            }
            bytes.push(0);
            toks.push(Token {
                kind: TokenKind::Str,
                loc: start,
                len: i - start,
                line,
                val: 0,
                str_val: Some(bytes),
            });
            continue;
        }

        // Character literal.
        if c == b'\'' {
            let start = i;
            i += 1;
            let value: i64 = match buf.get(i) {
                None | Some(0) | Some(b'\n') => {
                    return Err(src.error_at(start, "unterminated character literal"));
                }
                Some(b'\\') => {
                    i += 1;
                    let (byte, adv) = decode_escape(buf, i).map_err(|m| src.error_at(i, m))?;
                    i += adv;
                    byte as i8 as i64
                }
                Some(&b) => {
                    i += 1;
                    b as i8 as i64
                }
            };
            if buf.get(i) != Some(&b'\'') {
                return Err(src.error_at(start, "unterminated character literal"));
            }
            i += 1;
            toks.push(Token {
                kind: TokenKind::Num,
                loc: start,
                len: i - start,
                line,
                val: value,
                str_val: None,
            });
            continue;
        }

        // Numeric literal.
        if c.is_ascii_digit() {
            let start = i;
            let (value, adv) = read_number(buf, i).map_err(|m| src.error_at(start, m))?;
            i += adv;
            toks.push(Token {
                kind: TokenKind::Num,
                loc: start,
                len: i - start,
                line,
                val: value,
                str_val: None,
            });
            continue;
        }

        // Identifier/keyword.
        if c.is_ascii_alphabetic() || c == b'_' {
            let start = i;
            while i < buf.len() && (buf[i].is_ascii_alphanumeric() || buf[i] == b'_') {
                i += 1;
            }
            toks.push(Token {
                kind: TokenKind::Ident,
                loc: start,
                len: i - start,
                line,
                val: 0,
                str_val: None,
            });
            continue;
        }

        // Multi-character punctuators, longest match first.
        if let Some(p) = PUNCTUATORS.iter().find(|p| buf[i..].starts_with(p.as_bytes())) {
            toks.push(Token {
                kind: TokenKind::Punct,
                loc: i,
                len: p.len(),
                line,
                val: 0,
                str_val: None,
            });
            i += p.len();
            continue;
        }

        // Single-character punctuator.
        if c.is_ascii_punctuation() {
            toks.push(Token {
                kind: TokenKind::Punct,
                loc: i,
                len: 1,
                line,
                val: 0,
                str_val: None,
            });
            i += 1;
            continue;
        }

        return Err(src.error_at(i, format!("stray character '{}' in program", c as char)));
    }

    toks.push(Token {
        kind: TokenKind::Eof,
        loc: buf.len().saturating_sub(1),
        len: 0,
        line,
        val: 0,
        str_val: None,
    });

    promote_keywords(&mut toks, src);
    Ok(toks)
}

fn promote_keywords(toks: &mut [Token], src: &SourceFile) {
    for t in toks.iter_mut() {
        if t.kind == TokenKind::Ident && KEYWORDS.contains(&t.text(src)) {
            t.kind = TokenKind::Keyword;
        }
    }
}

/// Decodes one escape sequence starting right after the backslash at `i`.
/// Returns the decoded byte and how many input bytes it consumed.
fn decode_escape(buf: &[u8], i: usize) -> Result<(u8, usize), String> {
    let Some(&c) = buf.get(i) else {
        return Err("unterminated escape sequence".to_string());
    };
    match c {
        b'a' => Ok((7, 1)),
        b'b' => Ok((8, 1)),
        b't' => Ok((9, 1)),
        b'n' => Ok((10, 1)),
        b'v' => Ok((11, 1)),
        b'f' => Ok((12, 1)),
        b'r' => Ok((13, 1)),
        b'e' => Ok((27, 1)),
        b'x' => {
            let mut j = i + 1;
            let mut val: u32 = 0;
            let mut digits = 0;
            while buf.get(j).is_some_and(|b| b.is_ascii_hexdigit()) {
                val = val * 16 + (buf[j] as char).to_digit(16).unwrap();
                j += 1;
                digits += 1;
            }
            if digits == 0 {
                return Err("invalid hex escape sequence".to_string());
            }
            Ok(((val & 0xFF) as u8, j - i))
        }
        b'0'..=b'7' => {
            let mut j = i;
            let mut val: u32 = 0;
            let mut digits = 0;
            while digits < 3 && buf.get(j).is_some_and(|&b| (b'0'..=b'7').contains(&b)) {
                val = val * 8 + (buf[j] - b'0') as u32;
                j += 1;
                digits += 1;
            }
            Ok(((val & 0xFF) as u8, j - i))
        }
        other => Ok((other, 1)),
    }
}

/// Parses the numeric literal starting at `i`: base-prefix detection
/// (`0x`/`0X` hex, `0b`/`0B` binary, leading `0` octal, else decimal), with a
/// trailing alphanumeric character after the digits treated as fatal.
fn read_number(buf: &[u8], i: usize) -> Result<(i64, usize), String> {
    let (radix, digits_start): (u32, usize) = if buf[i] == b'0' && matches!(buf.get(i + 1), Some(b'x' | b'X')) {
        (16, i + 2)
    } else if buf[i] == b'0' && matches!(buf.get(i + 1), Some(b'b' | b'B')) {
        (2, i + 2)
    } else if buf[i] == b'0' && buf.get(i + 1).is_some_and(|b| (b'0'..=b'7').contains(b)) {
        (8, i + 1)
    } else {
        (10, i)
    };

    let mut j = digits_start;
    while buf.get(j).is_some_and(|b| (*b as char).is_digit(radix)) {
        j += 1;
    }
    if j == digits_start {
        return Err("expected a digit after numeric base prefix".to_string());
    }
    let text = std::str::from_utf8(&buf[digits_start..j]).unwrap();
    let value = i64::from_str_radix(text, radix)
        .map_err(|_| "numeric literal out of range".to_string())?;

    if buf.get(j).is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_') {
        return Err("invalid digit in numeric literal".to_string());
    }

    Ok((value, j - i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(src: &str) -> Vec<i64> {
        let src = SourceFile::from_str("t.c", src);
        tokenize(&src).unwrap().into_iter().filter(|t| t.kind == TokenKind::Num).map(|t| t.val).collect()
    }

    #[test]
    fn integer_literal_bases() {
        assert_eq!(nums("0x2a 0b101 017 42"), vec![0x2a, 0b101, 0o17, 42]);
    }

    #[test]
    fn trailing_letter_after_digits_is_fatal() {
        let src = SourceFile::from_str("t.c", "123abc;");
        assert!(tokenize(&src).is_err());
    }

    #[test]
    fn decode_named_escapes() {
        assert_eq!(decode_escape(b"n", 0).unwrap(), (b'\n', 1));
        assert_eq!(decode_escape(b"t", 0).unwrap(), (b'\t', 1));
        assert_eq!(decode_escape(b"e", 0).unwrap(), (27, 1));
    }

    #[test]
    fn decode_octal_and_hex_escapes() {
        assert_eq!(decode_escape(b"101", 0).unwrap(), (0o101, 3));
        assert_eq!(decode_escape(b"x41", 0).unwrap(), (0x41, 3));
    }

    #[test]
    fn string_literal_is_cooked_and_nul_terminated() {
        let src = SourceFile::from_str("t.c", r#""ab\ncd""#);
        let toks = tokenize(&src).unwrap();
        let str_tok = toks.iter().find(|t| t.kind == TokenKind::Str).unwrap();
        assert_eq!(str_tok.str_val.as_deref(), Some(&b"ab\ncd\0"[..]));
    }

    #[test]
    fn keywords_are_promoted_and_idents_are_not() {
        let src = SourceFile::from_str("t.c", "int foo return bar");
        let toks = tokenize(&src).unwrap();
        assert_eq!(toks[0].kind, TokenKind::Keyword);
        assert_eq!(toks[1].kind, TokenKind::Ident);
        assert_eq!(toks[2].kind, TokenKind::Keyword);
        assert_eq!(toks[3].kind, TokenKind::Ident);
    }

    #[test]
    fn tokenizer_is_deterministic_modulo_whitespace_and_comments() {
        let src = SourceFile::from_str("t.c", "int  x = 1; // trailing\nint y = /*mid*/2;");
        let lexemes: Vec<String> = tokenize(&src)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| t.text(&src).to_string())
            .collect();
        assert_eq!(lexemes, vec!["int", "x", "=", "1", ";", "int", "y", "=", "2", ";"]);
    }

    #[test]
    fn unterminated_block_comment_is_fatal() {
        let src = SourceFile::from_str("t.c", "int x; /* never closed");
        assert!(tokenize(&src).is_err());
    }
}
