//! Preprocessing-token lexer for macro definitions and constant expressions.

/// Token classes the rest of the front end cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword
    Identifier,
    /// Numeric literal
    Number,
    /// String literal
    String,
    /// Character literal
    Char,
    /// Operator or other punctuation
    Punct,
}

/// One token with its byte range in the lexed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token class
    pub kind: TokenKind,
    /// Token text
    pub spelling: String,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset just past the last character
    pub end: usize,
}

const PUNCTUATORS: &[&str] = &[
    "<<=", ">>=", "...", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "*=",
    "/=", "%=", "+=", "-=", "&=", "^=", "|=", "##",
];

/// Split text into preprocessing tokens. Comments and line continuations are
/// skipped; unknown bytes become single-character punctuation.
#[must_use]
pub fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];

        if c == b'\\' && bytes.get(i + 1).is_some_and(|n| *n == b'\n' || *n == b'\r') {
            i += 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                i += 1;
            }
            continue;
        }
        if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
            continue;
        }

        let start = i;
        let kind = if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            TokenKind::Identifier
        } else if c.is_ascii_digit()
            || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'_') {
                i += 1;
            }
            TokenKind::Number
        } else if c == b'"' || c == b'\'' {
            i += 1;
            while i < bytes.len() && bytes[i] != c {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(bytes.len());
            if c == b'"' {
                TokenKind::String
            } else {
                TokenKind::Char
            }
        } else {
            let rest = &text[i..];
            let len = PUNCTUATORS
                .iter()
                .find(|p| rest.starts_with(**p))
                .map_or_else(|| rest.chars().next().map_or(1, char::len_utf8), |p| p.len());
            i += len;
            TokenKind::Punct
        };

        tokens.push(Token {
            kind,
            spelling: text[start..i].to_string(),
            start,
            end: i,
        });
    }

    tokens
}

/// Parse a C integer literal, ignoring `u`/`l` suffixes.
#[must_use]
pub fn parse_integer(literal: &str) -> Option<i64> {
    let trimmed = literal.trim_end_matches(['u', 'U', 'l', 'L']);
    let (digits, radix) = if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        (hex, 16)
    } else if let Some(bin) = trimmed
        .strip_prefix("0b")
        .or_else(|| trimmed.strip_prefix("0B"))
    {
        (bin, 2)
    } else if trimmed.len() > 1 && trimmed.starts_with('0') {
        (&trimmed[1..], 8)
    } else {
        (trimmed, 10)
    };
    let digits: String = digits.chars().filter(|c| *c != '\'').collect();
    u64::from_str_radix(&digits, radix)
        .ok()
        .map(|v| v.cast_signed())
}

/// Value of a character literal such as `'a'` or `'\n'`.
#[must_use]
pub fn parse_char(literal: &str) -> Option<i64> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars();
    let first = chars.next()?;
    if first != '\\' {
        return Some(i64::from(u32::from(first)));
    }
    let escaped = chars.next()?;
    let value = match escaped {
        'n' => 10,
        't' => 9,
        'r' => 13,
        '0' => 0,
        'a' => 7,
        'b' => 8,
        'f' => 12,
        'v' => 11,
        'x' => {
            let hex: String = chars.collect();
            return i64::from_str_radix(&hex, 16).ok();
        }
        other => i64::from(u32::from(other)),
    };
    Some(value)
}
