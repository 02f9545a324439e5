//! Statement classification.
//!
//! A best-effort structural tag taken from the opcode and the first
//! significant keyword of the query text. Leading whitespace and comments
//! (`--`, `//`, `/* */`) are skipped and keywords match case-insensitively.
//! Nothing beyond the leading keyword is parsed.

use serde::Serialize;

use crate::protocol::{read_i32_at, Opcode, HEADER_SIZE, OPCODE_OFFSET};

/// Statement family of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Select,
    Use,
    Insert,
    Update,
    Delete,
    Truncate,
    Prepare,
    Misc,
}

impl QueryKind {
    /// Lowercase name, as used in logs and policy tables.
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Select => "select",
            QueryKind::Use => "use",
            QueryKind::Insert => "insert",
            QueryKind::Update => "update",
            QueryKind::Delete => "delete",
            QueryKind::Truncate => "truncate",
            QueryKind::Prepare => "prepare",
            QueryKind::Misc => "misc",
        }
    }

    /// Whether the statement writes rows and needs a client timestamp.
    #[inline]
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            QueryKind::Insert | QueryKind::Update | QueryKind::Delete
        )
    }

    /// Map a leading statement keyword.
    pub fn from_keyword(keyword: &[u8]) -> Self {
        const KEYWORDS: [(&[u8], QueryKind); 6] = [
            (b"select", QueryKind::Select),
            (b"use", QueryKind::Use),
            (b"insert", QueryKind::Insert),
            (b"update", QueryKind::Update),
            (b"delete", QueryKind::Delete),
            (b"truncate", QueryKind::Truncate),
        ];
        KEYWORDS
            .iter()
            .find(|(kw, _)| kw.eq_ignore_ascii_case(keyword))
            .map(|(_, kind)| *kind)
            .unwrap_or(QueryKind::Misc)
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a raw frame (header included).
///
/// Never fails: a frame whose text cannot be located is `Misc`.
pub fn classify(bytes: &[u8]) -> QueryKind {
    let Some(opcode) = bytes.get(OPCODE_OFFSET).copied().and_then(Opcode::from_u8) else {
        return QueryKind::Misc;
    };

    match opcode {
        Opcode::Query => classify_text(query_text(bytes)),
        Opcode::Prepare => QueryKind::Prepare,
        _ => QueryKind::Misc,
    }
}

/// Classify query text by its leading keyword.
pub fn classify_text(text: &[u8]) -> QueryKind {
    QueryKind::from_keyword(leading_keyword(text))
}

/// Query text of a QUERY frame, clamped to the bytes present.
fn query_text(bytes: &[u8]) -> &[u8] {
    let start = HEADER_SIZE + 4;
    let len = match read_i32_at(bytes, HEADER_SIZE) {
        Ok(len) if len > 0 => len as usize,
        _ => return &[],
    };
    let end = start.saturating_add(len).min(bytes.len());
    &bytes[start.min(end)..end]
}

/// First identifier-like token after whitespace and comments.
fn leading_keyword(text: &[u8]) -> &[u8] {
    let start = skip_insignificant(text);
    let rest = &text[start..];
    let end = rest
        .iter()
        .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))
        .unwrap_or(rest.len());
    &rest[..end]
}

fn skip_insignificant(text: &[u8]) -> usize {
    let mut i = 0;
    loop {
        while i < text.len() && text[i].is_ascii_whitespace() {
            i += 1;
        }
        let rest = &text[i..];
        if rest.starts_with(b"--") || rest.starts_with(b"//") {
            i += rest
                .iter()
                .position(|&b| b == b'\n')
                .map_or(rest.len(), |p| p + 1);
        } else if rest.starts_with(b"/*") {
            i += rest[2..]
                .windows(2)
                .position(|w| w == b"*/")
                .map_or(rest.len(), |p| p + 4);
        } else {
            return i;
        }
    }
}
