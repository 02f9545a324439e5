//! Opcode-specific body layout.
//!
//! The field in front of `<query_parameters>` differs per opcode:
//! ```text
//! QUERY    <query: [long string]><query_parameters>
//! PREPARE  <query: [long string]>
//! EXECUTE  <id: [short bytes]><query_parameters>
//! ```
//! `<query_parameters>` opens with `<consistency: [short]><flags: [byte]>`.

use std::ops::Range;

use crate::error::{Result, RewriteError};
use crate::protocol::{flags, read_i32_at, read_u16_at, Header, Opcode, HEADER_SIZE};

/// Width of a `[long string]` length prefix.
const LONG_STRING_PREFIX: usize = 4;

/// Width of a `[short bytes]` length prefix.
const SHORT_BYTES_PREFIX: usize = 2;

/// Offset of the flags byte within `<query_parameters>`.
pub const PARAMETERS_FLAGS_OFFSET: usize = 2;

/// Position of the length-prefixed field that opens the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementLayout {
    Query { text_len: usize },
    Prepare { text_len: usize },
    Execute { id_len: usize },
}

impl StatementLayout {
    /// Locate the leading field of a raw frame.
    ///
    /// Fails with `UnsupportedOpcode` for BATCH and every non-statement
    /// opcode, and with `UnsupportedFlags` when the body is compressed or
    /// shifted by a custom payload.
    pub fn of(bytes: &[u8]) -> Result<Self> {
        let header = Header::decode(bytes).ok_or(RewriteError::MalformedFrame {
            len: bytes.len(),
            reason: "shorter than header",
        })?;

        if flags::has_flag(header.flags, flags::OPAQUE_BODY) {
            return Err(RewriteError::UnsupportedFlags(header.flags));
        }

        let layout = match header.opcode() {
            Some(Opcode::Query) => StatementLayout::Query {
                text_len: long_string_len(bytes)?,
            },
            Some(Opcode::Prepare) => StatementLayout::Prepare {
                text_len: long_string_len(bytes)?,
            },
            Some(Opcode::Execute) => StatementLayout::Execute {
                id_len: read_u16_at(bytes, HEADER_SIZE)? as usize,
            },
            _ => return Err(RewriteError::UnsupportedOpcode(header.opcode)),
        };

        let end = layout.leading_field_end();
        if end > bytes.len() {
            return Err(RewriteError::out_of_range(
                format!("leading field ending at offset {}", end),
                bytes.len(),
            ));
        }
        Ok(layout)
    }

    /// Opcode this layout belongs to.
    pub fn opcode(&self) -> Opcode {
        match self {
            StatementLayout::Query { .. } => Opcode::Query,
            StatementLayout::Prepare { .. } => Opcode::Prepare,
            StatementLayout::Execute { .. } => Opcode::Execute,
        }
    }

    /// Offset where `<query_parameters>` begins.
    pub fn parameters_offset(&self) -> Result<usize> {
        match self {
            StatementLayout::Query { .. } | StatementLayout::Execute { .. } => {
                Ok(self.leading_field_end())
            }
            StatementLayout::Prepare { .. } => {
                Err(RewriteError::UnsupportedOpcode(Opcode::Prepare.as_u8()))
            }
        }
    }

    /// Byte range of the query text, for opcodes that carry one.
    pub fn text_range(&self) -> Option<Range<usize>> {
        match *self {
            StatementLayout::Query { text_len } | StatementLayout::Prepare { text_len } => {
                let start = HEADER_SIZE + LONG_STRING_PREFIX;
                Some(start..start + text_len)
            }
            StatementLayout::Execute { .. } => None,
        }
    }

    /// Offset of the text's `[long string]` length prefix.
    pub fn text_length_offset(&self) -> Option<usize> {
        self.text_range().map(|_| HEADER_SIZE)
    }

    fn leading_field_end(&self) -> usize {
        match *self {
            StatementLayout::Query { text_len } | StatementLayout::Prepare { text_len } => {
                HEADER_SIZE + LONG_STRING_PREFIX + text_len
            }
            StatementLayout::Execute { id_len } => HEADER_SIZE + SHORT_BYTES_PREFIX + id_len,
        }
    }
}

fn long_string_len(bytes: &[u8]) -> Result<usize> {
    let len = read_i32_at(bytes, HEADER_SIZE)?;
    usize::try_from(len).map_err(|_| {
        RewriteError::out_of_range(format!("negative text length {}", len), bytes.len())
    })
}
