//! Error types for cqlproxy-rewrite.

use thiserror::Error;

/// Main error type for all rewrite operations.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// Buffer is shorter than the fixed header, or its length field
    /// disagrees with the bytes actually present.
    #[error("Malformed frame: {reason} ({len} bytes)")]
    MalformedFrame { len: usize, reason: &'static str },

    /// Opcode outside the families a transformation understands.
    #[error("Unsupported opcode: 0x{0:02x}")]
    UnsupportedOpcode(u8),

    /// Header flags make the body unaddressable (compressed, custom payload).
    #[error("Unsupported header flags: 0x{0:02x}")]
    UnsupportedFlags(u8),

    /// A computed offset or search target lies outside the frame.
    #[error("Offset out of range: {what} (frame is {len} bytes)")]
    OffsetOutOfRange { what: String, len: usize },

    /// Declared body length exceeds the configured maximum.
    #[error("Frame body of {len} bytes exceeds maximum {max}")]
    FrameTooLarge { len: u32, max: u32 },

    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl RewriteError {
    pub(crate) fn out_of_range(what: impl Into<String>, len: usize) -> Self {
        RewriteError::OffsetOutOfRange {
            what: what.into(),
            len,
        }
    }

    /// Whether the frame must be rejected rather than forwarded unmodified.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RewriteError::MalformedFrame { .. } | RewriteError::FrameTooLarge { .. }
        )
    }
}

/// Result type alias using RewriteError.
pub type Result<T> = std::result::Result<T, RewriteError>;
