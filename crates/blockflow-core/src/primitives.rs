//! # Engine Constants
//!
//! Hardcoded runtime constants for the Blockflow CORE.
//!
//! These are compiled into the binary and immutable at runtime. The app
//! layer may override the debounce window through configuration, but the
//! lexical rules and format constants below are fixed.

/// Marker character introducing a bare reference token (`#name`).
pub const REFERENCE_MARKER: char = '#';

/// Opening delimiter of a bracketed reference token (`[name with spaces]`).
pub const BRACKET_OPEN: char = '[';

/// Closing delimiter of a bracketed reference token.
pub const BRACKET_CLOSE: char = ']';

/// Minimum interval between two dispatched transform requests for the
/// same block, in milliseconds.
///
/// A recompute that arrives inside this window (and is not flagged
/// immediate) is deferred by the remaining time instead of dispatched.
pub const DEBOUNCE_WINDOW_MS: u64 = 5000;

/// Magic bytes for the Blockflow binary document format header.
///
/// - File Header = Magic Bytes ("BLKF") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"BLKF";

/// Current document format version.
///
/// Increment this when making breaking changes to the document format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for block names.
///
/// Names longer than this are rejected at the API boundary.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum length for block data and instructions (64KB each).
///
/// This prevents memory exhaustion from malicious or malformed input.
pub const MAX_TEXT_LENGTH: usize = 65536;

/// Maximum number of blocks in a single document load.
pub const MAX_DOCUMENT_BLOCKS: usize = 4096;

/// Maximum allowed payload size for the document format (50 MB).
///
/// Validated BEFORE deserialization to prevent allocation-based DoS.
pub const MAX_DOCUMENT_PAYLOAD_SIZE: usize = 50 * 1024 * 1024;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"BLKF");
    }

    #[test]
    fn debounce_window_is_five_seconds() {
        assert_eq!(DEBOUNCE_WINDOW_MS, 5000);
    }
}
