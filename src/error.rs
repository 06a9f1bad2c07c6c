//! Error types and result aliases for stream scanning.

use std::io;

/// Result type alias for scanning operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur while scanning a serial stream.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// I/O error from the underlying byte source, including truncation
    /// in the middle of a value.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream does not start with the expected magic and version.
    #[error("bad stream header: magic {magic:#06x}, version {version}")]
    BadHeader {
        /// The two bytes found where the magic was expected.
        magic: u16,
        /// The two bytes found where the version was expected.
        version: u16,
    },

    /// A record began with a byte that is not a known tag.
    #[error("bad record tag: {0:#04x}")]
    BadTag(u8),

    /// A back-reference named a handle outside the registered range.
    #[error("bad back-reference handle: {0:#010x}")]
    BadHandle(i32),

    /// The stream violated the protocol grammar in some other way.
    #[error("corrupted stream: {0}")]
    Corrupted(String),

    /// The stream itself records that writing was aborted partway through.
    /// Carries the rendered description entity embedded in the stream.
    /// The remainder of the stream is not trustworthy.
    #[error("write aborted by serializing side: {description}")]
    Aborted {
        /// Rendered form of the description entity found in the stream.
        description: String,
    },
}

impl ScanError {
    /// Shorthand for a [`ScanError::Corrupted`] with a formatted message.
    pub(crate) fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Returns true if this error indicates the stream bytes themselves are
    /// malformed, as opposed to an I/O failure or an in-stream abort marker.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::BadHeader { .. } | Self::BadTag(_) | Self::BadHandle(_) | Self::Corrupted(_)
        )
    }
}
