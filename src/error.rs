//! Error types for `ps2stage`

use thiserror::Error;

/// The error type for `ps2stage` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Archive Layout Errors ====================
    /// A read ran past the end of the archive buffer.
    #[error("read out of range at offset {offset:#x}: wanted {wanted} bytes, {available} available")]
    OutOfRange {
        /// Offset of the attempted read, relative to the buffer it targeted.
        offset: usize,
        /// Number of bytes the read required.
        wanted: usize,
        /// Number of bytes remaining at that offset.
        available: usize,
    },

    /// A declared sub-region does not fit inside the archive buffer.
    #[error("invalid {region} region: {start:#x}..{end:#x} outside buffer of {len} bytes")]
    InvalidRegion {
        /// Name of the region being located.
        region: &'static str,
        /// Declared start offset.
        start: usize,
        /// Declared end offset.
        end: usize,
        /// Length of the containing buffer.
        len: usize,
    },

    /// An offset-linked record chain revisited an offset.
    #[error("cyclic {record} chain at offset {offset:#x}")]
    CyclicOffsetChain {
        /// The record type whose sibling chain looped.
        record: &'static str,
        /// The first revisited offset.
        offset: usize,
    },

    // ==================== GS Memory Errors ====================
    /// An image upload was given fewer source bytes than its rectangle needs.
    #[error("image upload truncated: needed {needed} bytes, got {got}")]
    TruncatedImageUpload {
        /// Bytes required by the upload rectangle and format.
        needed: usize,
        /// Bytes actually supplied.
        got: usize,
    },
}

/// A specialized Result type for `ps2stage` operations.
pub type Result<T> = std::result::Result<T, Error>;
