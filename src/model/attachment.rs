//! Attachments captured during normalization.
//!
//! Attachments live only as long as their message: they feed the corpus
//! statistics and are never written to the graph store.

/// A decoded attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename from the part headers, `"unknown"` when only the disposition said so.
    pub filename: String,

    /// MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,

    /// Decoded size in bytes.
    pub size: u64,

    /// Decoded payload.
    pub content: Vec<u8>,
}
