//! Normalized message records.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::attachment::Attachment;
use super::person::Person;

/// One parsed mail file.
///
/// Participants are carried as candidate [`Person`] values; the corpus walker
/// resolves them through the registry, and everything downstream refers to
/// people by their normalized address.
#[derive(Debug, Clone)]
pub struct Message {
    /// Zero-based position in the corpus-wide message list.
    /// Assigned by the walker; `0` until then.
    pub id: u64,

    /// Content-derived key (hex SHA-256 of sender, send time and body).
    pub key: String,

    /// The `Message-ID` header with angle brackets stripped. May be empty.
    pub message_id: String,

    /// Decoded subject line.
    pub subject: String,

    /// Concatenated `text/plain` parts.
    pub body: String,

    /// Parsed `Date:` header, `None` when unparseable.
    pub time: Option<DateTime<Utc>>,

    /// Conversation identifier from `References`/`In-Reply-To`, usually absent.
    pub thread: Option<String>,

    /// The `In-Reply-To` id, if present.
    pub in_reply_to: Option<String>,

    /// Ids from the `References` header, oldest first.
    pub references: Vec<String>,

    pub sender: Person,
    pub to: Vec<Person>,
    pub cc: Vec<Person>,
    pub bcc: Vec<Person>,

    pub attachments: Vec<Attachment>,

    /// Directory the file was found in.
    pub folder_path: PathBuf,

    /// Full path of the source file.
    pub file_path: PathBuf,
}

impl Message {
    /// Send time as RFC 3339, the form used in the interchange files.
    pub fn time_rfc3339(&self) -> Option<String> {
        self.time.map(|t| t.to_rfc3339())
    }
}

/// Compute the content key for a message.
///
/// Fields are separated by NUL so that `("ab", "c")` and `("a", "bc")` differ.
pub fn content_key(sender: &str, time: Option<&DateTime<Utc>>, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sender.as_bytes());
    hasher.update([0u8]);
    if let Some(t) = time {
        hasher.update(t.to_rfc3339().as_bytes());
    }
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_content_key_depends_on_every_field() {
        let t = Utc.with_ymd_and_hms(2001, 5, 14, 23, 39, 0).unwrap();
        let base = content_key("a@x.com", Some(&t), "hello");
        assert_eq!(base, content_key("a@x.com", Some(&t), "hello"));
        assert_ne!(base, content_key("b@x.com", Some(&t), "hello"));
        assert_ne!(base, content_key("a@x.com", None, "hello"));
        assert_ne!(base, content_key("a@x.com", Some(&t), "hello!"));
        assert_eq!(base.len(), 64);
    }

    #[test]
    fn test_content_key_field_boundaries() {
        assert_ne!(content_key("ab", None, "c"), content_key("a", None, "bc"));
    }
}
