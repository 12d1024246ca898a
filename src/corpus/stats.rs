//! Running statistics for a corpus walk.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

/// Counters exposed by the walker. Nothing acts on them automatically.
#[derive(Debug, Default, Clone, Serialize)]
pub struct WalkStats {
    /// Non-hidden files discovered in the directories listed so far.
    pub files_found: u64,
    /// Files that normalized into a message.
    pub files_processed: u64,
    /// Files skipped because normalization failed.
    pub files_errored: u64,
    /// Messages added to the corpus.
    pub total_messages: u64,
    pub messages_with_attachments: u64,
    pub total_attachments: u64,
    pub attachment_bytes: u64,
    /// Failure cause → number of files that failed that way.
    pub parse_errors: BTreeMap<String, u64>,
    /// Wall time spent inside `process` calls.
    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
}

impl WalkStats {
    /// Share of attempted files that parsed, in percent.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.files_processed + self.files_errored;
        if attempted == 0 {
            0.0
        } else {
            self.files_processed as f64 / attempted as f64 * 100.0
        }
    }

    pub(crate) fn record_error(&mut self, cause: String) {
        self.files_errored += 1;
        *self.parse_errors.entry(cause).or_default() += 1;
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
