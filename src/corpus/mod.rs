//! Corpus assembly: participant registry, directory walker, and statistics.

pub mod registry;
pub mod stats;
pub mod walker;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::model::message::Message;
use crate::model::person::Person;

pub use registry::PersonRegistry;
pub use stats::WalkStats;
pub use walker::CorpusWalker;

/// Everything a walk produced: people in first-sighting order and messages
/// in traversal order (`messages[i].id == i`).
#[derive(Debug, Default, Clone)]
pub struct Corpus {
    pub people: Vec<Person>,
    pub messages: Vec<Message>,
}

impl Corpus {
    /// Number of messages per source folder.
    pub fn folder_counts(&self) -> BTreeMap<PathBuf, usize> {
        let mut counts = BTreeMap::new();
        for msg in &self.messages {
            *counts.entry(msg.folder_path.clone()).or_default() += 1;
        }
        counts
    }

    /// Oldest and newest send time among messages that have one.
    pub fn date_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let mut times = self.messages.iter().filter_map(|m| m.time);
        let first = times.next()?;
        Some(times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    /// The `n` most frequent senders as `(label, count)`, most active first.
    pub fn top_senders(&self, n: usize) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for msg in &self.messages {
            *counts.entry(msg.sender.email.as_str()).or_default() += 1;
        }
        let names: HashMap<&str, &str> = self
            .people
            .iter()
            .filter_map(|p| p.name.as_deref().map(|name| (p.email.as_str(), name)))
            .collect();

        let mut sorted: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(email, count)| match names.get(email) {
                Some(name) => (format!("{name} <{email}>"), count),
                None => (email.to_string(), count),
            })
            .collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted.truncate(n);
        sorted
    }

    /// Attachment count per content type, most common first.
    pub fn attachment_types(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for att in self.messages.iter().flat_map(|m| m.attachments.iter()) {
            *counts.entry(att.content_type.as_str()).or_default() += 1;
        }
        let mut sorted: Vec<(String, usize)> =
            counts.into_iter().map(|(t, c)| (t.to_string(), c)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted
    }
}
