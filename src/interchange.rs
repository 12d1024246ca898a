//! JSON interchange artifacts between the corpus walk and the graph load.
//!
//! ```text
//! <dir>/users.json     { "<address>": "<person id>", ... }   (order matters)
//! <dir>/messages.json  [ { "time", "thread", "message", "sender",
//!                          "recipients", "cc", "bcc", "filepath", "key" }, ... ]
//! ```
//!
//! The position of a record in `messages.json` is its positional id. Other
//! tools may write these files; the older field names `body`, `from`, `to`,
//! and `recipient` are accepted on read.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

use crate::corpus::Corpus;
use crate::error::{IngestError, Result};
use crate::model::person::Person;

/// File name of the people mapping inside an interchange directory.
pub const PEOPLE_FILE: &str = "users.json";

/// File name of the message list inside an interchange directory.
pub const MESSAGES_FILE: &str = "messages.json";

/// Ordered `address → person id` mapping.
///
/// Serialized as a JSON object; key order is kept on both write and read
/// because Person batches are cut in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeopleMap {
    entries: Vec<(String, String)>,
}

impl PeopleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every person to its graph id, preserving order.
    pub fn from_people<'a>(people: impl IntoIterator<Item = &'a Person>) -> Self {
        Self {
            entries: people
                .into_iter()
                .map(|p| (p.email.clone(), p.graph_id()))
                .collect(),
        }
    }

    pub fn push(&mut self, address: impl Into<String>, id: impl Into<String>) {
        self.entries.push((address.into(), id.into()));
    }

    /// `(address, id)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, i)| (a.as_str(), i.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set of all person ids, for reference filtering.
    pub fn ids(&self) -> HashSet<&str> {
        self.entries.iter().map(|(_, id)| id.as_str()).collect()
    }

    /// Keep only the first `n` people.
    pub fn truncate(&mut self, n: usize) {
        self.entries.truncate(n);
    }
}

impl Serialize for PeopleMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (address, id) in &self.entries {
            map.serialize_entry(address, id)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PeopleMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = PeopleMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping addresses to person ids")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<PeopleMap, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((address, id)) = access.next_entry::<String, String>()? {
                    entries.push((address, id));
                }
                Ok(PeopleMap { entries })
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// One message as exchanged on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Send time, RFC 3339.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub thread: Option<String>,
    /// Body text.
    #[serde(default, alias = "body")]
    pub message: String,
    /// Person id of the sender.
    #[serde(default, alias = "from")]
    pub sender: Option<String>,
    /// Person ids of `To` recipients.
    #[serde(default, alias = "to", alias = "recipient")]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    #[serde(default)]
    pub filepath: String,
    /// Content-derived key; absent in files written by older tooling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl MessageRecord {
    /// Graph id of the Email node for the record at `position`: the content
    /// key when present, the position otherwise.
    pub fn email_id(&self, position: usize) -> String {
        match &self.key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => position.to_string(),
        }
    }
}

/// Email node ids for `messages`, in order.
///
/// The same message often sits in several folders and so shares one content
/// key. The nth repeat of an id gets a `#<n>` suffix, which keeps one node per
/// position and keeps batch `N` probing its own last node.
pub fn email_ids(messages: &[MessageRecord]) -> Vec<String> {
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    messages
        .iter()
        .enumerate()
        .map(|(pos, m)| {
            let base = m.email_id(pos);
            let n = repeats.entry(base.clone()).or_insert(0);
            let mut id = base.clone();
            while taken.contains(&id) {
                *n += 1;
                id = format!("{base}#{n}");
            }
            taken.insert(id.clone());
            id
        })
        .collect()
}

/// Both interchange artifacts, in memory.
#[derive(Debug, Clone, Default)]
pub struct Interchange {
    pub people: PeopleMap,
    pub messages: Vec<MessageRecord>,
}

impl Interchange {
    /// Project a walked corpus into interchange records.
    pub fn from_corpus(corpus: &Corpus) -> Self {
        let people = PeopleMap::from_people(&corpus.people);
        let mut messages: Vec<MessageRecord> = corpus
            .messages
            .iter()
            .map(|m| {
                let ids = |list: &[Person]| list.iter().map(Person::graph_id).collect::<Vec<_>>();
                MessageRecord {
                    time: m.time_rfc3339(),
                    thread: m.thread.clone(),
                    message: m.body.clone(),
                    sender: Some(m.sender.graph_id()),
                    recipients: ids(&m.to),
                    cc: ids(&m.cc),
                    bcc: ids(&m.bcc),
                    filepath: m.file_path.to_string_lossy().into_owned(),
                    key: Some(m.key.clone()),
                    subject: (!m.subject.is_empty()).then(|| m.subject.clone()),
                }
            })
            .collect();
        let ids = email_ids(&messages);
        for (record, id) in messages.iter_mut().zip(ids) {
            record.key = Some(id);
        }
        Self { people, messages }
    }

    /// Apply the optional load limits: first `max_people` people and first
    /// `max_messages` messages.
    pub fn truncate(&mut self, max_people: Option<usize>, max_messages: Option<usize>) {
        if let Some(n) = max_people {
            self.people.truncate(n);
        }
        if let Some(n) = max_messages {
            self.messages.truncate(n);
        }
    }

    /// Write `users.json` and `messages.json` into `dir`, creating it.
    pub fn write(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| IngestError::io(dir, e))?;
        write_json(&dir.join(PEOPLE_FILE), &self.people)?;
        write_json(&dir.join(MESSAGES_FILE), &self.messages)?;
        info!(
            dir = %dir.display(),
            people = self.people.len(),
            messages = self.messages.len(),
            "Interchange files written"
        );
        Ok(())
    }

    /// Read and validate both files from `dir`.
    ///
    /// Any missing file, malformed JSON, empty/duplicate person id, or repeated
    /// message key is a [`IngestError::DataIntegrity`] naming the offending
    /// file.
    pub fn read(dir: &Path) -> Result<Self> {
        let people_path = dir.join(PEOPLE_FILE);
        let people: PeopleMap = read_json(&people_path)?;

        let mut seen = HashSet::new();
        for (address, id) in people.iter() {
            if id.is_empty() {
                return Err(IngestError::integrity(
                    &people_path,
                    format!("empty person id for '{address}'"),
                ));
            }
            if !seen.insert(id) {
                return Err(IngestError::integrity(
                    &people_path,
                    format!("person id '{id}' is used more than once"),
                ));
            }
        }

        let messages_path = dir.join(MESSAGES_FILE);
        let messages: Vec<MessageRecord> = read_json(&messages_path)?;

        let mut keys = HashSet::new();
        for (pos, key) in messages
            .iter()
            .enumerate()
            .filter_map(|(pos, m)| m.key.as_deref().map(|k| (pos, k)))
        {
            if !key.is_empty() && !keys.insert(key) {
                return Err(IngestError::integrity(
                    &messages_path,
                    format!("message key '{key}' at position {pos} is used more than once"),
                ));
            }
        }

        let keyed = messages.iter().filter(|m| m.key.is_some()).count();
        if keyed != 0 && keyed != messages.len() {
            warn!(
                path = %messages_path.display(),
                keyed,
                total = messages.len(),
                "Some messages have no key; those fall back to positional ids"
            );
        }

        Ok(Self { people, messages })
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| IngestError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| IngestError::integrity(path, e.to_string()))?;
    writer.flush().map_err(|e| IngestError::io(path, e))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IngestError::integrity(path, "file not found")
        } else {
            IngestError::io(path, e)
        }
    })?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| IngestError::integrity(path, e.to_string()))
}
