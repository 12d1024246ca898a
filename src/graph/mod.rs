//! Property-graph storage: node and edge rows, the store abstraction, and the
//! batch loader that drives it.
//!
//! ```text
//! (:Person {id, email})
//! (:Email  {id, time, thread, body, filepath})
//! (:Person)-[:SENT]->(:Email)
//! (:Email)-[:RECEIVED | :RECEIVED_CC | :RECEIVED_BCC]->(:Person)
//! ```

pub mod loader;
pub mod memory;
pub mod neo4j;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub use loader::{BatchLoader, LoadReport};
pub use memory::MemoryStore;
pub use neo4j::Neo4jHttpStore;

/// Errors reported by a [`GraphStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("graph API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The statement reached the database and was rejected.
    #[error("{code}: {message}")]
    Cypher { code: String, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    /// The store refused the operation (used by the in-memory store).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Node labels the loader writes and probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    Person,
    Email,
}

impl NodeLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "Person",
            Self::Email => "Email",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types between people and emails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Person → Email.
    Sent,
    /// Email → Person, `To` recipient.
    Received,
    /// Email → Person, `Cc` recipient.
    ReceivedCc,
    /// Email → Person, `Bcc` recipient.
    ReceivedBcc,
}

impl EdgeKind {
    /// All kinds in write order.
    pub const ALL: [EdgeKind; 4] = [
        EdgeKind::Sent,
        EdgeKind::Received,
        EdgeKind::ReceivedCc,
        EdgeKind::ReceivedBcc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "SENT",
            Self::Received => "RECEIVED",
            Self::ReceivedCc => "RECEIVED_CC",
            Self::ReceivedBcc => "RECEIVED_BCC",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Person node to upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonNode {
    pub id: String,
    pub email: String,
}

/// One Email node to upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailNode {
    pub id: String,
    pub time: Option<String>,
    pub thread: Option<String>,
    pub body: String,
    pub filepath: String,
}

/// One relationship between a person and an email. Direction comes from the
/// [`EdgeKind`] it is written under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EdgeRow {
    pub person_id: String,
    pub email_id: String,
}

/// A property-graph database the loader can write to.
///
/// Every write is an upsert keyed by node `id`: writing the same rows twice
/// leaves the graph unchanged. Each call is one round trip.
pub trait GraphStore {
    /// Human-readable location of the store, for error messages.
    fn target(&self) -> String;

    /// Trivial read used as a connectivity check.
    fn ping(&mut self) -> Result<(), StoreError>;

    /// Whether a node with `label` and `id` exists.
    fn node_exists(&mut self, label: NodeLabel, id: &str) -> Result<bool, StoreError>;

    fn upsert_people(&mut self, rows: &[PersonNode]) -> Result<(), StoreError>;

    fn upsert_emails(&mut self, rows: &[EmailNode]) -> Result<(), StoreError>;

    /// Create missing relationships of `kind`. Rows whose endpoints do not
    /// both exist are ignored by the store.
    fn upsert_edges(&mut self, kind: EdgeKind, rows: &[EdgeRow]) -> Result<(), StoreError>;
}
