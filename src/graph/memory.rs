//! In-process graph store.
//!
//! Backs `load --dry-run` and the loader tests. Writes follow the same upsert
//! rules as the Neo4j statements: nodes are keyed by id, relationships are
//! only created when both endpoints exist, and repeats are no-ops.

use std::collections::{HashMap, HashSet};

use super::{EdgeKind, EdgeRow, EmailNode, GraphStore, NodeLabel, PersonNode, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    people: HashMap<String, PersonNode>,
    emails: HashMap<String, EmailNode>,
    edges: HashSet<(EdgeKind, String, String)>,
    writes: usize,
    fail_after: Option<usize>,
    offline: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose connectivity probe always fails.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Make every write fail once `n` writes have succeeded.
    pub fn fail_after_writes(&mut self, n: usize) {
        self.fail_after = Some(self.writes + n);
    }

    pub fn clear_failure(&mut self) {
        self.fail_after = None;
    }

    /// Number of successful write round trips so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn person_count(&self) -> usize {
        self.people.len()
    }

    pub fn email_count(&self) -> usize {
        self.emails.len()
    }

    pub fn edge_count(&self, kind: EdgeKind) -> usize {
        self.edges.iter().filter(|(k, _, _)| *k == kind).count()
    }

    pub fn has_edge(&self, kind: EdgeKind, person_id: &str, email_id: &str) -> bool {
        self.edges
            .contains(&(kind, person_id.to_string(), email_id.to_string()))
    }

    pub fn person(&self, id: &str) -> Option<&PersonNode> {
        self.people.get(id)
    }

    pub fn email(&self, id: &str) -> Option<&EmailNode> {
        self.emails.get(id)
    }

    fn begin_write(&mut self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        if self.fail_after.is_some_and(|limit| self.writes >= limit) {
            return Err(StoreError::Unavailable(format!(
                "write refused after {} writes",
                self.writes
            )));
        }
        self.writes += 1;
        Ok(())
    }
}

impl GraphStore for MemoryStore {
    fn target(&self) -> String {
        "memory".to_string()
    }

    fn ping(&mut self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        Ok(())
    }

    fn node_exists(&mut self, label: NodeLabel, id: &str) -> Result<bool, StoreError> {
        self.ping()?;
        Ok(match label {
            NodeLabel::Person => self.people.contains_key(id),
            NodeLabel::Email => self.emails.contains_key(id),
        })
    }

    fn upsert_people(&mut self, rows: &[PersonNode]) -> Result<(), StoreError> {
        self.begin_write()?;
        for row in rows {
            self.people.insert(row.id.clone(), row.clone());
        }
        Ok(())
    }

    fn upsert_emails(&mut self, rows: &[EmailNode]) -> Result<(), StoreError> {
        self.begin_write()?;
        for row in rows {
            self.emails.insert(row.id.clone(), row.clone());
        }
        Ok(())
    }

    fn upsert_edges(&mut self, kind: EdgeKind, rows: &[EdgeRow]) -> Result<(), StoreError> {
        self.begin_write()?;
        for row in rows {
            if self.people.contains_key(&row.person_id) && self.emails.contains_key(&row.email_id) {
                self.edges
                    .insert((kind, row.person_id.clone(), row.email_id.clone()));
            }
        }
        Ok(())
    }
}
