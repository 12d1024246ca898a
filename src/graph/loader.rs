//! Batched, resumable upload of interchange data into a [`GraphStore`].
//!
//! People are written first, then messages. Both are cut into fixed-size
//! batches in file order, so batch `N` holds the same rows on every run over
//! the same input. On start the loader probes the last node of each batch
//! and resumes at the first batch that is not fully present.

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use super::{EdgeKind, EdgeRow, EmailNode, GraphStore, NodeLabel, PersonNode, StoreError};
use crate::error::{IngestError, Result};
use crate::interchange::{email_ids, MessageRecord, PeopleMap};

/// Which half of the load a progress update refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    People,
    Emails,
}

/// Sent to the progress callback after every written batch.
#[derive(Debug, Clone, Copy)]
pub struct LoadProgress {
    pub stage: LoadStage,
    /// Zero-based index of the batch just written.
    pub batch: usize,
    pub batches: usize,
}

/// Summary of one [`BatchLoader::load`] run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LoadReport {
    pub persons_written: usize,
    pub person_batches_written: usize,
    pub person_batches_skipped: usize,
    pub emails_written: usize,
    pub email_batches_written: usize,
    pub email_batches_skipped: usize,
    /// Relationship rows sent per kind.
    pub edges_written: BTreeMap<EdgeKind, usize>,
    /// References to people outside the loaded Person set, per kind.
    pub dropped: BTreeMap<EdgeKind, usize>,
    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn total_edges(&self) -> usize {
        self.edges_written.values().sum()
    }

    pub fn total_dropped(&self) -> usize {
        self.dropped.values().sum()
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Drives a [`GraphStore`] through a full, restartable load.
pub struct BatchLoader<'a, S: GraphStore + ?Sized> {
    store: &'a mut S,
    batch_size: usize,
    progress: Option<&'a dyn Fn(LoadProgress)>,
}

impl<'a, S: GraphStore + ?Sized> BatchLoader<'a, S> {
    pub fn new(store: &'a mut S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size,
            progress: None,
        }
    }

    /// Call `cb` after every batch that was written.
    pub fn with_progress(mut self, cb: &'a dyn Fn(LoadProgress)) -> Self {
        self.progress = Some(cb);
        self
    }

    /// Upload `people` and `messages`, resuming where an earlier run stopped.
    ///
    /// Any store failure aborts the run; completed batches stay written and
    /// are skipped next time.
    pub fn load(&mut self, people: &PeopleMap, messages: &[MessageRecord]) -> Result<LoadReport> {
        if self.batch_size == 0 {
            return Err(IngestError::InvalidBatchSize(self.batch_size));
        }
        let start = Instant::now();

        self.store.ping().map_err(|source| IngestError::Connectivity {
            target: self.store.target(),
            source,
        })?;

        let mut report = LoadReport::default();
        self.load_people(people, &mut report)?;
        self.load_emails(&people.ids(), messages, &mut report)?;

        report.elapsed = start.elapsed();
        info!(
            persons = report.persons_written,
            emails = report.emails_written,
            edges = report.total_edges(),
            dropped = report.total_dropped(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Graph load finished"
        );
        Ok(report)
    }

    fn load_people(&mut self, people: &PeopleMap, report: &mut LoadReport) -> Result<()> {
        let rows: Vec<PersonNode> = people
            .iter()
            .map(|(email, id)| PersonNode {
                id: id.to_string(),
                email: email.to_string(),
            })
            .collect();
        let batches: Vec<&[PersonNode]> = rows.chunks(self.batch_size).collect();

        let resume = self.first_missing_batch(
            NodeLabel::Person,
            batches.iter().filter_map(|b| b.last()).map(|p| p.id.as_str()),
        )?;
        let Some(resume) = resume else {
            info!(batches = batches.len(), "All Person batches present; skipping people");
            report.person_batches_skipped = batches.len();
            return Ok(());
        };
        if resume > 0 {
            info!(batch = resume, "Resuming Person upload");
        }
        report.person_batches_skipped = resume;

        for (index, batch) in batches.iter().enumerate().skip(resume) {
            self.store
                .upsert_people(batch)
                .map_err(store_error("Person upsert", index))?;
            report.persons_written += batch.len();
            report.person_batches_written += 1;
            self.notify(LoadStage::People, index, batches.len());
        }
        Ok(())
    }

    fn load_emails(
        &mut self,
        known: &HashSet<&str>,
        messages: &[MessageRecord],
        report: &mut LoadReport,
    ) -> Result<()> {
        let ids = email_ids(messages);
        let batch_count = messages.len().div_ceil(self.batch_size);
        if batch_count == 0 {
            return Ok(());
        }

        let last_ids = ids.chunks(self.batch_size).filter_map(|c| c.last()).map(String::as_str);
        // Edges land after their batch's nodes, so the batch before the first
        // missing one (or the final batch) may still lack its relationships.
        let resume = match self.first_missing_batch(NodeLabel::Email, last_ids)? {
            Some(missing) => missing.saturating_sub(1),
            None => batch_count - 1,
        };
        if resume > 0 {
            info!(batch = resume, "Resuming Email upload");
        }
        report.email_batches_skipped = resume;

        for index in resume..batch_count {
            let lo = index * self.batch_size;
            let hi = (lo + self.batch_size).min(messages.len());
            self.write_email_batch(index, &messages[lo..hi], &ids[lo..hi], known, report)?;
            report.email_batches_written += 1;
            self.notify(LoadStage::Emails, index, batch_count);
        }
        Ok(())
    }

    fn write_email_batch(
        &mut self,
        index: usize,
        messages: &[MessageRecord],
        ids: &[String],
        known: &HashSet<&str>,
        report: &mut LoadReport,
    ) -> Result<()> {
        let nodes: Vec<EmailNode> = messages
            .iter()
            .zip(ids)
            .map(|(m, id)| EmailNode {
                id: id.clone(),
                time: m.time.clone(),
                thread: m.thread.clone(),
                body: m.message.clone(),
                filepath: m.filepath.clone(),
            })
            .collect();
        self.store
            .upsert_emails(&nodes)
            .map_err(store_error("Email upsert", index))?;
        report.emails_written += nodes.len();

        for kind in EdgeKind::ALL {
            let mut seen = HashSet::new();
            let mut rows = Vec::new();
            let mut dropped = 0usize;
            for (m, email_id) in messages.iter().zip(ids) {
                for person_id in participants(m, kind) {
                    if !known.contains(person_id.as_str()) {
                        dropped += 1;
                        continue;
                    }
                    let row = EdgeRow {
                        person_id: person_id.clone(),
                        email_id: email_id.clone(),
                    };
                    if seen.insert(row.clone()) {
                        rows.push(row);
                    }
                }
            }

            if dropped > 0 {
                debug!(kind = %kind, batch = index, dropped, "Dropped references to unknown people");
                *report.dropped.entry(kind).or_default() += dropped;
            }
            if rows.is_empty() {
                continue;
            }
            self.store
                .upsert_edges(kind, &rows)
                .map_err(store_error("relationship upsert", index))?;
            *report.edges_written.entry(kind).or_default() += rows.len();
        }
        Ok(())
    }

    /// Index of the first batch whose last node is absent, probing in order.
    fn first_missing_batch<'i>(
        &mut self,
        label: NodeLabel,
        last_ids: impl Iterator<Item = &'i str>,
    ) -> Result<Option<usize>> {
        for (index, id) in last_ids.enumerate() {
            let present = self
                .store
                .node_exists(label, id)
                .map_err(store_error("existence probe", index))?;
            if !present {
                debug!(label = %label, batch = index, "First missing batch");
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn notify(&self, stage: LoadStage, batch: usize, batches: usize) {
        if let Some(cb) = self.progress {
            cb(LoadProgress {
                stage,
                batch,
                batches,
            });
        }
    }
}

/// Person ids referenced by `message` under `kind`.
fn participants(message: &MessageRecord, kind: EdgeKind) -> &[String] {
    match kind {
        EdgeKind::Sent => message.sender.as_slice(),
        EdgeKind::Received => &message.recipients,
        EdgeKind::ReceivedCc => &message.cc,
        EdgeKind::ReceivedBcc => &message.bcc,
    }
}

fn store_error(stage: &'static str, batch: usize) -> impl FnOnce(StoreError) -> IngestError {
    move |source| IngestError::Store {
        stage,
        batch,
        source,
    }
}
