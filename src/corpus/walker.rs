//! Depth-first traversal of mailbox trees into an in-memory corpus.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::registry::PersonRegistry;
use super::stats::WalkStats;
use super::Corpus;
use crate::error::{IngestError, Result};
use crate::model::message::Message;
use crate::parser::eml;

/// Walks mailbox roots, normalizes every file, and accumulates the corpus.
///
/// Traversal is depth-first: a directory's files first, then its
/// sub-directories, each group sorted by file name so that message positions
/// are reproducible across platforms. Dotfiles and dot-directories are skipped.
#[derive(Debug, Default)]
pub struct CorpusWalker {
    registry: PersonRegistry,
    messages: Vec<Message>,
    processed: HashSet<PathBuf>,
    stats: WalkStats,
}

impl CorpusWalker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk `roots` in order and add every parseable file to the corpus.
    ///
    /// Stops as soon as `max_messages` messages were added by this call;
    /// directories not yet listed at that point are never listed. Files this
    /// walker has already seen (parsed or failed) are skipped. Returns the
    /// number of messages added.
    pub fn process(
        &mut self,
        roots: &[PathBuf],
        max_messages: Option<usize>,
        progress: Option<&dyn Fn(&WalkStats)>,
    ) -> Result<usize> {
        if let Some(missing) = roots.iter().find(|r| !r.is_dir()) {
            return Err(IngestError::RootNotFound(missing.clone()));
        }

        let start = Instant::now();
        let mut added = 0usize;
        let cap_reached = |added: usize| max_messages.is_some_and(|max| added >= max);

        'roots: for root in roots {
            info!(root = %root.display(), "Processing mailbox root");
            let mut pending = vec![root.clone()];

            while let Some(dir) = pending.pop() {
                if cap_reached(added) {
                    break 'roots;
                }
                let (files, subdirs) = match list_dir(&dir) {
                    Ok(listing) => listing,
                    Err(e) => {
                        warn!(path = %dir.display(), error = %e, "Skipping unreadable directory");
                        continue;
                    }
                };
                // Reverse so the lexicographically first sub-directory pops first
                pending.extend(subdirs.into_iter().rev());

                let fresh: Vec<PathBuf> = files
                    .into_iter()
                    .filter(|f| !self.processed.contains(f))
                    .collect();
                self.stats.files_found += fresh.len() as u64;
                debug!(path = %dir.display(), files = fresh.len(), "Listed directory");

                for file in fresh {
                    if cap_reached(added) {
                        break 'roots;
                    }
                    if self.ingest_file(&file) {
                        added += 1;
                    }
                    if let Some(cb) = progress {
                        cb(&self.stats);
                    }
                }
            }
        }

        self.stats.elapsed += start.elapsed();
        info!(
            added,
            total = self.messages.len(),
            errored = self.stats.files_errored,
            "Corpus walk finished"
        );
        Ok(added)
    }

    /// Normalize one file into the corpus. Returns `true` if a message was added.
    fn ingest_file(&mut self, path: &Path) -> bool {
        self.processed.insert(path.to_path_buf());

        let mut message = match eml::parse_file(path) {
            Ok(message) => message,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unparseable file");
                self.stats.record_error(e.to_string());
                return false;
            }
        };

        message.id = self.messages.len() as u64;
        message.sender = self.registry.resolve(message.sender).clone();
        for list in [&mut message.to, &mut message.cc, &mut message.bcc] {
            for person in list.iter_mut() {
                *person = self.registry.resolve(person.clone()).clone();
            }
        }

        self.stats.files_processed += 1;
        self.stats.total_messages += 1;
        if !message.attachments.is_empty() {
            self.stats.messages_with_attachments += 1;
            self.stats.total_attachments += message.attachments.len() as u64;
            self.stats.attachment_bytes += message.attachments.iter().map(|a| a.size).sum::<u64>();
            debug!(path = %path.display(), count = message.attachments.len(), "Found attachments");
        }

        self.messages.push(message);
        true
    }

    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    pub fn registry(&self) -> &PersonRegistry {
        &self.registry
    }

    /// Messages so far. Participant names are as known when each message was
    /// ingested; [`into_corpus`](Self::into_corpus) brings them up to date.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Finish walking and hand over people and messages.
    ///
    /// Every participant on every message carries the registry's final name
    /// for its address, including names first seen in later files.
    pub fn into_corpus(mut self) -> Corpus {
        for message in &mut self.messages {
            let participants = std::iter::once(&mut message.sender)
                .chain(message.to.iter_mut())
                .chain(message.cc.iter_mut())
                .chain(message.bcc.iter_mut());
            for person in participants {
                if let Some(canonical) = self.registry.get(&person.email) {
                    person.name.clone_from(&canonical.name);
                }
            }
        }
        Corpus {
            people: self.registry.into_people(),
            messages: self.messages,
        }
    }
}

/// List one directory: (files, sub-directories), both sorted by name, hidden
/// entries removed.
fn list_dir(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut entries: Vec<fs::DirEntry> = fs::read_dir(dir)
        .map_err(|e| IngestError::io(dir, e))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => subdirs.push(path),
            // Symlinks count as files only when they point at one
            Ok(_) if path.is_file() => files.push(path),
            _ => {}
        }
    }
    Ok((files, subdirs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_mail(dir: &Path, name: &str, from: &str) {
        fs::create_dir_all(dir).unwrap();
        let body = format!("From: {from}\nTo: boss@x.com\nSubject: {name}\n\nbody of {name}\n");
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_sorted_depth_first_order() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("allen-p");
        write_mail(&root, "b", "a@x.com");
        write_mail(&root, "a", "a@x.com");
        write_mail(&root.join("sent"), "1.", "a@x.com");
        write_mail(&root.join("inbox"), "1.", "b@x.com");
        write_mail(&root, ".hidden", "a@x.com");
        write_mail(&root.join(".git"), "x", "a@x.com");

        let mut walker = CorpusWalker::new();
        walker.process(&[root.clone()], None, None).unwrap();

        let subjects: Vec<String> = walker
            .messages()
            .iter()
            .map(|m| {
                let rel = m.file_path.strip_prefix(&root).unwrap();
                rel.to_string_lossy().replace('\\', "/")
            })
            .collect();
        assert_eq!(subjects, ["a", "b", "inbox/1.", "sent/1."]);
        let ids: Vec<u64> = walker.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, [0, 1, 2, 3]);
        assert_eq!(walker.stats().files_found, 4);
    }

    #[test]
    fn test_reprocessing_skips_seen_files() {
        let tmp = tempfile::tempdir().unwrap();
        write_mail(tmp.path(), "1", "a@x.com");
        write_mail(tmp.path(), "2", "a@x.com");
        let roots = [tmp.path().to_path_buf()];

        let mut walker = CorpusWalker::new();
        assert_eq!(walker.process(&roots, None, None).unwrap(), 2);
        assert_eq!(walker.process(&roots, None, None).unwrap(), 0);
        write_mail(tmp.path(), "3", "a@x.com");
        assert_eq!(walker.process(&roots, None, None).unwrap(), 1);
        assert_eq!(walker.messages().len(), 3);
        assert_eq!(walker.registry().len(), 2);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let mut walker = CorpusWalker::new();
        let err = walker
            .process(&[PathBuf::from("/no/such/maildir")], None, None)
            .unwrap_err();
        assert!(matches!(err, IngestError::RootNotFound(_)));
    }

    #[test]
    fn test_participants_resolve_through_registry() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("1"),
            "From: jane@x.com\nTo: John@X.com\n\nhi\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("2"),
            "From: \"Smith, John\" <john@x.com>\nTo: jane@x.com\n\nhi\n",
        )
        .unwrap();

        let mut walker = CorpusWalker::new();
        walker.process(&[tmp.path().to_path_buf()], None, None).unwrap();
        assert_eq!(walker.messages()[0].to[0].name, None);

        let corpus = walker.into_corpus();
        let emails: Vec<_> = corpus.people.iter().map(|p| p.email.as_str()).collect();
        assert_eq!(emails, ["jane@x.com", "john@x.com"]);
        assert_eq!(corpus.people[1].name.as_deref(), Some("John Smith"));
        // The name learned from file 2 reaches the recipient of file 1
        assert_eq!(corpus.messages[0].to[0].name.as_deref(), Some("John Smith"));
        assert_eq!(corpus.messages[1].sender.name.as_deref(), Some("John Smith"));
    }
}
