//! Integration tests for the corpus walk, interchange files, and graph load.

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::*;

use mailgraph::corpus::CorpusWalker;
use mailgraph::error::IngestError;
use mailgraph::graph::{BatchLoader, EdgeKind, MemoryStore};
use mailgraph::interchange::{Interchange, MESSAGES_FILE, PEOPLE_FILE};
use mailgraph::model::address::ParsedAddress;
use mailgraph::model::person::person_id_for;
use mailgraph::parser::eml::parse_message;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn write_file(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn mail(from: &str, to: &str, body: &str) -> String {
    format!("From: {from}\nTo: {to}\nSubject: test\nDate: Mon, 14 May 2001 16:39:00 -0700\n\n{body}\n")
}

// ─── Test 1: Maildir fixture → 3 messages, 1 empty file ─────────────

#[test]
fn test_walk_fixture_maildir() {
    let mut walker = CorpusWalker::new();
    let added = walker
        .process(&[fixture("maildir/allen-p")], None, None)
        .unwrap();
    assert_eq!(added, 3);

    let stats = walker.stats();
    assert_eq!(stats.files_found, 4);
    assert_eq!(stats.files_processed, 3);
    assert_eq!(stats.files_errored, 1);
    assert_eq!(stats.parse_errors.get("empty file"), Some(&1));
    assert_eq!(stats.total_attachments, 1);
    assert_eq!(stats.attachment_bytes, 9);

    let corpus = walker.into_corpus();
    let emails: Vec<_> = corpus.people.iter().map(|p| p.email.as_str()).collect();
    assert_eq!(
        emails,
        [
            "phillip.allen@enron.com",
            "tim.belden@enron.com",
            "john.lavorato@enron.com",
            "richard.shapiro@enron.com",
            "jose.garcia@enron.com",
        ]
    );
    // X-From seen first wins over the later quoted "Allen, Phillip K."
    assert_eq!(corpus.people[0].name.as_deref(), Some("Phillip K Allen"));
    assert_eq!(corpus.people[3].name.as_deref(), Some("Richard Shapiro"));
    assert_eq!(corpus.people[4].name.as_deref(), Some("José García"));

    let reply = &corpus.messages[1];
    assert_eq!(reply.thread.as_deref(), Some("1000.JavaMail.evans@thyme"));
    assert_eq!(reply.cc[0].email, "tim.belden@enron.com");

    let sent = &corpus.messages[2];
    assert_eq!(sent.subject, "Café schedule");
    assert_eq!(sent.body.trim(), "See attached.");
    assert_eq!(sent.attachments[0].filename, "schedule.pdf");
    assert_eq!(sent.attachments[0].content, b"Hello PDF");
}

// ─── Test 2: Two roots, one corrupt file ────────────────────────────

#[test]
fn test_two_roots_with_corrupt_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let a = temp.child("maildir/allen-p");
    let b = temp.child("maildir/arnold-j");

    for (i, name) in ["1.", "2.", "3."].iter().enumerate() {
        write_file(
            &a.path().join("inbox").join(name),
            &mail("phillip.allen@enron.com", "john.arnold@enron.com", &format!("a{i}")),
        );
    }
    write_file(
        &b.path().join("sent").join("1."),
        &mail("john.arnold@enron.com", "phillip.allen@enron.com", "b1"),
    );
    write_file(
        &b.path().join("sent").join("2."),
        &mail("john.arnold@enron.com", "Doe, Jane <jane.doe@enron.com>", "b2"),
    );
    write_file(&b.path().join("sent").join("3."), "this is not\nan email at all\n");

    let mut walker = CorpusWalker::new();
    walker
        .process(&[a.path().to_path_buf(), b.path().to_path_buf()], None, None)
        .unwrap();

    let stats = walker.stats();
    assert_eq!(stats.total_messages, 5);
    assert_eq!(stats.files_errored, 1);
    assert_eq!(stats.parse_errors.len(), 1);
    assert_eq!(stats.success_rate(), 5.0 / 6.0 * 100.0);

    let corpus = walker.into_corpus();
    assert_eq!(corpus.people.len(), 3);
    let jane = corpus
        .people
        .iter()
        .find(|p| p.email == "jane.doe@enron.com")
        .unwrap();
    assert_eq!(jane.name.as_deref(), Some("Jane Doe"));

    let folders = corpus.folder_counts();
    assert_eq!(folders[&a.path().join("inbox")], 3);
    assert_eq!(folders[&b.path().join("sent")], 2);
}

// ─── Test 3: Message cap stops the walk ─────────────────────────────

#[test]
fn test_max_messages_cap() {
    let temp = assert_fs::TempDir::new().unwrap();
    for dir in ["a", "b", "c"] {
        for i in 0..4 {
            write_file(
                &temp.path().join(dir).join(format!("{i}.")),
                &mail("x@enron.com", "y@enron.com", &format!("{dir}{i}")),
            );
        }
    }

    let mut walker = CorpusWalker::new();
    let added = walker
        .process(&[temp.path().to_path_buf()], Some(6), None)
        .unwrap();
    assert_eq!(added, 6);
    assert_eq!(walker.messages().len(), 6);
    // Directory "c" was never listed
    assert_eq!(walker.stats().files_found, 8);

    // A second call picks up where the first stopped
    let added = walker
        .process(&[temp.path().to_path_buf()], None, None)
        .unwrap();
    assert_eq!(added, 6);
    assert_eq!(walker.messages().len(), 12);
}

// ─── Test 4: Commas inside display names ────────────────────────────

#[test]
fn test_comma_safe_recipient_split() {
    let list = ParsedAddress::parse_list(
        "\"Doe, Jane\" <jane@x.com>, Smith, John <john@x.com>, bob@x.com",
    );
    let addrs: Vec<_> = list.iter().map(|a| a.address.as_str()).collect();
    assert_eq!(addrs, ["jane@x.com", "john@x.com", "bob@x.com"]);
    assert_eq!(list[0].name.as_deref(), Some("Jane Doe"));
    assert_eq!(list[1].name.as_deref(), Some("John Smith"));

    let raw = "From: a@x.com\nTo: Doe, Jane <jane@x.com>, John Smith <john@x.com>\n\nhi\n";
    let msg = parse_message(raw.as_bytes(), Path::new("f")).unwrap();
    assert_eq!(msg.to.len(), 2);
    assert_eq!(msg.to[0].name.as_deref(), Some("Jane Doe"));
    assert_eq!(msg.to[1].name.as_deref(), Some("John Smith"));
}

// ─── Test 5: Walk → interchange files → graph ───────────────────────

#[test]
fn test_walk_write_read_load() {
    let temp = assert_fs::TempDir::new().unwrap();
    let out = temp.child("user_data");

    let mut walker = CorpusWalker::new();
    walker
        .process(&[fixture("maildir/allen-p")], None, None)
        .unwrap();
    let corpus = walker.into_corpus();
    Interchange::from_corpus(&corpus).write(out.path()).unwrap();

    out.child(PEOPLE_FILE).assert(predicate::path::is_file());
    out.child(PEOPLE_FILE)
        .assert(predicate::str::contains("phillip.allen@enron.com"));
    out.child(MESSAGES_FILE)
        .assert(predicate::str::contains("Let's shoot for Tuesday"));

    let data = Interchange::read(out.path()).unwrap();
    assert_eq!(data.people.len(), 5);
    assert_eq!(data.messages.len(), 3);
    assert_eq!(
        data.people.iter().next(),
        Some(("phillip.allen@enron.com", person_id_for("phillip.allen@enron.com").as_str()))
    );

    let mut store = MemoryStore::new();
    let report = BatchLoader::new(&mut store, 2)
        .load(&data.people, &data.messages)
        .unwrap();
    assert_eq!(report.persons_written, 5);
    assert_eq!(report.emails_written, 3);
    assert_eq!(report.total_dropped(), 0);
    assert_eq!(store.edge_count(EdgeKind::Sent), 3);
    // tim (to), john + richard (to), jose (to)
    assert_eq!(store.edge_count(EdgeKind::Received), 4);
    assert_eq!(store.edge_count(EdgeKind::ReceivedCc), 1);

    let phillip = person_id_for("phillip.allen@enron.com");
    let first_key = data.messages[0].key.clone().unwrap();
    assert!(store.has_edge(EdgeKind::Sent, &phillip, &first_key));

    // Running the same load again changes nothing
    BatchLoader::new(&mut store, 2)
        .load(&data.people, &data.messages)
        .unwrap();
    assert_eq!(store.person_count(), 5);
    assert_eq!(store.email_count(), 3);
    assert_eq!(store.edge_count(EdgeKind::Received), 4);
}

// ─── Test 6: Truncated people drop their references ─────────────────

#[test]
fn test_load_limits() {
    let mut walker = CorpusWalker::new();
    walker
        .process(&[fixture("maildir/allen-p")], None, None)
        .unwrap();
    let mut data = Interchange::from_corpus(&walker.into_corpus());
    data.truncate(Some(1), Some(2));

    let mut store = MemoryStore::new();
    let report = BatchLoader::new(&mut store, 10)
        .load(&data.people, &data.messages)
        .unwrap();
    assert_eq!(store.person_count(), 1);
    assert_eq!(store.email_count(), 2);
    assert_eq!(report.edges_written[&EdgeKind::Sent], 2);
    assert_eq!(report.dropped[&EdgeKind::Received], 3);
    assert_eq!(report.dropped[&EdgeKind::ReceivedCc], 1);
}

// ─── Test 7: Broken interchange files are reported, not loaded ──────

#[test]
fn test_corrupt_interchange_is_fatal() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child(PEOPLE_FILE).write_str("[1, 2, 3]").unwrap();
    temp.child(MESSAGES_FILE).write_str("[]").unwrap();

    match Interchange::read(temp.path()).unwrap_err() {
        IngestError::DataIntegrity { path, .. } => assert!(path.ends_with(PEOPLE_FILE)),
        other => panic!("unexpected error: {other}"),
    }
}

// ─── Test 8: Missing root ───────────────────────────────────────────

#[test]
fn test_missing_root() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mut walker = CorpusWalker::new();
    let err = walker
        .process(&[temp.path().join("does-not-exist")], None, None)
        .unwrap_err();
    assert!(matches!(err, IngestError::RootNotFound(_)));
}

// ─── Test 9: One message filed in several folders ───────────────────

#[test]
fn test_message_copies_stay_separate_nodes() {
    let temp = assert_fs::TempDir::new().unwrap();
    let root = temp.child("maildir/lay-k");
    let copy = mail("kenneth.lay@enron.com", "jeff.skilling@enron.com", "same text");
    write_file(&root.path().join("all_documents").join("1."), &copy);
    write_file(&root.path().join("sent").join("1."), &copy);
    write_file(
        &root.path().join("sent").join("2."),
        &mail("kenneth.lay@enron.com", "jeff.skilling@enron.com", "other text"),
    );

    let mut walker = CorpusWalker::new();
    walker.process(&[root.path().to_path_buf()], None, None).unwrap();
    let corpus = walker.into_corpus();
    assert_eq!(corpus.messages[0].key, corpus.messages[1].key);

    let out = temp.child("user_data");
    Interchange::from_corpus(&corpus).write(out.path()).unwrap();
    let data = Interchange::read(out.path()).unwrap();
    assert_ne!(data.messages[0].key, data.messages[1].key);

    let mut store = MemoryStore::new();
    BatchLoader::new(&mut store, 1)
        .load(&data.people, &data.messages)
        .unwrap();
    assert_eq!(store.email_count(), 3);
    assert_eq!(store.edge_count(EdgeKind::Sent), 3);
}
