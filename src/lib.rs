//! `mailgraph`: turn directory trees of raw email files into a property
//! graph of people and messages.
//!
//! The pipeline has two halves joined by JSON interchange files:
//!
//! 1. [`corpus::CorpusWalker`] walks mailbox roots, normalizes each file with
//!    [`parser::eml`], and deduplicates participants in a
//!    [`corpus::PersonRegistry`]. [`interchange::Interchange`] writes the
//!    result as `users.json` and `messages.json`.
//! 2. [`graph::BatchLoader`] reads those files back and upserts Person and
//!    Email nodes plus their relationships into a [`graph::GraphStore`],
//!    resuming where an interrupted run stopped.

pub mod config;
pub mod corpus;
pub mod error;
pub mod graph;
pub mod interchange;
pub mod model;
pub mod parser;
