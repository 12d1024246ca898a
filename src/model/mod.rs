//! Core data model types: people, messages, and attachments.

pub mod address;
pub mod attachment;
pub mod message;
pub mod person;
