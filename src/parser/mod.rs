//! Mail file normalization: header decoding, MIME content, and the
//! file-to-[`Message`](crate::model::message::Message) entry points.

pub mod eml;
pub mod header;
pub mod mime;
