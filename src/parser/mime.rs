//! MIME content extraction: plain-text body and attachments.

use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::debug;

use crate::model::attachment::Attachment;

/// Body text and attachments pulled out of one raw message.
#[derive(Debug, Default)]
pub struct MimeContent {
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Walk every leaf part of `raw` in document order.
///
/// `text/plain` parts are concatenated into the body; parts that carry a
/// filename or an `attachment` disposition become attachments. When no text
/// part decodes, the whole payload is decoded as the body instead.
/// Never fails: the worst case is an empty body and no attachments.
pub fn extract_content(raw: &[u8], raw_body: &[u8]) -> MimeContent {
    let mut content = MimeContent::default();
    let mut text_parts: Vec<String> = Vec::new();
    let mut fallback: Option<String> = None;

    match MessageParser::default().parse(raw) {
        Some(msg) => {
            for part in msg.parts.iter() {
                if matches!(part.body, PartType::Multipart(_)) {
                    continue;
                }
                if is_attachment(part) {
                    if let Some(att) = attachment_from_part(part) {
                        content.attachments.push(att);
                    }
                    continue;
                }
                if is_plain_text(part) {
                    if let PartType::Text(text) = &part.body {
                        text_parts.push(text.to_string());
                    }
                }
            }
            // Single-part messages: the transfer-decoded payload beats raw bytes
            if let Some(root) = msg.parts.first() {
                if !matches!(root.body, PartType::Multipart(_)) {
                    fallback = Some(String::from_utf8_lossy(root.contents()).into_owned());
                }
            }
        }
        None => debug!("mail-parser could not parse message, using raw body"),
    }

    content.body = if text_parts.is_empty() {
        fallback.unwrap_or_else(|| String::from_utf8_lossy(raw_body).into_owned())
    } else {
        text_parts.join("\n")
    };
    content
}

/// A part is an attachment when it names a file or says so in its disposition.
fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.attachment_name().is_some()
        || part
            .content_disposition()
            .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"))
}

/// `text/plain`, or no `Content-Type` at all (which defaults to it).
fn is_plain_text(part: &MessagePart<'_>) -> bool {
    match part.content_type() {
        None => true,
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct.subtype().map_or(true, |s| s.eq_ignore_ascii_case("plain"))
        }
    }
}

/// Build an [`Attachment`]; parts with no decodable content are dropped.
fn attachment_from_part(part: &MessagePart<'_>) -> Option<Attachment> {
    let bytes = part.contents();
    if bytes.is_empty() {
        return None;
    }

    let content_type = part
        .content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
        .to_lowercase();

    Some(Attachment {
        filename: part.attachment_name().unwrap_or("unknown").to_string(),
        content_type,
        size: bytes.len() as u64,
        content: bytes.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::header::split_header_body;

    fn extract(raw: &[u8]) -> MimeContent {
        let (_, body) = split_header_body(raw);
        extract_content(raw, body)
    }

    #[test]
    fn test_single_part_plain_text() {
        let raw = b"From: a@b.com\nSubject: Hi\n\nHello there.\n";
        let content = extract(raw);
        assert_eq!(content.body.trim(), "Hello there.");
        assert!(content.attachments.is_empty());
    }

    #[test]
    fn test_multipart_text_and_attachment() {
        let raw = b"From: a@b.com\n\
Content-Type: multipart/mixed; boundary=\"XX\"\n\
\n\
--XX\n\
Content-Type: text/plain\n\
\n\
First part.\n\
--XX\n\
Content-Type: text/html\n\
\n\
<p>ignored</p>\n\
--XX\n\
Content-Type: application/pdf; name=\"report.pdf\"\n\
Content-Disposition: attachment; filename=\"report.pdf\"\n\
Content-Transfer-Encoding: base64\n\
\n\
SGVsbG8gUERG\n\
--XX--\n";
        let content = extract(raw);
        assert!(content.body.contains("First part."));
        assert!(!content.body.contains("ignored"));
        assert_eq!(content.attachments.len(), 1);
        let att = &content.attachments[0];
        assert_eq!(att.filename, "report.pdf");
        assert_eq!(att.content_type, "application/pdf");
        assert_eq!(att.content, b"Hello PDF");
        assert_eq!(att.size, 9);
    }

    #[test]
    fn test_html_only_falls_back_to_raw_payload() {
        let raw = b"From: a@b.com\nContent-Type: text/html\n\n<p>Only html</p>\n";
        let content = extract(raw);
        assert!(content.body.contains("<p>Only html</p>"));
    }
}
