//! Normalizer for single-message mail files (maildir / `.eml` layout).

use std::path::Path;

use crate::error::ParseError;
use crate::model::address::{clean_display_name, parse_name_list, ParsedAddress};
use crate::model::message::{content_key, Message};
use crate::model::person::Person;
use crate::parser::header::{self, Headers};
use crate::parser::mime;

/// Read and normalize one mail file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Message, ParseError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| ParseError::Unreadable(e.kind().to_string()))?;
    parse_message(&data, path)
}

/// Normalize the raw bytes of one message.
///
/// `path` is provenance only; nothing is read from disk. The returned
/// message has `id == 0` until the corpus walker assigns its position.
pub fn parse_message(raw: &[u8], path: &Path) -> Result<Message, ParseError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::Empty);
    }

    let (header_bytes, body_bytes) = header::split_header_body(raw);
    let headers = Headers::parse(header_bytes);
    if headers.is_empty() {
        return Err(ParseError::NoHeaders);
    }

    let sender = parse_sender(&headers)?;
    let to = parse_recipients(&headers, "to", "x-to");
    let cc = parse_recipients(&headers, "cc", "x-cc");
    let bcc = parse_recipients(&headers, "bcc", "x-bcc");

    let content = mime::extract_content(raw, body_bytes);
    let time = headers.get("date").and_then(|d| header::parse_date(&d));

    let in_reply_to = headers
        .get("in-reply-to")
        .and_then(|v| header::extract_message_ids(&v).into_iter().next());
    let references = headers
        .get("references")
        .map(|v| header::extract_message_ids(&v))
        .unwrap_or_default();
    let thread = references.first().cloned().or_else(|| in_reply_to.clone());

    Ok(Message {
        id: 0,
        key: content_key(&sender.email, time.as_ref(), &content.body),
        message_id: headers
            .get("message-id")
            .map(|v| header::strip_angle_brackets(&v))
            .unwrap_or_default(),
        subject: headers.get("subject").unwrap_or_default(),
        body: content.body,
        time,
        thread,
        in_reply_to,
        references,
        sender,
        to,
        cc,
        bcc,
        attachments: content.attachments,
        folder_path: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        file_path: path.to_path_buf(),
    })
}

/// Sender from `From`, with the `X-From` display name preferred when present.
fn parse_sender(headers: &Headers) -> Result<Person, ParseError> {
    let from = headers.get("from").ok_or(ParseError::MissingFrom)?;
    let parsed = ParsedAddress::parse_list(&from)
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::InvalidSender(from.trim().to_string()))?;

    // X-From is a single name that may itself be "Last, First"
    let x_name = headers.get("x-from").and_then(|x| {
        let name_part = x.split('<').next().unwrap_or_default();
        clean_display_name(name_part, &parsed.address)
    });

    Ok(Person::new(&parsed.address, x_name.or(parsed.name)))
}

/// Recipients from `field`, named positionally from `x_field`.
fn parse_recipients(headers: &Headers, field: &str, x_field: &str) -> Vec<Person> {
    let Some(value) = headers.get(field) else {
        return Vec::new();
    };
    let addresses = ParsedAddress::parse_list(&value);
    let names = headers
        .get(x_field)
        .map(|x| parse_name_list(&x, addresses.len()))
        .unwrap_or_default();

    addresses
        .into_iter()
        .enumerate()
        .map(|(i, addr)| {
            let x_name = names
                .get(i)
                .cloned()
                .flatten()
                .filter(|n| !n.eq_ignore_ascii_case(&addr.address));
            Person::new(&addr.address, x_name.or(addr.name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENRON: &[u8] = b"Message-ID: <18782981.1075855378110.JavaMail.evans@thyme>\n\
Date: Mon, 14 May 2001 16:39:00 -0700 (PDT)\n\
From: phillip.allen@enron.com\n\
To: tim.belden@enron.com, john.lavorato@enron.com\n\
Cc: jane@x.com\n\
Subject: Re: forecast\n\
Mime-Version: 1.0\n\
Content-Type: text/plain; charset=us-ascii\n\
Content-Transfer-Encoding: 7bit\n\
X-From: Allen, Phillip K.\n\
X-To: Tim Belden <Tim Belden/Enron@EnronXGate>, Lavorato, John <John J Lavorato/ENRON@enronXgate>\n\
X-cc: jane@x.com\n\
X-bcc: \n\
X-Folder: \\Phillip_Allen_Jan2002_1\\Allen, Phillip K.\\'Sent Mail\n\
\n\
Here is our forecast\n";

    #[test]
    fn test_enron_message() {
        let msg = parse_message(ENRON, Path::new("maildir/allen-p/sent/1.")).unwrap();
        assert_eq!(msg.message_id, "18782981.1075855378110.JavaMail.evans@thyme");
        assert_eq!(msg.subject, "Re: forecast");
        assert_eq!(msg.sender.email, "phillip.allen@enron.com");
        assert_eq!(msg.sender.name.as_deref(), Some("Phillip K. Allen"));
        assert_eq!(msg.to.len(), 2);
        assert_eq!(msg.to[0].name.as_deref(), Some("Tim Belden"));
        assert_eq!(msg.to[1].email, "john.lavorato@enron.com");
        assert_eq!(msg.to[1].name.as_deref(), Some("John Lavorato"));
        assert_eq!(msg.cc.len(), 1);
        assert_eq!(msg.cc[0].name, None);
        assert!(msg.bcc.is_empty());
        assert_eq!(msg.body.trim(), "Here is our forecast");
        assert_eq!(
            msg.time_rfc3339().as_deref(),
            Some("2001-05-14T23:39:00+00:00")
        );
        assert_eq!(msg.thread, None);
        assert_eq!(msg.folder_path, Path::new("maildir/allen-p/sent"));
    }

    #[test]
    fn test_thread_hints() {
        let raw = b"From: a@b.com\nIn-Reply-To: <m2@x>\nReferences: <m0@x> <m1@x>\n\nbody\n";
        let msg = parse_message(raw, Path::new("f")).unwrap();
        assert_eq!(msg.in_reply_to.as_deref(), Some("m2@x"));
        assert_eq!(msg.references, vec!["m0@x".to_string(), "m1@x".to_string()]);
        assert_eq!(msg.thread.as_deref(), Some("m0@x"));

        let raw = b"From: a@b.com\nIn-Reply-To: <m2@x>\n\nbody\n";
        let msg = parse_message(raw, Path::new("f")).unwrap();
        assert_eq!(msg.thread.as_deref(), Some("m2@x"));
    }

    #[test]
    fn test_display_name_from_header_when_no_x_from() {
        let raw = b"From: \"Doe, Jane\" <Jane@X.com>\n\nhi\n";
        let msg = parse_message(raw, Path::new("f")).unwrap();
        assert_eq!(msg.sender.email, "jane@x.com");
        assert_eq!(msg.sender.name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_unbracketed_last_first_recipients() {
        let raw = b"From: jeff.skilling@enron.com\nTo: kenneth.lay@enron.com\n\
X-From: Skilling, Jeff\nX-To: Lay, Kenneth\n\nhi\n";
        let msg = parse_message(raw, Path::new("f")).unwrap();
        assert_eq!(msg.sender.name.as_deref(), Some("Jeff Skilling"));
        assert_eq!(msg.to[0].name.as_deref(), Some("Kenneth Lay"));

        let raw = b"From: a@enron.com\nTo: kenneth.lay@enron.com, jeff.skilling@enron.com\n\
X-To: Lay, Kenneth, Skilling, Jeff\n\nhi\n";
        let msg = parse_message(raw, Path::new("f")).unwrap();
        assert_eq!(msg.to[0].name.as_deref(), Some("Kenneth Lay"));
        assert_eq!(msg.to[1].name.as_deref(), Some("Jeff Skilling"));
    }

    #[test]
    fn test_misaligned_x_names_fall_back_to_header_names() {
        // One To entry is unusable, so X-To no longer lines up
        let raw = b"From: a@enron.com\nTo: \"Lay, Kenneth\" <kenneth.lay@enron.com>, <>\n\
X-To: Skilling, Jeff, Lay, Kenneth\n\nhi\n";
        let msg = parse_message(raw, Path::new("f")).unwrap();
        assert_eq!(msg.to.len(), 1);
        assert_eq!(msg.to[0].name.as_deref(), Some("Kenneth Lay"));
    }

    #[test]
    fn test_bad_date_is_none_not_error() {
        let raw = b"From: a@b.com\nDate: sometime last week\n\nhi\n";
        let msg = parse_message(raw, Path::new("f")).unwrap();
        assert!(msg.time.is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_message(b"", Path::new("f")).unwrap_err(), ParseError::Empty);
        assert_eq!(
            parse_message(b"just some words\nand more\n", Path::new("f")).unwrap_err(),
            ParseError::NoHeaders
        );
        assert_eq!(
            parse_message(b"Subject: hi\n\nbody\n", Path::new("f")).unwrap_err(),
            ParseError::MissingFrom
        );
        assert!(matches!(
            parse_message(b"From: nobody\n\nbody\n", Path::new("f")).unwrap_err(),
            ParseError::InvalidSender(_)
        ));
    }

    #[test]
    fn test_error_causes_are_readable() {
        assert_eq!(ParseError::MissingFrom.to_string(), "no From header");
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file("/definitely/not/here").unwrap_err();
        assert!(matches!(err, ParseError::Unreadable(_)));
    }
}
