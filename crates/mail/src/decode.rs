use chrono::{DateTime, Utc};
use mail_parser::decoders::html::html_to_text;
use mail_parser::{HeaderName, HeaderValue, Message, MessageParser};

/// The decoded, pipeline-ready view of one raw message. Not persisted;
/// lives only for the duration of processing.
#[derive(Debug, Clone, Default)]
pub struct DecodedEmail {
    pub subject: String,
    /// Plain text with whitespace runs collapsed to single spaces. The rule
    /// matchers are written against this collapsed form.
    pub body: String,
    /// Bare address, extracted from the display-name form of `From:`.
    pub sender: String,
    /// `Date:` header, falling back to the newest `Received:` trace. `None`
    /// when neither parses; the caller substitutes ingestion time.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Decode a raw RFC 822 message into a `DecodedEmail`.
///
/// Never fails: a message that cannot be parsed at all yields empty fields,
/// and an empty body simply fails the gatekeeper downstream. Malformed
/// characters decode to replacement characters inside `mail-parser`.
pub fn decode_message(raw: &[u8]) -> DecodedEmail {
    let Some(message) = MessageParser::default().parse(raw) else {
        tracing::debug!("unparsable message, yielding empty body");
        return DecodedEmail::default();
    };

    let subject = message.subject().unwrap_or_default().trim().to_string();
    let sender = sender_address(&message);
    let timestamp = message_timestamp(&message);

    // Prefer a plain-text part; senders that only ship HTML get their markup
    // stripped (script/style content discarded) before whitespace collapse.
    let body = match message.body_text(0) {
        Some(text) => text.into_owned(),
        None => message
            .body_html(0)
            .map(|html| html_to_text(html.as_ref()))
            .unwrap_or_default(),
    };

    DecodedEmail {
        subject,
        body: clean_body(&body),
        sender,
        timestamp,
    }
}

/// Collapse every whitespace run (newlines, tabs, soft wraps) to a single
/// space and trim the ends. Source formats wrap the same sentence
/// differently, so matching happens on the collapsed form.
pub fn clean_body(body: &str) -> String {
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn sender_address(message: &Message<'_>) -> String {
    message
        .from()
        .and_then(|a| a.first())
        .and_then(|addr| addr.address())
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn message_timestamp(message: &Message<'_>) -> Option<DateTime<Utc>> {
    if let Some(date) = message.date() {
        if let Some(ts) = DateTime::<Utc>::from_timestamp(date.to_timestamp(), 0) {
            return Some(ts);
        }
    }
    // No usable Date header: fall back to the newest relay trace.
    for header in message.headers() {
        if header.name == HeaderName::Received {
            if let HeaderValue::Received(received) = &header.value {
                if let Some(date) = received.date.as_ref() {
                    if let Some(ts) = DateTime::<Utc>::from_timestamp(date.to_timestamp(), 0) {
                        return Some(ts);
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_plain_text_message() {
        let raw = b"From: ICICI Bank <credit_cards@icicibank.com>\r\n\
            Subject: Transaction alert\r\n\
            Date: Fri, 09 May 2025 06:05:07 +0530\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\
            \r\n\
            Your ICICI Bank Credit Card XX1039 has been used.\r\n";
        let email = decode_message(raw);
        assert_eq!(email.subject, "Transaction alert");
        assert_eq!(email.sender, "credit_cards@icicibank.com");
        assert_eq!(
            email.body,
            "Your ICICI Bank Credit Card XX1039 has been used."
        );
        // +05:30 normalizes to UTC.
        assert_eq!(
            email.timestamp,
            Some(Utc.with_ymd_and_hms(2025, 5, 9, 0, 35, 7).unwrap())
        );
    }

    #[test]
    fn prefers_plain_part_over_html() {
        let raw = b"From: a@b.example\r\n\
            Subject: s\r\n\
            Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
            \r\n\
            --XYZ\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\
            \r\n\
            Plain body here\r\n\
            --XYZ\r\n\
            Content-Type: text/html; charset=utf-8\r\n\
            \r\n\
            <html><body><p>HTML body</p></body></html>\r\n\
            --XYZ--\r\n";
        let email = decode_message(raw);
        assert_eq!(email.body, "Plain body here");
    }

    #[test]
    fn html_only_is_stripped_to_text() {
        let raw = b"From: a@b.example\r\n\
            Subject: s\r\n\
            Content-Type: text/html; charset=utf-8\r\n\
            \r\n\
            <html><head><style>p { color: red }</style>\
            <script>alert('x')</script></head>\
            <body><p>Rs. 149.00   spent at\r\n  AMAZON</p></body></html>\r\n";
        let email = decode_message(raw);
        assert!(email.body.contains("Rs. 149.00 spent at AMAZON"), "{}", email.body);
        assert!(!email.body.contains("color: red"));
        assert!(!email.body.contains("alert"));
        assert!(!email.body.contains('<'));
    }

    #[test]
    fn decodes_encoded_word_subject() {
        let raw = b"From: a@b.example\r\n\
            Subject: =?utf-8?q?UPI_txn_alert?=\r\n\
            \r\n\
            body\r\n";
        let email = decode_message(raw);
        assert_eq!(email.subject, "UPI txn alert");
    }

    #[test]
    fn garbage_input_yields_empty_body() {
        let email = decode_message(&[0xff, 0xfe, 0x00, 0x01]);
        assert!(email.body.is_empty());
        assert!(email.subject.is_empty());
        assert!(email.timestamp.is_none());
    }

    #[test]
    fn missing_date_falls_back_to_received_trace() {
        let raw = b"From: a@b.example\r\n\
            Received: from mx.example by mail.example; Fri, 09 May 2025 10:00:00 +0000\r\n\
            Subject: s\r\n\
            \r\n\
            body\r\n";
        let email = decode_message(raw);
        assert_eq!(
            email.timestamp,
            Some(Utc.with_ymd_and_hms(2025, 5, 9, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn clean_body_collapses_whitespace() {
        assert_eq!(
            clean_body("  Rs. 349.00\r\n has  been\tdebited "),
            "Rs. 349.00 has been debited"
        );
        assert_eq!(clean_body(""), "");
    }
}
