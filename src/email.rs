use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([^>]+)>").expect("address pattern is valid")
});

/// One body part of a fetched message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BodyPart {
    Text(String),
    /// Payload that did not decode as UTF-8 text
    Binary(Vec<u8>),
}

/// Represents a fetched email message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub msg_id: String,
    pub thread_id: String,
    pub sender_email: String,
    pub recipient_email: String,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub body_parts: Vec<BodyPart>,
}

/// Builder for creating Message instances
#[derive(Default)]
pub struct MessageBuilder {
    msg_id: String,
    thread_id: String,
    from: String,
    to: String,
    subject: String,
    date: Option<DateTime<Utc>>,
    body_parts: Vec<BodyPart>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.msg_id = id.into();
        self
    }

    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = thread_id.into();
        self
    }

    /// Raw `From` header value, `Name <addr>` or a bare address
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    /// Raw `To` header value, `Name <addr>` or a bare address
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn text_part(mut self, text: impl Into<String>) -> Self {
        self.body_parts.push(BodyPart::Text(text.into()));
        self
    }

    pub fn binary_part(mut self, data: Vec<u8>) -> Self {
        self.body_parts.push(BodyPart::Binary(data));
        self
    }

    pub fn build(self) -> Message {
        Message {
            msg_id: self.msg_id,
            thread_id: self.thread_id,
            sender_email: extract_email(&self.from),
            recipient_email: extract_email(&self.to),
            subject: self.subject,
            date: self.date.unwrap_or_else(Utc::now),
            body_parts: self.body_parts,
        }
    }
}

/// Extracts the email address from a "Name <email>" format string
/// If no angle brackets are present, returns the string trimmed as-is
pub fn extract_email(header: &str) -> String {
    if let Some(captures) = ADDRESS_RE.captures(header) {
        captures
            .get(1)
            .map_or_else(String::new, |m| m.as_str().to_string())
    } else {
        header.trim().to_string()
    }
}

/// Body text of one message, split into trimmed lines
#[derive(Debug, Clone, PartialEq)]
pub struct EmailContent {
    pub msg_id: String,
    pub thread_id: String,
    pub date: DateTime<Utc>,
    pub subject: String,
    pub lines: Vec<String>,
}

impl EmailContent {
    /// Collects the lines of every textual part of `message`.
    /// Non-textual parts are skipped with a warning.
    pub fn from_message(message: &Message, line_sep: &str) -> Self {
        let mut lines = Vec::new();
        for part in &message.body_parts {
            match part {
                BodyPart::Text(text) => {
                    lines.extend(text.split(line_sep).map(|line| line.trim().to_string()));
                }
                BodyPart::Binary(data) => {
                    warn!(
                        msg_id = %message.msg_id,
                        bytes = data.len(),
                        "Skipping non-textual body part"
                    );
                }
            }
        }

        Self {
            msg_id: message.msg_id.clone(),
            thread_id: message.thread_id.clone(),
            date: message.date,
            subject: message.subject.clone(),
            lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_email_with_name_and_brackets() {
        assert_eq!(
            extract_email("John Doe <john@example.com>"),
            "john@example.com"
        );
    }

    #[test]
    fn test_extract_email_without_brackets() {
        assert_eq!(extract_email("  plain@email.com "), "plain@email.com");
    }

    #[test]
    fn test_extract_email_complex_name() {
        assert_eq!(
            extract_email("\"Doe, John\" <john.doe@company.co.uk>"),
            "john.doe@company.co.uk"
        );
    }

    #[test]
    fn test_builder_extracts_addresses() {
        let msg = MessageBuilder::new()
            .id("m1")
            .thread_id("t1")
            .from("Alice <alice@example.com>")
            .to("me@example.com")
            .subject("Hi")
            .build();

        assert_eq!(msg.sender_email, "alice@example.com");
        assert_eq!(msg.recipient_email, "me@example.com");
        assert_eq!(msg.thread_id, "t1");
        assert!(msg.body_parts.is_empty());
    }

    #[test]
    fn test_sender_case_is_preserved() {
        let msg = MessageBuilder::new().from("Bob <Bob@Example.com>").build();
        assert_eq!(msg.sender_email, "Bob@Example.com");
    }

    #[test]
    fn test_content_splits_and_trims_lines() {
        let msg = MessageBuilder::new()
            .id("m1")
            .text_part("  first line \n second\n")
            .text_part("third")
            .build();

        let content = EmailContent::from_message(&msg, "\n");
        assert_eq!(content.lines, vec!["first line", "second", "", "third"]);
        assert_eq!(content.msg_id, "m1");
    }

    #[test]
    fn test_content_uses_custom_separator() {
        let msg = MessageBuilder::new().text_part("a;b ; c").build();
        let content = EmailContent::from_message(&msg, ";");
        assert_eq!(content.lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_content_skips_binary_parts() {
        let msg = MessageBuilder::new()
            .text_part("before")
            .binary_part(vec![0xff, 0xfe, 0x00])
            .text_part("after")
            .build();

        let content = EmailContent::from_message(&msg, "\n");
        assert_eq!(content.lines, vec!["before", "after"]);
    }
}
