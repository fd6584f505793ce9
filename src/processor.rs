//! Per-message hooks run by the report pipeline.
//!
//! Content processors see the split body text of each message, message
//! processors see the message itself. Both are handed to
//! [`process_messages`] as ordered slices.

use tracing::{debug, info};

use crate::email::{EmailContent, Message};

/// Hook invoked with the extracted body text of every message
pub trait ContentProcessor {
    fn process(&mut self, content: &EmailContent);
}

/// Hook invoked with every fetched message, after the content processors
pub trait MessageProcessor {
    fn process(&mut self, message: &Message);
}

/// Content processor that does nothing
#[derive(Debug, Default)]
pub struct NoOpContentProcessor;

impl ContentProcessor for NoOpContentProcessor {
    fn process(&mut self, _content: &EmailContent) {}
}

/// Content processor that logs every email it sees
#[derive(Debug, Default)]
pub struct LoggingContentProcessor {
    seen: usize,
}

impl LoggingContentProcessor {
    pub fn seen(&self) -> usize {
        self.seen
    }
}

impl ContentProcessor for LoggingContentProcessor {
    fn process(&mut self, content: &EmailContent) {
        self.seen += 1;
        info!(
            msg_id = %content.msg_id,
            thread_id = %content.thread_id,
            lines = content.lines.len(),
            "Processing email: {}",
            content.subject
        );
    }
}

/// Runs every message through the content processors, then the message processors
pub fn process_messages<'a>(
    messages: impl IntoIterator<Item = &'a Message>,
    line_sep: &str,
    content_processors: &mut [&mut dyn ContentProcessor],
    message_processors: &mut [&mut dyn MessageProcessor],
) -> usize {
    let mut processed = 0;
    for message in messages {
        let content = EmailContent::from_message(message, line_sep);
        debug!("Processing message: {} ({})", content.subject, content.date);

        for p in content_processors.iter_mut() {
            p.process(&content);
        }
        for p in message_processors.iter_mut() {
            p.process(message);
        }
        processed += 1;
    }
    processed
}
