//! Groups fetched messages by sender and reduces them into table rows.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use tracing::{trace, warn};

use crate::email::Message;
use crate::error::SorterError;
use crate::processor::MessageProcessor;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How many rows each sender produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultMode {
    /// One row per sender
    #[default]
    Simplified,
    /// One row per message
    Detailed,
}

impl fmt::Display for ResultMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultMode::Simplified => write!(f, "simplified"),
            ResultMode::Detailed => write!(f, "detailed"),
        }
    }
}

impl FromStr for ResultMode {
    type Err = SorterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simplified" => Ok(ResultMode::Simplified),
            "detailed" => Ok(ResultMode::Detailed),
            other => Err(SorterError::config_attr(
                format!("Unknown result mode: {other}"),
                "mode",
            )),
        }
    }
}

/// Messages from one sender, in arrival order
#[derive(Debug, Clone)]
pub struct SenderBucket {
    pub sender: String,
    pub messages: Vec<(String, Message)>,
}

impl SenderBucket {
    fn new(sender: String) -> Self {
        Self {
            sender,
            messages: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }
}

/// Identity of the most recently reduced message of a sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestMessage {
    pub thread_id: String,
    pub msg_id: String,
    pub subject: String,
}

/// Latest message per sender, in sender order
pub type GroupingIndex = Vec<(String, LatestMessage)>;

/// One line per sender: `sender: thread <id>, message <id>, "<subject>"`
pub fn format_grouping_index(index: &GroupingIndex) -> String {
    index
        .iter()
        .map(|(sender, latest)| {
            format!(
                "{sender}: thread {}, message {}, \"{}\"",
                latest.thread_id, latest.msg_id, latest.subject
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Buckets messages by sender email.
///
/// Construct one per report run; buckets only ever grow.
#[derive(Debug, Default)]
pub struct GroupingEngine {
    buckets: Vec<SenderBucket>,
    bucket_by_sender: HashMap<String, usize>,
    /// First sender seen for each thread
    thread_senders: HashMap<String, String>,
}

impl GroupingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn message_count(&self) -> usize {
        self.buckets.iter().map(SenderBucket::count).sum()
    }

    /// Adds a message to its sender's bucket
    pub fn add(&mut self, message: &Message) {
        trace!(
            sender = %message.sender_email,
            recipient = %message.recipient_email,
            subject = %message.subject,
            "Grouping message"
        );

        match self.thread_senders.get(&message.thread_id) {
            Some(first) if first != &message.sender_email => {
                warn!(
                    thread_id = %message.thread_id,
                    first_sender = %first,
                    sender = %message.sender_email,
                    "Thread has messages from more than one sender, possibly forwarded"
                );
            }
            Some(_) => {}
            None => {
                self.thread_senders
                    .insert(message.thread_id.clone(), message.sender_email.clone());
            }
        }

        let idx = match self.bucket_by_sender.get(&message.sender_email) {
            Some(&idx) => idx,
            None => {
                self.buckets
                    .push(SenderBucket::new(message.sender_email.clone()));
                let idx = self.buckets.len() - 1;
                self.bucket_by_sender
                    .insert(message.sender_email.clone(), idx);
                idx
            }
        };
        self.buckets[idx]
            .messages
            .push((message.thread_id.clone(), message.clone()));
    }

    /// Reduces the buckets into rows for `mode`.
    ///
    /// Rows follow first-seen sender order, then arrival order. Each call
    /// starts from an empty reducer, so repeated calls return the same rows.
    pub fn convert_to_table_rows(&self, mode: ResultMode) -> (GroupingIndex, Vec<Vec<String>>) {
        let mut reducer = RowReducer::new(mode);
        let mut index: GroupingIndex = Vec::with_capacity(self.buckets.len());
        let mut rows = Vec::new();

        for bucket in &self.buckets {
            let count = bucket.count();
            for (thread_id, message) in &bucket.messages {
                let latest = LatestMessage {
                    thread_id: thread_id.clone(),
                    msg_id: message.msg_id.clone(),
                    subject: message.subject.clone(),
                };
                match index.last_mut() {
                    Some((sender, entry)) if sender == &bucket.sender => *entry = latest,
                    _ => index.push((bucket.sender.clone(), latest)),
                }

                if let Some(row) = reducer.reduce(&bucket.sender, count, thread_id, message) {
                    rows.push(row);
                }
            }
        }

        (index, rows)
    }
}

impl MessageProcessor for GroupingEngine {
    fn process(&mut self, message: &Message) {
        self.add(message);
    }
}

/// Row strategy for one conversion pass
struct RowReducer {
    mode: ResultMode,
    visited: HashSet<String>,
}

impl RowReducer {
    fn new(mode: ResultMode) -> Self {
        Self {
            mode,
            visited: HashSet::new(),
        }
    }

    fn reduce(
        &mut self,
        sender: &str,
        count: usize,
        thread_id: &str,
        message: &Message,
    ) -> Option<Vec<String>> {
        match self.mode {
            ResultMode::Simplified => self
                .visited
                .insert(sender.to_string())
                .then(|| vec![sender.to_string(), count.to_string()]),
            ResultMode::Detailed => Some(vec![
                sender.to_string(),
                count.to_string(),
                message.recipient_email.clone(),
                message.date.format(DATE_FORMAT).to_string(),
                message.subject.clone(),
                thread_id.to_string(),
                message.msg_id.clone(),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::MessageBuilder;
    use crate::logging::capture::CapturedEvents;
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    fn msg(id: &str, thread: &str, from: &str) -> Message {
        MessageBuilder::new()
            .id(id)
            .thread_id(thread)
            .from(from)
            .to("me@x.com")
            .subject(format!("Subject {id}"))
            .build()
    }

    fn engine_with(messages: &[Message]) -> GroupingEngine {
        let mut engine = GroupingEngine::new();
        for m in messages {
            engine.process(m);
        }
        engine
    }

    #[test]
    fn test_simplified_rows_in_first_seen_order() {
        let engine = engine_with(&[
            msg("1", "t1", "a@x.com"),
            msg("2", "t2", "b@x.com"),
            msg("3", "t3", "a@x.com"),
        ]);

        let (_, rows) = engine.convert_to_table_rows(ResultMode::Simplified);
        assert_eq!(
            rows,
            vec![
                vec!["a@x.com".to_string(), "2".to_string()],
                vec!["b@x.com".to_string(), "1".to_string()],
            ]
        );
    }

    #[test]
    fn test_detailed_rows_carry_full_bucket_count() {
        let engine = engine_with(&[
            msg("1", "t1", "a@x.com"),
            msg("2", "t2", "b@x.com"),
            msg("3", "t3", "a@x.com"),
        ]);

        let (_, rows) = engine.convert_to_table_rows(ResultMode::Detailed);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 7));

        // a@x.com's rows come first and both carry the final count
        assert_eq!(rows[0][0], "a@x.com");
        assert_eq!(rows[0][1], "2");
        assert_eq!(rows[0][6], "1");
        assert_eq!(rows[1][0], "a@x.com");
        assert_eq!(rows[1][1], "2");
        assert_eq!(rows[1][5], "t3");
        assert_eq!(rows[2][0], "b@x.com");
        assert_eq!(rows[2][1], "1");
        assert_eq!(rows[2][2], "me@x.com");
    }

    #[test]
    fn test_grouping_index_keeps_latest_message() {
        let engine = engine_with(&[
            msg("1", "t1", "a@x.com"),
            msg("2", "t2", "b@x.com"),
            msg("3", "t3", "a@x.com"),
        ]);

        let (index, _) = engine.convert_to_table_rows(ResultMode::Simplified);
        assert_eq!(index.len(), 2);
        assert_eq!(index[0].0, "a@x.com");
        assert_eq!(
            index[0].1,
            LatestMessage {
                thread_id: "t3".to_string(),
                msg_id: "3".to_string(),
                subject: "Subject 3".to_string(),
            }
        );
        assert_eq!(index[1].1.msg_id, "2");
    }

    #[test]
    fn test_repeated_conversion_returns_same_rows() {
        let engine = engine_with(&[msg("1", "t1", "a@x.com"), msg("2", "t2", "a@x.com")]);

        for mode in [ResultMode::Simplified, ResultMode::Detailed] {
            let (_, first) = engine.convert_to_table_rows(mode);
            let (_, second) = engine.convert_to_table_rows(mode);
            assert_eq!(first, second);
            assert!(!first.is_empty());
        }
    }

    #[test]
    fn test_senders_are_case_sensitive() {
        let engine = engine_with(&[msg("1", "t1", "Bob@x.com"), msg("2", "t2", "bob@x.com")]);
        assert_eq!(engine.sender_count(), 2);
    }

    #[test]
    fn test_multi_sender_thread_does_not_change_grouping() {
        let events = CapturedEvents::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());
        let engine = tracing::subscriber::with_default(subscriber, || {
            engine_with(&[msg("1", "t1", "a@x.com"), msg("2", "t1", "b@x.com")])
        });

        let warnings: Vec<String> = events
            .events()
            .into_iter()
            .filter(|(level, _)| *level == Level::WARN)
            .map(|(_, line)| line)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("more than one sender"));
        assert!(warnings[0].contains("first_sender=a@x.com"));
        assert!(warnings[0].contains("sender=b@x.com"));

        assert_eq!(engine.sender_count(), 2);
        assert_eq!(engine.message_count(), 2);
        let (_, rows) = engine.convert_to_table_rows(ResultMode::Simplified);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_row_counts_match_mode_invariants() {
        let senders = ["a", "b", "c", "a", "b", "a", "d"];
        let messages: Vec<Message> = senders
            .iter()
            .enumerate()
            .map(|(i, s)| msg(&i.to_string(), &format!("t{i}"), &format!("{s}@x.com")))
            .collect();
        let engine = engine_with(&messages);

        let (_, simplified) = engine.convert_to_table_rows(ResultMode::Simplified);
        let (_, detailed) = engine.convert_to_table_rows(ResultMode::Detailed);
        assert_eq!(simplified.len(), 4);
        assert_eq!(detailed.len(), messages.len());
    }

    #[test]
    fn test_single_sender_threads_do_not_warn() {
        let events = CapturedEvents::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());
        tracing::subscriber::with_default(subscriber, || {
            engine_with(&[msg("1", "t1", "a@x.com"), msg("2", "t1", "a@x.com")]);
        });
        assert!(events.events().iter().all(|(level, _)| *level != Level::WARN));
    }

    #[test]
    fn test_format_grouping_index_one_line_per_sender() {
        let engine = engine_with(&[
            msg("1", "t1", "a@x.com"),
            msg("2", "t2", "b@x.com"),
            msg("3", "t3", "a@x.com"),
        ]);
        let (index, _) = engine.convert_to_table_rows(ResultMode::Simplified);

        assert_eq!(
            format_grouping_index(&index),
            "a@x.com: thread t3, message 3, \"Subject 3\"\nb@x.com: thread t2, message 2, \"Subject 2\""
        );
        assert_eq!(format_grouping_index(&Vec::new()), "");
    }

    #[test]
    fn test_empty_engine_has_no_rows() {
        let engine = GroupingEngine::new();
        let (index, rows) = engine.convert_to_table_rows(ResultMode::Detailed);
        assert!(index.is_empty());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_result_mode_parsing() {
        assert_eq!("Detailed".parse::<ResultMode>().unwrap(), ResultMode::Detailed);
        assert_eq!("simplified".parse::<ResultMode>().unwrap(), ResultMode::Simplified);
        assert!(matches!(
            "verbose".parse::<ResultMode>(),
            Err(SorterError::Config { .. })
        ));
    }
}
