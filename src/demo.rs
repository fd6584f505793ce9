use chrono::{Duration, Utc};
use tracing::debug;

use crate::email::{Message, MessageBuilder};
use crate::error::Result;
use crate::gmail::{GmailClient, Thread, ThreadQuery, ThreadQueryResult};

const DEMO_ACCOUNT: &str = "Demo User <demo@example.com>";

/// Creates a set of realistic demo threads for trying the reports without an account
pub fn create_demo_threads() -> Vec<Thread> {
    let now = Utc::now();
    let yesterday = now - Duration::days(1);
    let two_days_ago = now - Duration::days(2);
    let last_week = now - Duration::days(7);

    let message = |id: &str, thread: &str, from: &str, subject: &str| {
        MessageBuilder::new()
            .id(id)
            .thread_id(thread)
            .from(from)
            .to(DEMO_ACCOUNT)
            .subject(subject)
    };

    let messages: Vec<Message> = vec![
        // GitHub notifications
        message("demo_1", "t_gh_1", "GitHub <notifications@github.com>", "[rust-lang/rust] Fix ICE in pattern matching (PR #12345)")
            .date(now - Duration::hours(2))
            .text_part("@bors merged this pull request.\nAll CI checks passed.")
            .build(),
        message("demo_2", "t_gh_2", "GitHub <notifications@github.com>", "[tokio-rs/tokio] New issue: Memory leak in async runtime")
            .date(now - Duration::hours(5))
            .text_part("A new issue has been opened by @contributor.")
            .build(),
        message("demo_3", "t_gh_3", "GitHub <notifications@github.com>", "Your migration jobs are now available")
            .date(yesterday)
            .text_part("Migration jobs are now available for your organization.")
            .build(),
        // Linear updates
        message("demo_4", "t_linear_1", "Linear <notify@linear.app>", "ENG-1234: Implement user authentication")
            .date(now - Duration::hours(1))
            .text_part("Status changed to In Review.")
            .build(),
        message("demo_5", "t_linear_2", "Linear <notify@linear.app>", "Weekly project digest - Sprint 42")
            .date(two_days_ago)
            .text_part("12 issues completed, 3 in progress, 5 remaining.")
            .build(),
        // Stripe receipts, one with a PDF attachment
        message("demo_6", "t_stripe_1", "Stripe <receipts@stripe.com>", "Your receipt from Acme Corp")
            .date(two_days_ago)
            .text_part("Amount: $49.00\nThank you for your payment.")
            .binary_part(b"%PDF-1.4".to_vec())
            .build(),
        message("demo_7", "t_stripe_2", "Stripe <receipts@stripe.com>", "Your receipt from Cloud Services Inc")
            .date(last_week)
            .text_part("Amount: $12.00\nPayment successful.")
            .build(),
        // Newsletter
        message("demo_8", "t_twir", "This Week in Rust <noreply@this-week-in-rust.org>", "This Week in Rust 542")
            .date(two_days_ago + Duration::hours(4))
            .text_part("Hello and welcome to another issue of This Week in Rust!")
            .build(),
        // AWS notification
        message("demo_9", "t_aws", "Amazon Web Services <no-reply@aws.amazon.com>", "AWS Billing Alert: Your costs exceeded the threshold")
            .date(yesterday + Duration::hours(6))
            .text_part("Current charges: $127.43")
            .build(),
        // Forwarded thread: two senders in one conversation
        message("demo_10", "t_q4", "Charlie Davis <charlie@company.com>", "Q4 Planning")
            .date(yesterday + Duration::hours(3))
            .text_part("Great overview! Items 2 and 3 first.")
            .build(),
        message("demo_11", "t_q4", "Bob Smith <bob@company.com>", "Fwd: Q4 Planning")
            .date(now - Duration::hours(6))
            .text_part("Forwarding Charlie's notes.")
            .build(),
    ];

    let mut threads: Vec<Thread> = Vec::new();
    for message in messages {
        match threads.iter_mut().find(|t| t.id == message.thread_id) {
            Some(thread) => thread.messages.push(message),
            None => threads.push(Thread {
                id: message.thread_id.clone(),
                messages: vec![message],
            }),
        }
    }
    threads
}

/// Whether `message` satisfies every term of a Gmail-style search
fn matches_query(message: &Message, query: &str) -> bool {
    query.split_whitespace().all(|term| {
        let term = term.to_lowercase();
        match term.split_once(':') {
            Some(("label", _)) => true,
            Some(("from", who)) => message.sender_email.to_lowercase().contains(who),
            Some(("to", who)) => message.recipient_email.to_lowercase().contains(who),
            Some(("subject", text)) => message.subject.to_lowercase().contains(text),
            _ => message.subject.to_lowercase().contains(&term),
        }
    })
}

/// Serves canned threads instead of talking to Gmail
pub struct DemoClient {
    threads: Vec<Thread>,
}

impl DemoClient {
    pub fn new() -> Self {
        Self {
            threads: create_demo_threads(),
        }
    }
}

impl Default for DemoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GmailClient for DemoClient {
    async fn query_threads(&self, query: &ThreadQuery) -> Result<ThreadQueryResult> {
        let threads: Vec<Thread> = self
            .threads
            .iter()
            .filter(|t| t.messages.iter().any(|m| matches_query(m, &query.query)))
            .take(query.limit)
            .map(|t| Thread {
                id: t.id.clone(),
                messages: if query.load_messages {
                    t.messages.clone()
                } else {
                    Vec::new()
                },
            })
            .collect();
        debug!(query = %query.query, threads = threads.len(), "Demo query");
        Ok(ThreadQueryResult::new(threads))
    }
}
