use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use google_gmail1::Gmail;
use google_gmail1::api::{Message as ApiMessage, MessagePart, Scope};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use yup_oauth2::authenticator::Authenticator;

use crate::cache::ThreadCache;
use crate::email::{BodyPart, Message, MessageBuilder};
use crate::error::{Result, SorterError};

/// Largest page size the threads.list endpoint accepts
const MAX_PAGE_SIZE: usize = 500;

/// How much of each message the API returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadQueryFormat {
    Full,
    Metadata,
    Minimal,
}

impl ThreadQueryFormat {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            ThreadQueryFormat::Full => "full",
            ThreadQueryFormat::Metadata => "metadata",
            ThreadQueryFormat::Minimal => "minimal",
        }
    }
}

impl fmt::Display for ThreadQueryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_api_str().to_uppercase())
    }
}

impl FromStr for ThreadQueryFormat {
    type Err = SorterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FULL" => Ok(ThreadQueryFormat::Full),
            "METADATA" => Ok(ThreadQueryFormat::Metadata),
            "MINIMAL" => Ok(ThreadQueryFormat::Minimal),
            other => Err(SorterError::config_attr(
                format!("Unknown fetch mode: {other}"),
                "fetch_mode",
            )),
        }
    }
}

/// Parameters of one thread query
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadQuery {
    pub query: String,
    pub limit: usize,
    pub format: ThreadQueryFormat,
    /// Answer from the local cache only
    pub offline: bool,
    pub show_empty_body_errors: bool,
    /// When false only thread ids are listed, which is enough for counting
    pub load_messages: bool,
    pub expect_one_message_per_thread: bool,
}

impl ThreadQuery {
    pub fn new(query: impl Into<String>, limit: usize, format: ThreadQueryFormat) -> Self {
        Self {
            query: query.into(),
            limit,
            format,
            offline: false,
            show_empty_body_errors: false,
            load_messages: true,
            expect_one_message_per_thread: true,
        }
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn load_messages(mut self, load_messages: bool) -> Self {
        self.load_messages = load_messages;
        self
    }

    pub fn show_empty_body_errors(mut self, show: bool) -> Self {
        self.show_empty_body_errors = show;
        self
    }
}

/// A conversation and the messages fetched for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub messages: Vec<Message>,
}

/// Counters reported alongside a query result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    pub threads: usize,
    pub messages: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadQueryResult {
    pub threads: Vec<Thread>,
    pub stats: QueryStats,
}

impl ThreadQueryResult {
    pub fn new(threads: Vec<Thread>) -> Self {
        let stats = QueryStats {
            threads: threads.len(),
            messages: threads.iter().map(|t| t.messages.len()).sum(),
        };
        Self { threads, stats }
    }

    /// All messages of all threads, in thread order
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.threads.iter().flat_map(|t| t.messages.iter())
    }
}

/// Trait for Gmail queries - allows mocking in tests
#[cfg_attr(test, mockall::automock)]
pub trait GmailClient: Send + Sync {
    /// Runs a thread search and returns the matched threads
    fn query_threads(
        &self,
        query: &ThreadQuery,
    ) -> impl std::future::Future<Output = Result<ThreadQueryResult>> + Send;
}

type Hub = Gmail<HttpsConnector<HttpConnector>>;

/// Gmail API client with an optional on-disk cache
pub struct RealGmailClient {
    hub: Option<Hub>,
    cache: Option<ThreadCache>,
}

impl RealGmailClient {
    /// Creates a Gmail client with the given authenticator
    pub fn new(
        auth: Authenticator<HttpsConnector<HttpConnector>>,
        cache: Option<ThreadCache>,
    ) -> Result<Self> {
        let client = google_gmail1::hyper_util::client::legacy::Client::builder(
            google_gmail1::hyper_util::rt::TokioExecutor::new(),
        )
        .build(
            google_gmail1::hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| SorterError::query(format!("Failed to load native TLS roots: {e}")))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

        Ok(Self {
            hub: Some(Gmail::new(client, auth)),
            cache,
        })
    }

    /// Creates a client that can only answer from the cache
    pub fn offline(cache: ThreadCache) -> Self {
        Self {
            hub: None,
            cache: Some(cache),
        }
    }

    async fn fetch(&self, hub: &Hub, query: &ThreadQuery) -> Result<ThreadQueryResult> {
        let thread_ids = self.list_thread_ids(hub, query).await?;
        debug!(query = %query.query, threads = thread_ids.len(), "Listed threads");

        if !query.load_messages {
            let threads = thread_ids
                .into_iter()
                .map(|id| Thread {
                    id,
                    messages: Vec::new(),
                })
                .collect();
            return Ok(ThreadQueryResult::new(threads));
        }

        let mut threads = Vec::with_capacity(thread_ids.len());
        for id in thread_ids {
            let mut request = hub
                .users()
                .threads_get("me", &id)
                .format(query.format.as_api_str())
                .add_scope(Scope::Readonly);
            if query.format == ThreadQueryFormat::Metadata {
                for header in ["From", "To", "Subject", "Date"] {
                    request = request.add_metadata_headers(header);
                }
            }
            let (_, api_thread) = request
                .doit()
                .await
                .map_err(|e| SorterError::query(format!("Failed to get thread {id}: {e}")))?;

            let messages: Vec<Message> = api_thread
                .messages
                .unwrap_or_default()
                .iter()
                .filter_map(|m| parse_message(m, &id))
                .collect();

            if query.expect_one_message_per_thread && messages.len() > 1 {
                debug!(thread_id = %id, messages = messages.len(), "Thread has more than one message");
            }
            if query.show_empty_body_errors && query.format == ThreadQueryFormat::Full {
                for m in messages.iter().filter(|m| m.body_parts.is_empty()) {
                    warn!(msg_id = %m.msg_id, subject = %m.subject, "Message has no plain text body");
                }
            }

            threads.push(Thread { id, messages });
        }

        Ok(ThreadQueryResult::new(threads))
    }

    async fn list_thread_ids(&self, hub: &Hub, query: &ThreadQuery) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        while ids.len() < query.limit {
            let page_size = (query.limit - ids.len()).min(MAX_PAGE_SIZE);
            let mut request = hub
                .users()
                .threads_list("me")
                .q(&query.query)
                .max_results(page_size as u32)
                .add_scope(Scope::Readonly);

            if let Some(token) = &page_token {
                request = request.page_token(token);
            }

            let (_, response) = request
                .doit()
                .await
                .map_err(|e| SorterError::query(format!("Failed to list threads: {e}")))?;

            ids.extend(
                response
                    .threads
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|t| t.id),
            );

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        ids.truncate(query.limit);
        Ok(ids)
    }
}

impl GmailClient for RealGmailClient {
    async fn query_threads(&self, query: &ThreadQuery) -> Result<ThreadQueryResult> {
        if query.offline {
            let cache = self.cache.as_ref().ok_or_else(|| {
                SorterError::query("Offline mode requested but the email cache is disabled")
            })?;
            return cache.load(query)?.ok_or_else(|| {
                SorterError::query(format!(
                    "No cached results for query '{}' ({}), run once without --offline",
                    query.query, query.format
                ))
            });
        }

        let hub = self
            .hub
            .as_ref()
            .ok_or_else(|| SorterError::query("Gmail client is not authenticated"))?;
        let result = self.fetch(hub, query).await?;

        if let Some(cache) = &self.cache {
            // Cache write failures are only logged
            if let Err(e) = cache.store(query, &result) {
                warn!("Failed to cache query result: {e}");
            }
        }

        Ok(result)
    }
}

/// Parses a Gmail message into our Message struct
fn parse_message(msg: &ApiMessage, thread_id: &str) -> Option<Message> {
    let id = msg.id.clone()?;
    let payload = msg.payload.as_ref();

    let mut builder = MessageBuilder::new()
        .id(id)
        .thread_id(msg.thread_id.clone().unwrap_or_else(|| thread_id.to_string()));

    let mut date_str = String::new();
    if let Some(headers) = payload.and_then(|p| p.headers.as_ref()) {
        for header in headers {
            if let (Some(name), Some(value)) = (&header.name, &header.value) {
                match name.to_lowercase().as_str() {
                    "from" => builder = builder.from(value.clone()),
                    "to" => builder = builder.to(value.clone()),
                    "subject" => builder = builder.subject(value.clone()),
                    "date" => date_str = value.clone(),
                    _ => {}
                }
            }
        }
    }

    let date = msg
        .internal_date
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .or_else(|| parse_email_date(&date_str))
        .unwrap_or_else(Utc::now);
    builder = builder.date(date);

    if let Some(part) = payload {
        for body in plain_text_parts(part) {
            builder = match body {
                BodyPart::Text(text) => builder.text_part(text),
                BodyPart::Binary(data) => builder.binary_part(data),
            };
        }
    }

    Some(builder.build())
}

/// Collects the decoded bodies of every text/plain part, depth first
fn plain_text_parts(part: &MessagePart) -> Vec<BodyPart> {
    let mut bodies = Vec::new();
    let is_plain = part
        .mime_type
        .as_deref()
        .is_some_and(|m| m.eq_ignore_ascii_case("text/plain"));

    if is_plain
        && let Some(data) = part.body.as_ref().and_then(|b| b.data.clone())
    {
        bodies.push(match String::from_utf8(data) {
            Ok(text) => BodyPart::Text(text),
            Err(e) => BodyPart::Binary(e.into_bytes()),
        });
    }

    for child in part.parts.iter().flatten() {
        bodies.extend(plain_text_parts(child));
    }
    bodies
}

/// Parses an email date string into a DateTime
fn parse_email_date(date_str: &str) -> Option<DateTime<Utc>> {
    // Try RFC2822 format first (most common for email)
    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%a, %d %b %Y %H:%M:%S %Z",
    ];

    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(date_str, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    None
}
