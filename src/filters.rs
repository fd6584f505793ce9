//! Named Gmail searches and the match counts they produce.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, SorterError};
use crate::gmail::QueryStats;

const GMAIL_SEARCH_URL: &str = "https://mail.google.com/mail/u/0/#search/";

/// Expression used in filter files for entries that are not written yet
const PLACEHOLDER_EXPRESSION: &str = "TODO";

/// A named Gmail search expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmailFilter {
    pub description: String,
    pub filter_expression: String,
    pub gmail_link: String,
}

impl GmailFilter {
    pub fn new(description: impl Into<String>, filter_expression: impl Into<String>) -> Self {
        let filter_expression = filter_expression.into();
        let gmail_link = format!(
            "{GMAIL_SEARCH_URL}{}",
            urlencoding::encode(&filter_expression)
        );
        Self {
            description: description.into(),
            filter_expression,
            gmail_link,
        }
    }
}

#[derive(Deserialize)]
struct FilterEntry {
    description: String,
    #[serde(rename = "filter-expression")]
    filter_expression: String,
}

/// Parses a JSON filter list, dropping placeholder entries
pub fn parse_filters(json: &str) -> serde_json::Result<Vec<GmailFilter>> {
    let entries: Vec<FilterEntry> = serde_json::from_str(json)?;
    Ok(entries
        .into_iter()
        .filter(|e| e.filter_expression != PLACEHOLDER_EXPRESSION)
        .map(|e| GmailFilter::new(e.description, e.filter_expression))
        .collect())
}

/// Loads the filters file at `path`
pub fn load_filters(path: &Path) -> Result<Vec<GmailFilter>> {
    info!("Processing filters file: {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| SorterError::FilterFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let filters = parse_filters(&content).map_err(|e| SorterError::FilterFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    debug!("Parsed filters: {:?}", filters);
    Ok(filters)
}

/// Collects one match count per filter
#[derive(Debug, Default)]
pub struct FilterStatsEngine {
    results: Vec<(GmailFilter, usize)>,
}

impl FilterStatsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, filter: GmailFilter, stats: &QueryStats) {
        debug!(filter = %filter.description, matches = stats.threads, "Recorded filter result");
        self.results.push((filter, stats.threads));
    }

    /// One `[description, count, link]` row per filter, in the order they were added
    pub fn convert_to_table_rows(&self) -> Vec<Vec<String>> {
        self.results
            .iter()
            .map(|(filter, count)| {
                vec![
                    filter.description.clone(),
                    count.to_string(),
                    filter.gmail_link.clone(),
                ]
            })
            .collect()
    }
}
