//! The two report actions: inbox discovery and filter statistics.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::config::{DEFAULT_REQUEST_LIMIT, DiscoveryConfig};
use crate::error::Result;
use crate::filters::{FilterStatsEngine, GmailFilter};
use crate::gmail::{GmailClient, ThreadQuery, ThreadQueryFormat};
use crate::grouping::{GroupingEngine, ResultMode, format_grouping_index};
use crate::processor::{
    ContentProcessor, LoggingContentProcessor, NoOpContentProcessor, process_messages,
};
use crate::report::ReportKind;
use crate::ui::console::{OutputSinks, TextStyle};
use crate::ui::table::{EmailTable, TableRenderSettings};

/// Fetches the inbox, groups it by sender and prints the grouping report
pub async fn discover_inbox<C: GmailClient>(
    client: &C,
    config: &DiscoveryConfig,
    mode: ResultMode,
    sinks: &mut OutputSinks,
    html_out: &Path,
) -> Result<GroupingEngine> {
    let query = ThreadQuery::new(&config.query, config.request_limit, config.fetch_mode)
        .offline(config.offline)
        .show_empty_body_errors(config.show_empty_body_errors);
    let started = Instant::now();
    let result = client.query_threads(&query).await?;
    info!("Fetched email threads in {} seconds", started.elapsed().as_secs());
    debug!(
        query = %config.query,
        threads = result.stats.threads,
        messages = result.stats.messages,
        "Fetched inbox"
    );

    // Bodies are only present in FULL fetches
    let mut noop = NoOpContentProcessor;
    let mut logging = LoggingContentProcessor::default();
    let content: &mut dyn ContentProcessor = match config.fetch_mode {
        ThreadQueryFormat::Full => &mut logging,
        _ => &mut noop,
    };

    let mut engine = GroupingEngine::new();
    let processed = process_messages(
        result.messages(),
        &config.content_line_sep,
        &mut [content],
        &mut [&mut engine],
    );
    debug!(processed, senders = engine.sender_count(), "Grouped messages");

    let (index, rows) = engine.convert_to_table_rows(mode);
    if !index.is_empty() {
        sinks.print_themed(&format_grouping_index(&index), TextStyle::Info, true)?;
    }

    print_result_table(rows, ReportKind::Grouping(mode), sinks, html_out)?;
    Ok(engine)
}

/// Counts the threads each filter matches, one query at a time, and prints the report
pub async fn create_filter_stats<C: GmailClient>(
    client: &C,
    filters: Vec<GmailFilter>,
    sinks: &mut OutputSinks,
    html_out: &Path,
) -> Result<FilterStatsEngine> {
    let mut engine = FilterStatsEngine::new();
    for filter in filters {
        let query = ThreadQuery::new(
            &filter.filter_expression,
            DEFAULT_REQUEST_LIMIT,
            ThreadQueryFormat::Minimal,
        )
        .load_messages(false);
        let result = client.query_threads(&query).await?;
        info!(
            filter = %filter.description,
            matches = result.stats.threads,
            "Counted filter matches"
        );
        engine.add_result(filter, &result.stats);
    }

    let rows = engine.convert_to_table_rows();
    print_result_table(rows, ReportKind::FilterStats, sinks, html_out)?;
    Ok(engine)
}

/// Renders `rows` as a `kind` report, prints it and exports the recorded output
pub fn print_result_table(
    rows: Vec<Vec<String>>,
    kind: ReportKind,
    sinks: &mut OutputSinks,
    html_out: &Path,
) -> Result<Vec<PathBuf>> {
    let settings = TableRenderSettings::new(kind.column_styles())
        .wide_print(true)
        .show_lines(kind.show_lines())
        .sort_by(kind.sort_column());
    let mut table = EmailTable::new(kind.columns(), settings);
    table.render(rows)?;

    sinks.record_console()?;
    sinks.print(&table, table.settings().wide_print)?;

    let files = sinks.export_to_html(html_out)?;
    let listed: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
    sinks.info(&format!("Saved HTML output to: {}", listed.join(", ")))?;
    Ok(files)
}
