mod auth;
mod cache;
mod config;
mod demo;
mod discovery;
mod email;
mod error;
mod filters;
mod gmail;
mod grouping;
mod logging;
mod processor;
mod report;
mod ui;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use cache::ThreadCache;
use config::{DiscoveryConfig, OutputPaths};
use demo::DemoClient;
use error::SorterError;
use gmail::{GmailClient, RealGmailClient, ThreadQueryFormat};
use grouping::ResultMode;
use ui::console::OutputSinks;
use ui::table::{EmailTable, Justify, TableColumnStyles, TableRenderSettings};

/// Groups a Gmail inbox by sender and reports how many messages saved searches match
#[derive(Parser, Debug)]
#[command(name = "mailsorter", version, about)]
struct Cli {
    /// Gmail account to query; selects the cached OAuth token
    #[arg(long, global = true)]
    account_email: Option<String>,

    /// Print debug logs to stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Print trace logs to stderr and the log file
    #[arg(long, global = true)]
    trace: bool,

    /// Never read or write the email cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Use built-in demo mail instead of a Gmail account
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Group inbox messages by sender
    DiscoverInbox {
        /// Answer from the email cache only
        #[arg(long)]
        offline: bool,

        /// Gmail search selecting the messages to group
        #[arg(long, default_value = config::DEFAULT_QUERY)]
        main_query: String,

        /// FULL or METADATA
        #[arg(long, default_value = "METADATA")]
        fetch_mode: String,

        /// simplified or detailed
        #[arg(long, default_value = "simplified")]
        mode: String,

        /// Warn about FULL messages without a plain text body
        #[arg(long)]
        show_empty_body_errors: bool,

        /// Maximum number of threads to fetch
        #[arg(long, default_value_t = config::DEFAULT_REQUEST_LIMIT)]
        limit: usize,

        /// Base path of the HTML export
        #[arg(long)]
        html_out: Option<PathBuf>,
    },
    /// Count the threads matched by each filter of a JSON filters file
    FilterStats {
        #[arg(long)]
        filters_file: PathBuf,

        /// Base path of the HTML export
        #[arg(long)]
        html_out: Option<PathBuf>,
    },
    /// List the available commands
    Usage,
}

const COMMANDS: &[(&str, &str)] = &[
    ("discover-inbox", "Group inbox messages by sender"),
    ("filter-stats", "Count the threads matched by each filter of a filters file"),
    ("usage", "List the available commands"),
];

#[tokio::main]
async fn main() {
    let started = Instant::now();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Failed after {:.2?}: {e:#}", started.elapsed());
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    info!("Finished in {:.2?}", started.elapsed());
}

async fn run(cli: Cli) -> Result<()> {
    let paths = OutputPaths::from_env()?;
    let mut sinks = OutputSinks::stdout();
    logging::init(cli.debug, cli.trace, &paths.log_dir(), sinks.themed.clone())?;

    if let Command::Usage = cli.command {
        print_usage(&mut sinks)?;
        return Ok(());
    }

    if cli.demo {
        info!("Running against demo mail");
        return run_command(&DemoClient::new(), cli.command, &mut sinks).await;
    }

    let account_email = cli
        .account_email
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| SorterError::config_attr("must not be empty", "account_email"))?;
    let cache = (!cli.no_cache).then(|| ThreadCache::new(paths.email_cache_dir()));

    let offline = matches!(cli.command, Command::DiscoverInbox { offline: true, .. });
    let client = if offline {
        let cache = cache.ok_or_else(|| {
            SorterError::config_attr("cannot be combined with --no-cache", "offline")
        })?;
        RealGmailClient::offline(cache)
    } else {
        let auth = auth::create_authenticator(&account_email)
            .await
            .context("Gmail authentication failed")?;
        RealGmailClient::new(auth, cache)?
    };

    run_command(&client, cli.command, &mut sinks).await
}

async fn run_command<C: GmailClient>(
    client: &C,
    command: Command,
    sinks: &mut OutputSinks,
) -> Result<()> {
    match command {
        Command::DiscoverInbox {
            offline,
            main_query,
            fetch_mode,
            mode,
            show_empty_body_errors,
            limit,
            html_out,
        } => {
            let mode: ResultMode = mode.parse()?;
            let fetch_mode: ThreadQueryFormat = fetch_mode.parse()?;
            if fetch_mode == ThreadQueryFormat::Minimal {
                return Err(SorterError::config_attr("must be FULL or METADATA", "fetch_mode").into());
            }
            let config = DiscoveryConfig {
                query: main_query,
                fetch_mode,
                request_limit: limit,
                offline,
                show_empty_body_errors,
                ..DiscoveryConfig::default()
            };
            let html_out = html_out.unwrap_or_else(config::default_html_output);
            let engine = discovery::discover_inbox(client, &config, mode, sinks, &html_out).await?;
            info!(
                senders = engine.sender_count(),
                messages = engine.message_count(),
                "Inbox discovery done"
            );
        }
        Command::FilterStats {
            filters_file,
            html_out,
        } => {
            let filters = filters::load_filters(&filters_file)?;
            let html_out = html_out.unwrap_or_else(config::default_html_output);
            discovery::create_filter_stats(client, filters, sinks, &html_out).await?;
        }
        Command::Usage => print_usage(sinks)?,
    }
    Ok(())
}

fn print_usage(sinks: &mut OutputSinks) -> Result<()> {
    let styles = TableColumnStyles::new()
        .bind_style("Command", "bold cyan")
        .bind_format("Command", true, Some(Justify::Left), None);
    let settings = TableRenderSettings::new(styles).title("mailsorter");
    let mut table = EmailTable::new(vec!["Command".to_string(), "Description".to_string()], settings);
    table.render(
        COMMANDS
            .iter()
            .map(|(name, description)| vec![name.to_string(), description.to_string()])
            .collect(),
    )?;
    sinks.print(&table, false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_discover_inbox_defaults() {
        let cli = Cli::parse_from(["mailsorter", "--account-email", "me@x.com", "discover-inbox"]);
        assert_eq!(cli.account_email.as_deref(), Some("me@x.com"));
        match cli.command {
            Command::DiscoverInbox {
                offline,
                main_query,
                fetch_mode,
                mode,
                show_empty_body_errors,
                limit,
                html_out,
            } => {
                assert!(!offline);
                assert!(!show_empty_body_errors);
                assert_eq!(main_query, "label:inbox");
                assert_eq!(fetch_mode, "METADATA");
                assert_eq!(mode, "simplified");
                assert_eq!(limit, 1_000_000);
                assert!(html_out.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["mailsorter", "filter-stats", "--filters-file", "f.json", "--demo", "--debug"]);
        assert!(cli.demo);
        assert!(cli.debug);
        assert!(matches!(cli.command, Command::FilterStats { .. }));
    }

    #[test]
    fn test_usage_lists_every_command() {
        let mut sinks = OutputSinks::in_memory(100);
        print_usage(&mut sinks).unwrap();
        let printed = sinks.standard.captured().unwrap();
        for (name, _) in COMMANDS {
            assert!(printed.contains(name));
        }
    }

    #[tokio::test]
    async fn test_unknown_mode_fails_before_querying() {
        let mut mock = gmail::MockGmailClient::new();
        mock.expect_query_threads().never();

        let cli = Cli::parse_from(["mailsorter", "discover-inbox", "--mode", "verbose"]);
        let mut sinks = OutputSinks::in_memory(80);
        let err = run_command(&mock, cli.command, &mut sinks).await.unwrap_err();
        assert!(err.to_string().contains("Unknown result mode"));
    }

    #[tokio::test]
    async fn test_demo_discovery_runs_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("demo.html");
        let cli = Cli::parse_from([
            "mailsorter",
            "--demo",
            "discover-inbox",
            "--html-out",
            out.to_str().unwrap(),
        ]);
        let mut sinks = OutputSinks::in_memory(120);
        run_command(&DemoClient::new(), cli.command, &mut sinks).await.unwrap();

        let printed = sinks.wide.captured().unwrap();
        assert!(printed.contains("notifications@github.com"));
        assert!(out.exists());
    }
}
