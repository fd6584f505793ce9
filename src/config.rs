use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, SorterError};
use crate::gmail::ThreadQueryFormat;

const APP_NAME: &str = "mailsorter";
const CLIENT_SECRET_FILE: &str = "client_secret.json";
const TOKENS_DIR: &str = "tokens";
const EMAIL_CACHE_DIR: &str = "email_cache";
const LOGS_DIR: &str = "logs";
const WORKING_DIR_OUTPUT: &str = "mailsorter-out";

/// Selects where caches and logs are written
pub const OUTPUT_ROOT_STRATEGY_ENV: &str = "MAILSORTER_OUTPUT_ROOT_STRATEGY";

pub const DEFAULT_QUERY: &str = "label:inbox";
pub const DEFAULT_REQUEST_LIMIT: usize = 1_000_000;
pub const DEFAULT_LINE_SEP: &str = "\n";

/// Returns the configuration directory path
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .ok_or_else(|| SorterError::config("Failed to determine config directory"))
}

/// OAuth client secret downloaded from the Google Cloud Console
pub fn client_secret_path() -> Result<PathBuf> {
    config_dir().map(|p| p.join(CLIENT_SECRET_FILE))
}

/// Token cache of one account
pub fn token_path(account_email: &str) -> Result<PathBuf> {
    if account_email.trim().is_empty() {
        return Err(SorterError::config_attr("must not be empty", "account_email"));
    }
    config_dir().map(|p| p.join(TOKENS_DIR).join(format!("{account_email}.json")))
}

/// Ensures a directory exists
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            SorterError::config(format!("Failed to create directory {}: {e}", dir.display()))
        })?;
    }
    Ok(())
}

/// Where caches and logs go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputRootStrategy {
    /// The user data directory
    #[default]
    ConfigDir,
    /// `./mailsorter-out`
    WorkingDir,
}

impl FromStr for OutputRootStrategy {
    type Err = SorterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "config_dir" => Ok(OutputRootStrategy::ConfigDir),
            "working_dir" => Ok(OutputRootStrategy::WorkingDir),
            other => Err(SorterError::config_attr(
                format!("Unknown output root strategy: {other}"),
                OUTPUT_ROOT_STRATEGY_ENV,
            )),
        }
    }
}

impl OutputRootStrategy {
    /// Reads the strategy from the environment, defaulting to `config_dir`
    pub fn from_env() -> Result<Self> {
        match env::var(OUTPUT_ROOT_STRATEGY_ENV) {
            Ok(value) => value.parse(),
            Err(_) => Ok(OutputRootStrategy::default()),
        }
    }

    pub fn root(&self) -> Result<PathBuf> {
        match self {
            OutputRootStrategy::ConfigDir => dirs::data_dir()
                .map(|p| p.join(APP_NAME))
                .ok_or_else(|| SorterError::config("Failed to determine data directory")),
            OutputRootStrategy::WorkingDir => Ok(PathBuf::from(WORKING_DIR_OUTPUT)),
        }
    }
}

/// Output locations derived from the output root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub root: PathBuf,
}

impl OutputPaths {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            root: OutputRootStrategy::from_env()?.root()?,
        })
    }

    pub fn email_cache_dir(&self) -> PathBuf {
        self.root.join(EMAIL_CACHE_DIR)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }
}

/// Scratch base path of the HTML export
pub fn default_html_output() -> PathBuf {
    env::temp_dir().join("mailsorter_table_output.html")
}

/// Settings of one inbox discovery run
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    pub query: String,
    pub fetch_mode: ThreadQueryFormat,
    pub request_limit: usize,
    pub offline: bool,
    /// Warn about FULL messages without a plain text body
    pub show_empty_body_errors: bool,
    pub content_line_sep: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            query: DEFAULT_QUERY.to_string(),
            fetch_mode: ThreadQueryFormat::Metadata,
            request_limit: DEFAULT_REQUEST_LIMIT,
            offline: false,
            show_empty_body_errors: false,
            content_line_sep: DEFAULT_LINE_SEP.to_string(),
        }
    }
}
