use std::fmt::{self, Write as _};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config;
use crate::error::{Result, SorterError};
use crate::ui::console::{SharedSink, THEMED_TARGET, TextStyle, themed_buffer};

const LOG_FILE: &str = "mailsorter.log";

/// Level printed to stderr
fn console_level(debug: bool, trace: bool) -> LevelFilter {
    if trace {
        LevelFilter::TRACE
    } else if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    }
}

/// Level written to the log file
fn file_level(trace: bool) -> LevelFilter {
    if trace { LevelFilter::TRACE } else { LevelFilter::DEBUG }
}

/// Collects an event's message and its fields as `message k=v ...`
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl MessageVisitor {
    fn line(self) -> String {
        self.message + &self.fields
    }
}

/// Mirrors the crate's INFO events onto the themed console
pub struct ThemedLayer {
    console: SharedSink,
}

impl ThemedLayer {
    pub fn new(console: SharedSink) -> Self {
        Self { console }
    }
}

impl<S: Subscriber> Layer<S> for ThemedLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() != Level::INFO
            || meta.target() == THEMED_TARGET
            || !meta.target().starts_with(env!("CARGO_CRATE_NAME"))
        {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        // Skipped when the console is busy on this thread
        if let Ok(mut console) = self.console.try_lock() {
            let _ = console.write(themed_buffer(&visitor.line(), TextStyle::Info));
        }
    }
}

/// Installs the global subscriber: stderr, `<log_dir>/mailsorter.log` and the themed console
pub fn init(debug: bool, trace: bool, log_dir: &Path, themed: SharedSink) -> Result<()> {
    config::ensure_dir(log_dir)?;
    let log_path = log_dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| SorterError::config(format!("Failed to open log file {}: {e}", log_path.display())))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_level(debug, trace)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_filter(file_level(trace)),
        )
        .with(ThemedLayer::new(themed).with_filter(LevelFilter::INFO))
        .try_init()
        .map_err(|e| SorterError::config(format!("Failed to install logger: {e}")))
}

/// Layer recording events so tests can assert on what was logged
#[cfg(test)]
pub(crate) mod capture {
    use std::sync::{Arc, Mutex};

    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::Context;

    use super::MessageVisitor;

    #[derive(Clone, Default)]
    pub struct CapturedEvents(Arc<Mutex<Vec<(Level, String)>>>);

    impl CapturedEvents {
        pub fn events(&self) -> Vec<(Level, String)> {
            self.0.lock().unwrap().clone()
        }
    }

    impl<S: Subscriber> Layer<S> for CapturedEvents {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = MessageVisitor::default();
            event.record(&mut visitor);
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), visitor.line()));
        }
    }
}
