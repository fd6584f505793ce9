//! Terminal sinks that print painted tables and can replay them as HTML.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crossterm::{
    queue,
    style::{Attribute, Color as TermColor, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
};
use tracing::{error, info, warn};

use crate::error::{Result, SorterError};
use crate::ui::html;
use crate::ui::style::parse_style;
use crate::ui::table::{EmailTable, buffer_lines};

/// Width of the wide sink, used when the terminal is too narrow for a report
pub const WIDE_PRINT_WIDTH: u16 = 300;

/// Width assumed when stdout is not a terminal
const FALLBACK_WIDTH: u16 = 80;

/// Target of events already printed to the themed console
pub const THEMED_TARGET: &str = "mailsorter::themed";

/// The themed console, shared with the logging layer that mirrors INFO lines
pub type SharedSink = Arc<Mutex<Sink>>;

/// Styled message categories for the themed sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Info,
    Success,
    Warning,
    Danger,
}

impl TextStyle {
    pub fn style(&self) -> Style {
        parse_style(match self {
            TextStyle::Info => "dim cyan",
            TextStyle::Success => "dim green",
            TextStyle::Warning => "yellow",
            TextStyle::Danger => "bold red",
        })
    }
}

enum SinkTarget {
    Stdout,
    Memory(Vec<u8>),
}

/// One console: a fixed width, an output target and an optional recording
pub struct Sink {
    name: &'static str,
    width: u16,
    recording: bool,
    recorded: Vec<Buffer>,
    target: SinkTarget,
}

impl Sink {
    pub fn stdout(name: &'static str, width: u16) -> Self {
        Self::with_target(name, width, SinkTarget::Stdout)
    }

    /// A sink that captures plain text instead of printing
    pub fn memory(name: &'static str, width: u16) -> Self {
        Self::with_target(name, width, SinkTarget::Memory(Vec::new()))
    }

    fn with_target(name: &'static str, width: u16, target: SinkTarget) -> Self {
        Self {
            name,
            width,
            recording: false,
            recorded: Vec::new(),
            target,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn record(&mut self) {
        self.recording = true;
    }

    pub fn recorded(&self) -> &[Buffer] {
        &self.recorded
    }

    /// Text captured by a memory sink
    pub fn captured(&self) -> Option<String> {
        match &self.target {
            SinkTarget::Memory(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            SinkTarget::Stdout => None,
        }
    }

    pub fn write(&mut self, buf: Buffer) -> Result<()> {
        let written = match &mut self.target {
            SinkTarget::Stdout => {
                let mut out = io::stdout().lock();
                write_ansi(&mut out, &buf).and_then(|_| out.flush())
            }
            SinkTarget::Memory(bytes) => {
                buffer_lines(&buf)
                    .iter()
                    .try_for_each(|line| writeln!(bytes, "{line}"))
            }
        };
        written.map_err(|source| SorterError::Console {
            sink: self.name,
            source,
        })?;

        if self.recording {
            self.recorded.push(buf);
        }
        Ok(())
    }
}

/// The standard, wide and themed consoles of one run
pub struct OutputSinks {
    pub standard: Sink,
    pub wide: Sink,
    pub themed: SharedSink,
}

impl OutputSinks {
    /// Sinks printing to stdout, sized to the current terminal
    pub fn stdout() -> Self {
        let width = crossterm::terminal::size()
            .map(|(cols, _)| cols)
            .unwrap_or(FALLBACK_WIDTH);
        Self {
            standard: Sink::stdout("normal", width),
            wide: Sink::stdout("wide", WIDE_PRINT_WIDTH),
            themed: Arc::new(Mutex::new(Sink::stdout("themed", width))),
        }
    }

    pub fn in_memory(width: u16) -> Self {
        Self {
            standard: Sink::memory("normal", width),
            wide: Sink::memory("wide", WIDE_PRINT_WIDTH),
            themed: Arc::new(Mutex::new(Sink::memory("themed", width))),
        }
    }

    /// Prints a rendered table. Wide tables go to the wide sink when the
    /// standard one is narrower than [`WIDE_PRINT_WIDTH`].
    pub fn print(&mut self, table: &EmailTable, wide_print: bool) -> Result<()> {
        let (sink, width) = if wide_print && self.standard.width() < WIDE_PRINT_WIDTH {
            (&mut self.wide, WIDE_PRINT_WIDTH)
        } else {
            let width = self.standard.width();
            (&mut self.standard, width)
        };
        for page in table.paint(width) {
            sink.write(page)?;
        }
        Ok(())
    }

    fn lock_themed(&self) -> Result<MutexGuard<'_, Sink>> {
        self.themed.lock().map_err(|_| SorterError::Console {
            sink: "themed",
            source: io::Error::other("console lock poisoned"),
        })
    }

    /// Captured text of the themed sink, for memory sinks
    pub fn themed_text(&self) -> Option<String> {
        self.lock_themed().ok()?.captured()
    }

    /// Prints styled text to the themed sink and logs it unless `suppress_logger`
    pub fn print_themed(&mut self, text: &str, text_style: TextStyle, suppress_logger: bool) -> Result<()> {
        self.lock_themed()?.write(themed_buffer(text, text_style))?;

        if !suppress_logger {
            match text_style {
                TextStyle::Info | TextStyle::Success => info!(target: THEMED_TARGET, "{text}"),
                TextStyle::Warning => warn!(target: THEMED_TARGET, "{text}"),
                TextStyle::Danger => error!(target: THEMED_TARGET, "{text}"),
            }
        }
        Ok(())
    }

    /// Logs at INFO and mirrors the line to the themed sink
    pub fn info(&mut self, text: &str) -> Result<()> {
        self.print_themed(text, TextStyle::Info, false)
    }

    /// Starts recording on all three sinks
    pub fn record_console(&mut self) -> Result<()> {
        self.standard.record();
        self.wide.record();
        self.lock_themed()?.record();
        Ok(())
    }

    /// Writes `<base>.html`, `<base>_themed.html` and `<base>_wide.html`.
    ///
    /// Every sink must be recording; nothing is written otherwise.
    pub fn export_to_html(&self, file_path: &Path) -> Result<Vec<PathBuf>> {
        let themed = self.lock_themed()?;
        for sink in [&self.standard, &*themed, &self.wide] {
            if !sink.is_recording() {
                return Err(SorterError::NotRecording(sink.name()));
            }
        }

        let themed_path = suffixed(file_path, "_themed");
        let wide_path = suffixed(file_path, "_wide");
        let exports = [
            (file_path.to_path_buf(), &self.standard),
            (themed_path, &*themed),
            (wide_path, &self.wide),
        ];

        let mut paths = Vec::with_capacity(exports.len());
        for (path, sink) in exports {
            let document = html::render_document(sink.recorded());
            fs::write(&path, document).map_err(|source| SorterError::Export {
                path: path.clone(),
                source,
            })?;
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Paints `text` in `text_style`, one buffer row per line
pub fn themed_buffer(text: &str, text_style: TextStyle) -> Buffer {
    let lines: Vec<&str> = text.lines().collect();
    let width = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(1, u16::MAX as usize) as u16;
    let height = lines.len().clamp(1, u16::MAX as usize) as u16;

    let mut buf = Buffer::empty(Rect::new(0, 0, width, height));
    for (y, line) in lines.iter().take(height as usize).enumerate() {
        buf.set_line(0, y as u16, &Line::styled(*line, text_style.style()), width);
    }
    buf
}

/// `dir/name.ext` -> `dir/name<suffix>.ext`
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}

/// Writes a buffer as ANSI-styled lines
fn write_ansi(out: &mut impl Write, buf: &Buffer) -> io::Result<()> {
    let area = buf.area;
    for (y, plain) in (area.top()..area.bottom()).zip(buffer_lines(buf)) {
        let visible = plain.chars().count() as u16;
        let mut current: Option<Style> = None;

        for x in area.left()..area.left() + visible {
            let cell = &buf[(x, y)];
            let style = cell.style();
            if current != Some(style) {
                queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
                queue!(
                    out,
                    SetForegroundColor(term_color(cell.fg)),
                    SetBackgroundColor(term_color(cell.bg))
                )?;
                for attribute in attributes(cell.modifier) {
                    queue!(out, SetAttribute(attribute))?;
                }
                current = Some(style);
            }
            queue!(out, Print(cell.symbol()))?;
        }
        queue!(out, SetAttribute(Attribute::Reset), ResetColor, Print("\n"))?;
    }
    Ok(())
}

fn attributes(modifier: Modifier) -> Vec<Attribute> {
    [
        (Modifier::BOLD, Attribute::Bold),
        (Modifier::DIM, Attribute::Dim),
        (Modifier::ITALIC, Attribute::Italic),
        (Modifier::UNDERLINED, Attribute::Underlined),
        (Modifier::REVERSED, Attribute::Reverse),
        (Modifier::CROSSED_OUT, Attribute::CrossedOut),
    ]
    .into_iter()
    .filter(|(m, _)| modifier.contains(*m))
    .map(|(_, a)| a)
    .collect()
}

fn term_color(color: Color) -> TermColor {
    match color {
        Color::Reset => TermColor::Reset,
        Color::Black => TermColor::Black,
        Color::Red => TermColor::DarkRed,
        Color::Green => TermColor::DarkGreen,
        Color::Yellow => TermColor::DarkYellow,
        Color::Blue => TermColor::DarkBlue,
        Color::Magenta => TermColor::DarkMagenta,
        Color::Cyan => TermColor::DarkCyan,
        Color::Gray => TermColor::Grey,
        Color::DarkGray => TermColor::DarkGrey,
        Color::LightRed => TermColor::Red,
        Color::LightGreen => TermColor::Green,
        Color::LightYellow => TermColor::Yellow,
        Color::LightBlue => TermColor::Blue,
        Color::LightMagenta => TermColor::Magenta,
        Color::LightCyan => TermColor::Cyan,
        Color::White => TermColor::White,
        Color::Rgb(r, g, b) => TermColor::Rgb { r, g, b },
        Color::Indexed(i) => TermColor::AnsiValue(i),
    }
}
