use std::collections::HashMap;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Cell, Row, Table, Widget},
};

use crate::error::{Result, SorterError};
use crate::ui::style::parse_style;

const COLUMN_SPACING: u16 = 1;
/// Narrowest a column is shrunk to when the table does not fit
const MIN_COLUMN_WIDTH: usize = 4;
const ELLIPSIS: char = '…';
/// Tallest buffer one page of a table is painted into
const MAX_PAGE_HEIGHT: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Justify {
    #[default]
    Left,
    Center,
    Right,
}

impl From<Justify> for Alignment {
    fn from(justify: Justify) -> Self {
        match justify {
            Justify::Left => Alignment::Left,
            Justify::Center => Alignment::Center,
            Justify::Right => Alignment::Right,
        }
    }
}

/// What happens to text that does not fit a no-wrap column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    #[default]
    Ellipsis,
    Crop,
    /// Break into as many lines as needed
    Fold,
}

/// Layout directives for one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnFormat {
    pub no_wrap: bool,
    pub justify: Justify,
    pub overflow: Overflow,
}

/// Per-column styles, value colors and layout directives
#[derive(Debug, Clone, Default)]
pub struct TableColumnStyles {
    color_by_value: HashMap<String, HashMap<String, String>>,
    style_by_col: HashMap<String, String>,
    format_by_col: HashMap<String, ColumnFormat>,
}

impl TableColumnStyles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_color(mut self, col: &str, value: &str, color: &str) -> Self {
        self.color_by_value
            .entry(col.to_string())
            .or_default()
            .insert(value.to_string(), color.to_string());
        self
    }

    pub fn bind_style(mut self, col: &str, style: &str) -> Self {
        self.style_by_col.insert(col.to_string(), style.to_string());
        self
    }

    pub fn bind_format(
        mut self,
        col: &str,
        no_wrap: bool,
        justify: Option<Justify>,
        overflow: Option<Overflow>,
    ) -> Self {
        self.format_by_col.insert(
            col.to_string(),
            ColumnFormat {
                no_wrap,
                justify: justify.unwrap_or_default(),
                overflow: overflow.unwrap_or_default(),
            },
        );
        self
    }

    pub fn style_by_col(&self, col: &str) -> &str {
        self.style_by_col.get(col).map_or("", String::as_str)
    }

    pub fn color_by_value(&self, col: &str, value: &str) -> &str {
        self.color_by_value
            .get(col)
            .and_then(|colors| colors.get(value))
            .map_or("", String::as_str)
    }

    pub fn column_format(&self, col: &str) -> ColumnFormat {
        self.format_by_col.get(col).copied().unwrap_or_default()
    }
}

/// How a table is sorted, styled and printed
#[derive(Debug, Clone)]
pub struct TableRenderSettings {
    pub col_styles: TableColumnStyles,
    pub wide_print: bool,
    /// Separate rows with a blank line
    pub show_lines: bool,
    pub sort_by_column: Option<String>,
    pub title: Option<String>,
}

impl TableRenderSettings {
    pub fn new(col_styles: TableColumnStyles) -> Self {
        Self {
            col_styles,
            wide_print: false,
            show_lines: false,
            sort_by_column: None,
            title: None,
        }
    }

    pub fn wide_print(mut self, wide_print: bool) -> Self {
        self.wide_print = wide_print;
        self
    }

    pub fn show_lines(mut self, show_lines: bool) -> Self {
        self.show_lines = show_lines;
        self
    }

    pub fn sort_by(mut self, column: Option<&str>) -> Self {
        self.sort_by_column = column.map(str::to_string);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Column style with the value color layered on top
    pub fn style_for(&self, col: &str, value: &str) -> Style {
        let column = parse_style(self.col_styles.style_by_col(col));
        let value = parse_style(self.col_styles.color_by_value(col, value));
        column.patch(value)
    }
}

/// Whether a column sorts as integers or as text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// A column is numeric when every value parses as an integer
pub fn classify_column<'a>(values: impl IntoIterator<Item = &'a str>) -> ColumnKind {
    if values.into_iter().all(|v| v.trim().parse::<i64>().is_ok()) {
        ColumnKind::Numeric
    } else {
        ColumnKind::Text
    }
}

/// Numeric columns sort descending, text columns ascending ignoring case. Stable.
pub fn sort_rows(rows: &mut [Vec<String>], col_idx: usize) {
    match classify_column(rows.iter().map(|r| r[col_idx].as_str())) {
        ColumnKind::Numeric => {
            rows.sort_by_key(|r| std::cmp::Reverse(r[col_idx].trim().parse::<i64>().unwrap_or(0)))
        }
        ColumnKind::Text => rows.sort_by_key(|r| r[col_idx].to_lowercase()),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct StyledValue {
    text: String,
    style: Style,
}

/// A report table: validated, sorted and styled rows under fixed headers
#[derive(Debug, Clone)]
pub struct EmailTable {
    cols: Vec<String>,
    settings: TableRenderSettings,
    rows: Vec<Vec<StyledValue>>,
}

impl EmailTable {
    pub fn new(cols: Vec<String>, settings: TableRenderSettings) -> Self {
        Self {
            cols,
            settings,
            rows: Vec::new(),
        }
    }

    pub fn settings(&self) -> &TableRenderSettings {
        &self.settings
    }

    /// Cell texts in display order
    pub fn rows(&self) -> Vec<Vec<&str>> {
        self.rows
            .iter()
            .map(|r| r.iter().map(|v| v.text.as_str()).collect())
            .collect()
    }

    pub fn cell_style(&self, row: usize, col: usize) -> Option<Style> {
        self.rows.get(row)?.get(col).map(|v| v.style)
    }

    /// Validates, sorts and styles `rows`, replacing any previous content
    pub fn render(&mut self, mut rows: Vec<Vec<String>>) -> Result<()> {
        if let Some(row) = rows.iter().find(|r| r.len() != self.cols.len()) {
            return Err(SorterError::RowWidth {
                expected: self.cols.len(),
                actual: row.len(),
                row: row.clone(),
            });
        }

        if let Some(sort_col) = &self.settings.sort_by_column {
            let idx = self
                .cols
                .iter()
                .position(|c| c == sort_col)
                .ok_or_else(|| SorterError::InvalidSortColumn(sort_col.clone()))?;
            sort_rows(&mut rows, idx);
        }

        self.rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .enumerate()
                    .map(|(idx, text)| StyledValue {
                        style: self.settings.style_for(&self.cols[idx], &text),
                        text,
                    })
                    .collect()
            })
            .collect();
        Ok(())
    }

    /// Lays the table out within `max_width` columns and paints it.
    ///
    /// A table taller than one buffer can hold is split into pages, each
    /// with its own border and header.
    pub fn paint(&self, max_width: u16) -> Vec<Buffer> {
        self.paint_pages(max_width, MAX_PAGE_HEIGHT)
    }

    fn paint_pages(&self, max_width: u16, page_height: u16) -> Vec<Buffer> {
        let formats: Vec<ColumnFormat> = self
            .cols
            .iter()
            .map(|c| self.settings.col_styles.column_format(c))
            .collect();
        let widths = self.column_widths(&formats, max_width);

        // border, header and border take three lines
        let body_limit = page_height.saturating_sub(3).max(1);
        let fitted: Vec<(Vec<Text<'static>>, u16)> = self
            .rows
            .iter()
            .map(|row| {
                let cells: Vec<Text> = row
                    .iter()
                    .zip(&formats)
                    .zip(&widths)
                    .map(|((value, format), width)| fit_cell(value, *format, *width))
                    .collect();
                let height = cells.iter().map(|t| t.lines.len()).max().unwrap_or(1).max(1);
                (cells, height.min(body_limit as usize) as u16)
            })
            .collect();

        let gap = u16::from(self.settings.show_lines);
        let mut pages = Vec::new();
        let mut start = 0;
        let mut used: u16 = 0;
        for (idx, (_, height)) in fitted.iter().enumerate() {
            let extra = if idx > start { gap } else { 0 };
            if idx > start && used as usize + (extra + height) as usize > body_limit as usize {
                pages.push(start..idx);
                start = idx;
                used = *height;
            } else {
                used += extra + height;
            }
        }
        pages.push(start..fitted.len());

        pages
            .into_iter()
            .enumerate()
            .map(|(page, range)| self.paint_page(&fitted[range], &formats, &widths, max_width, page == 0))
            .collect()
    }

    fn paint_page(
        &self,
        rows: &[(Vec<Text<'static>>, u16)],
        formats: &[ColumnFormat],
        widths: &[u16],
        max_width: u16,
        first_page: bool,
    ) -> Buffer {
        let header = Row::new(self.cols.iter().zip(formats).map(|(col, format)| {
            Cell::from(
                Text::from(Line::from(col.as_str()))
                    .alignment(format.justify.into())
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
        }));

        let last = rows.len().saturating_sub(1);
        let mut body_height: u16 = 0;
        let table_rows: Vec<Row> = rows
            .iter()
            .enumerate()
            .map(|(row_idx, (cells, height))| {
                let margin = u16::from(self.settings.show_lines && row_idx != last);
                body_height += height + margin;
                Row::new(cells.iter().cloned().map(Cell::from))
                    .height(*height)
                    .bottom_margin(margin)
            })
            .collect();

        let mut block = Block::bordered();
        if first_page && let Some(title) = &self.settings.title {
            block = block.title(format!(" {title} "));
        }

        let content_width: usize = widths.iter().map(|w| *w as usize).sum::<usize>()
            + COLUMN_SPACING as usize * self.cols.len().saturating_sub(1)
            + 2;
        let width = (content_width.min(max_width as usize)) as u16;
        let area = Rect::new(0, 0, width, body_height + 3);

        let table = Table::new(table_rows, widths.iter().map(|w| Constraint::Length(*w)))
            .header(header)
            .block(block)
            .column_spacing(COLUMN_SPACING);

        let mut buf = Buffer::empty(area);
        Widget::render(table, area, &mut buf);
        buf
    }

    /// Natural widths, shrunk until the table fits `max_width`
    fn column_widths(&self, formats: &[ColumnFormat], max_width: u16) -> Vec<u16> {
        let mut widths: Vec<usize> = self
            .cols
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                self.rows
                    .iter()
                    .flat_map(|r| r[idx].text.lines())
                    .map(|l| l.chars().count())
                    .chain(std::iter::once(col.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let spacing = COLUMN_SPACING as usize * self.cols.len().saturating_sub(1);
        let available = (max_width as usize).saturating_sub(2 + spacing);

        while widths.iter().sum::<usize>() > available {
            // Wrapping columns give up space first, then the widest one
            let candidate = widths
                .iter()
                .enumerate()
                .filter(|(idx, w)| !formats[*idx].no_wrap && **w > MIN_COLUMN_WIDTH)
                .max_by_key(|(_, w)| **w)
                .or_else(|| {
                    widths
                        .iter()
                        .enumerate()
                        .filter(|(_, w)| **w > MIN_COLUMN_WIDTH)
                        .max_by_key(|(_, w)| **w)
                })
                .map(|(idx, _)| idx);

            match candidate {
                Some(idx) => widths[idx] -= 1,
                None => break,
            }
        }

        widths.into_iter().map(|w| w.min(u16::MAX as usize) as u16).collect()
    }
}

/// Wraps or truncates a value to `width` according to its column format
fn fit_cell(value: &StyledValue, format: ColumnFormat, width: u16) -> Text<'static> {
    let width = width as usize;
    let lines: Vec<String> = value
        .text
        .lines()
        .flat_map(|line| {
            if !format.no_wrap {
                wrap_words(line, width)
            } else {
                match format.overflow {
                    Overflow::Ellipsis => vec![truncate(line, width, true)],
                    Overflow::Crop => vec![truncate(line, width, false)],
                    Overflow::Fold => fold(line, width),
                }
            }
        })
        .collect();

    let lines: Vec<Line> = lines
        .into_iter()
        .map(|l| Line::from(Span::styled(l, value.style)))
        .collect();
    Text::from(lines).alignment(format.justify.into())
}

fn truncate(line: &str, width: usize, ellipsis: bool) -> String {
    if line.chars().count() <= width {
        return line.to_string();
    }
    if ellipsis && width > 0 {
        let mut out: String = line.chars().take(width - 1).collect();
        out.push(ELLIPSIS);
        out
    } else {
        line.chars().take(width).collect()
    }
}

/// Hard-breaks a line into chunks of `width` characters
fn fold(line: &str, width: usize) -> Vec<String> {
    if width == 0 || line.is_empty() {
        return vec![line.to_string()];
    }
    let chars: Vec<char> = line.chars().collect();
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}

/// Greedy word wrap; words longer than `width` are folded
fn wrap_words(line: &str, width: usize) -> Vec<String> {
    if width == 0 || line.chars().count() <= width {
        return vec![line.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let word_len = word.chars().count();
        let current_len = current.chars().count();

        if current_len > 0 && current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
            continue;
        }
        if current_len > 0 {
            lines.push(std::mem::take(&mut current));
        }
        if word_len <= width {
            current.push_str(word);
        } else {
            let mut pieces = fold(word, width);
            if let Some(rest) = pieces.pop() {
                lines.extend(pieces);
                current = rest;
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Plain text of a painted buffer, one string per row, trailing spaces removed
pub fn buffer_lines(buf: &Buffer) -> Vec<String> {
    let area = buf.area;
    (area.top()..area.bottom())
        .map(|y| {
            let line: String = (area.left()..area.right())
                .map(|x| buf[(x, y)].symbol())
                .collect();
            line.trim_end().to_string()
        })
        .collect()
}
