//! Column layouts of the reports the CLI prints.

use crate::grouping::ResultMode;
use crate::ui::table::{Justify, Overflow, TableColumnStyles};

pub const SENDER: &str = "Sender";
pub const COUNT: &str = "Count from this sender";
pub const RECIPIENT: &str = "Recipient";
pub const DATE: &str = "Date";
pub const SUBJECT: &str = "Subject";
pub const THREAD_ID: &str = "Thread ID";
pub const MESSAGE_ID: &str = "Message ID";

pub const FILTER: &str = "Filter";
pub const MATCHES: &str = "Matches";
pub const GMAIL_LINK: &str = "Gmail link";

/// The kind of rows a report holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Grouping(ResultMode),
    FilterStats,
}

impl ReportKind {
    pub fn columns(&self) -> Vec<String> {
        let names: &[&str] = match self {
            ReportKind::Grouping(ResultMode::Simplified) => &[SENDER, COUNT],
            ReportKind::Grouping(ResultMode::Detailed) => &[
                SENDER, COUNT, RECIPIENT, DATE, SUBJECT, THREAD_ID, MESSAGE_ID,
            ],
            ReportKind::FilterStats => &[FILTER, MATCHES, GMAIL_LINK],
        };
        names.iter().map(|n| n.to_string()).collect()
    }

    pub fn column_styles(&self) -> TableColumnStyles {
        match self {
            ReportKind::Grouping(mode) => {
                let styles = TableColumnStyles::new()
                    .bind_style(SENDER, "cyan")
                    .bind_format(SENDER, true, Some(Justify::Left), None)
                    .bind_style(COUNT, "cyan")
                    .bind_format(COUNT, true, Some(Justify::Right), None);
                match mode {
                    ResultMode::Simplified => styles,
                    ResultMode::Detailed => styles
                        .bind_style(RECIPIENT, "magenta")
                        .bind_format(RECIPIENT, true, None, None)
                        .bind_format(DATE, true, None, None)
                        .bind_format(SUBJECT, false, None, Some(Overflow::Ellipsis))
                        .bind_format(THREAD_ID, true, None, None)
                        .bind_format(MESSAGE_ID, true, None, None),
                }
            }
            ReportKind::FilterStats => TableColumnStyles::new()
                .bind_style(FILTER, "cyan")
                .bind_format(MATCHES, true, Some(Justify::Right), None)
                .bind_color(MATCHES, "0", "dim")
                .bind_style(GMAIL_LINK, "blue")
                .bind_format(GMAIL_LINK, true, None, Some(Overflow::Fold)),
        }
    }

    /// Column the report is sorted by when printed
    pub fn sort_column(&self) -> Option<&'static str> {
        match self {
            ReportKind::Grouping(_) => Some(COUNT),
            ReportKind::FilterStats => None,
        }
    }

    /// Detailed rows are separated by blank lines
    pub fn show_lines(&self) -> bool {
        matches!(self, ReportKind::Grouping(ResultMode::Detailed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::{Color, Modifier};

    #[test]
    fn test_simplified_columns() {
        let kind = ReportKind::Grouping(ResultMode::Simplified);
        assert_eq!(kind.columns(), vec!["Sender", "Count from this sender"]);
        assert!(!kind.show_lines());
    }

    #[test]
    fn test_detailed_columns() {
        let kind = ReportKind::Grouping(ResultMode::Detailed);
        assert_eq!(
            kind.columns(),
            vec![
                "Sender",
                "Count from this sender",
                "Recipient",
                "Date",
                "Subject",
                "Thread ID",
                "Message ID"
            ]
        );
        assert!(kind.show_lines());
    }

    #[test]
    fn test_grouping_styles() {
        let styles = ReportKind::Grouping(ResultMode::Detailed).column_styles();
        assert_eq!(styles.style_by_col(SENDER), "cyan");
        assert_eq!(styles.style_by_col(RECIPIENT), "magenta");
        assert_eq!(styles.column_format(COUNT).justify, Justify::Right);
        assert!(styles.column_format(COUNT).no_wrap);
        assert!(!styles.column_format(SUBJECT).no_wrap);
        assert_eq!(styles.column_format(SUBJECT).overflow, Overflow::Ellipsis);
    }

    #[test]
    fn test_filter_stats_layout() {
        let kind = ReportKind::FilterStats;
        assert_eq!(kind.columns(), vec!["Filter", "Matches", "Gmail link"]);
        assert_eq!(kind.sort_column(), None);
        assert!(!kind.show_lines());

        let styles = kind.column_styles();
        assert_eq!(styles.color_by_value(MATCHES, "0"), "dim");
        assert_eq!(styles.color_by_value(MATCHES, "3"), "");
        assert_eq!(styles.column_format(GMAIL_LINK).overflow, Overflow::Fold);
    }

    #[test]
    fn test_grouping_sorts_by_count() {
        let kind = ReportKind::Grouping(ResultMode::Simplified);
        assert_eq!(kind.sort_column(), Some("Count from this sender"));
        assert!(kind.columns().iter().any(|c| c == COUNT));
    }

    #[test]
    fn test_styles_resolve_to_colors() {
        use crate::ui::style::parse_style;
        let styles = ReportKind::FilterStats.column_styles();
        assert_eq!(parse_style(styles.style_by_col(GMAIL_LINK)).fg, Some(Color::Blue));
        assert!(
            parse_style(styles.color_by_value(MATCHES, "0"))
                .add_modifier
                .contains(Modifier::DIM)
        );
    }
}
