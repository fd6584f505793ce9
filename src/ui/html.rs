use ratatui::buffer::Buffer;
use ratatui::style::{Color, Modifier, Style};

const DOCUMENT_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<style>
body { color: #e5e5e5; background-color: #1e1e1e; }
pre { font-family: Menlo, 'DejaVu Sans Mono', consolas, 'Courier New', monospace; line-height: 1.2; }
</style>
</head>
<body>
<pre><code>"#;

const DOCUMENT_TAIL: &str = "</code></pre>\n</body>\n</html>\n";

/// Renders recorded buffers into one standalone HTML page
pub fn render_document(frames: &[Buffer]) -> String {
    let mut html = String::from(DOCUMENT_HEAD);
    for frame in frames {
        render_buffer(frame, &mut html);
    }
    html.push_str(DOCUMENT_TAIL);
    html
}

/// Appends the rows of `buf`, one `<span>` per run of equally styled cells
fn render_buffer(buf: &Buffer, html: &mut String) {
    let area = buf.area;
    for y in area.top()..area.bottom() {
        let mut run = String::new();
        let mut run_style = Style::default();

        for x in area.left()..area.right() {
            let cell = &buf[(x, y)];
            let style = cell.style();
            if style != run_style && !run.is_empty() {
                push_run(html, &run, run_style);
                run.clear();
            }
            run_style = style;
            run.push_str(cell.symbol());
        }

        let trimmed_len = if css_for(run_style).is_empty() {
            run.trim_end().len()
        } else {
            run.len()
        };
        push_run(html, &run[..trimmed_len], run_style);
        html.push('\n');
    }
}

fn push_run(html: &mut String, text: &str, style: Style) {
    if text.is_empty() {
        return;
    }
    let css = css_for(style);
    if css.is_empty() {
        html.push_str(&escape(text));
    } else {
        html.push_str(&format!("<span style=\"{css}\">{}</span>", escape(text)));
    }
}

fn css_for(style: Style) -> String {
    let mut rules = Vec::new();
    if let Some(fg) = style.fg.and_then(css_color) {
        rules.push(format!("color: {fg}"));
    }
    if let Some(bg) = style.bg.and_then(css_color) {
        rules.push(format!("background-color: {bg}"));
    }
    let modifiers = style.add_modifier;
    if modifiers.contains(Modifier::BOLD) {
        rules.push("font-weight: bold".to_string());
    }
    if modifiers.contains(Modifier::DIM) {
        rules.push("opacity: 0.6".to_string());
    }
    if modifiers.contains(Modifier::ITALIC) {
        rules.push("font-style: italic".to_string());
    }
    if modifiers.contains(Modifier::UNDERLINED) {
        rules.push("text-decoration: underline".to_string());
    }
    if modifiers.contains(Modifier::CROSSED_OUT) {
        rules.push("text-decoration: line-through".to_string());
    }
    rules.join("; ")
}

fn css_color(color: Color) -> Option<String> {
    let hex = match color {
        Color::Reset => return None,
        Color::Black => "#000000",
        Color::Red => "#cd3131",
        Color::Green => "#0dbc79",
        Color::Yellow => "#e5e510",
        Color::Blue => "#2472c8",
        Color::Magenta => "#bc3fbc",
        Color::Cyan => "#11a8cd",
        Color::Gray => "#e5e5e5",
        Color::DarkGray => "#666666",
        Color::LightRed => "#f14c4c",
        Color::LightGreen => "#23d18b",
        Color::LightYellow => "#f5f543",
        Color::LightBlue => "#3b8eea",
        Color::LightMagenta => "#d670d6",
        Color::LightCyan => "#29b8db",
        Color::White => "#ffffff",
        Color::Rgb(r, g, b) => return Some(format!("#{r:02x}{g:02x}{b:02x}")),
        Color::Indexed(i) => return Some(format!("var(--ansi-{i})")),
    };
    Some(hex.to_string())
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
