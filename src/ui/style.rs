use ratatui::style::{Color, Modifier, Style};

/// Parses a style string such as `"bold red"`, `"dim cyan"` or `"white on blue"`.
/// Unknown words are ignored.
pub fn parse_style(spec: &str) -> Style {
    let mut style = Style::default();
    let mut background = false;

    for word in spec.split_whitespace() {
        let word = word.to_ascii_lowercase();
        if word == "on" {
            background = true;
            continue;
        }
        if let Some(modifier) = parse_modifier(&word) {
            style = style.add_modifier(modifier);
        } else if let Some(color) = parse_color(&word) {
            style = if background { style.bg(color) } else { style.fg(color) };
        }
        background = false;
    }
    style
}

fn parse_modifier(word: &str) -> Option<Modifier> {
    match word {
        "bold" => Some(Modifier::BOLD),
        "dim" => Some(Modifier::DIM),
        "italic" => Some(Modifier::ITALIC),
        "underline" => Some(Modifier::UNDERLINED),
        "reverse" => Some(Modifier::REVERSED),
        "strike" => Some(Modifier::CROSSED_OUT),
        _ => None,
    }
}

pub fn parse_color(word: &str) -> Option<Color> {
    let color = match word {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" | "bright_white" => Color::White,
        "gray" | "grey" => Color::Gray,
        "dark_gray" | "dark_grey" | "bright_black" => Color::DarkGray,
        "bright_red" => Color::LightRed,
        "bright_green" => Color::LightGreen,
        "bright_yellow" => Color::LightYellow,
        "bright_blue" => Color::LightBlue,
        "bright_magenta" => Color::LightMagenta,
        "bright_cyan" => Color::LightCyan,
        _ => return None,
    };
    Some(color)
}
