//! Plain-text building blocks for terminal output

use std::borrow::Cow;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Cut `text` to at most `max_width` display columns, marking the cut with "..."
pub fn truncate_to_width(text: &str, max_width: usize) -> Cow<'_, str> {
    if text.width() <= max_width {
        return Cow::Borrowed(text);
    }

    let mut used = 0;
    let mut end = 0;
    for (idx, c) in text.char_indices() {
        let w = c.width().unwrap_or(0);
        if used + w > max_width {
            break;
        }
        used += w;
        end = idx + c.len_utf8();
    }

    Cow::Owned(format!("{}...", &text[..end]))
}

/// Rounded box with a title line, one body line per input line
pub fn panel(title: &str, body: &str) -> String {
    let mut out = format!("╭─ {}\n", title);
    for line in body.lines() {
        out.push_str("│ ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("╰─\n");
    out
}
