use unicode_width::UnicodeWidthChar;

/// Truncate a string to a terminal display width, appending `...` when cut.
///
/// Wide characters (CJK, emoji) count as two columns, so log cards stay
/// aligned for Japanese text.
pub fn truncate_str(s: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthStr;

    if s.width() <= max_width {
        return s.to_string();
    }

    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(1);

        if current_width + char_width + 3 > max_width {
            break;
        }

        result.push(c);
        current_width += char_width;
    }

    result.push_str("...");
    result
}

/// Keep at most `max_chars` characters. Never splits a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Collapse space runs, cap blank lines at one, trim every line and the whole text.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.lines() {
        let line = collapse_spaces(line);
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run > 0 {
                out.push('\n');
            }
        }
        out.push_str(&line);
        blank_run = 0;
    }

    out
}

fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last_was_space = false;
    for c in line.trim().chars() {
        // U+3000 is the ideographic space used in Japanese layouts.
        let is_space = c == ' ' || c == '\t' || c == '\u{a0}' || c == '\u{3000}';
        if is_space {
            if !last_was_space {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
        last_was_space = is_space;
    }
    out
}
