use chrono::{DateTime, Local, Utc};

/// Apply line offset and optional line limit to a block of text.
///
/// `start_line` is 1-indexed. If `max_lines` is `Some(n)`, at most `n` lines
/// are returned with a truncation notice appended.
pub fn apply_line_limits(
    text: &str,
    start_line: usize,
    max_lines: Option<usize>,
) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let start_idx = start_line.saturating_sub(1).min(lines.len());
    if start_idx >= lines.len() {
        return String::new();
    }

    let end_idx = match max_lines {
        Some(max) => (start_idx + max).min(lines.len()),
        None => lines.len(),
    };

    let mut slice = lines[start_idx..end_idx].join("\n");
    if max_lines.is_some() && end_idx < lines.len() {
        slice.push_str(&format!(
            "\n\n[... truncated {} more lines]",
            lines.len() - end_idx
        ));
    }

    slice
}

/// Indent every non-empty line by two spaces.
pub fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("  {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Right-pad `text` with spaces to `width` characters.
pub fn pad(text: &str, width: usize) -> String {
    format!("{text:<width$}")
}

/// History column date, e.g. `3 Feb 4:07pm`.
pub fn history_date(date: &DateTime<Utc>) -> String {
    format_date(&date.with_timezone(&Local))
}

fn format_date<Tz>(date: &DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    date.format("%-d %b %-I:%M%P").to_string()
}
