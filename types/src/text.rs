//! Small pure text helpers.

/// Truncate `raw` to at most `max` characters, appending `...` when cut.
///
/// Surrounding whitespace is trimmed first and `max` is never below 3 so
/// the ellipsis always fits.
#[must_use]
pub fn truncate_with_ellipsis(raw: &str, max: usize) -> String {
    let max = max.max(3);
    let trimmed = raw.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(max - 3).collect();
    format!("{head}...")
}

/// Flatten a server-supplied message into one displayable line.
///
/// Drops ANSI CSI sequences and control characters, collapses runs of
/// whitespace, and caps the result at `max` characters.
#[must_use]
pub fn clean_server_message(raw: &str, max: usize) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // CSI parameters run until a final byte in '@'..='~'
                for p in chars.by_ref() {
                    if ('@'..='~').contains(&p) {
                        break;
                    }
                }
            }
            continue;
        }
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if c.is_control() {
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    truncate_with_ellipsis(&out, max)
}
