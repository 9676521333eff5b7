//! Text clean-up before it reaches the display.

use partner_display_hw::MAX_TEXT_BYTES;
use tracing::debug;

/// Removes markup tags: a `<`, one or more characters other than `>`, then `>`.
///
/// A `<` without a closing `>` and the empty pair `<>` are kept as text.
pub fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('>') {
            Some(end) if end > 0 => rest = &after[end + 1..],
            _ => {
                out.push('<');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Cuts `text` to at most `max` bytes without splitting a character.
pub fn truncate_at_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

/// Prepares raw text for the coprocessor's text widget, which needs at
/// least one character and fits one command ring.
pub fn for_display(text: &str, strip: bool) -> String {
    let mut text = if strip {
        strip_tags(text)
    } else {
        text.to_string()
    };
    if text.len() > MAX_TEXT_BYTES {
        debug!("Truncating {} byte text to {} bytes", text.len(), MAX_TEXT_BYTES);
        truncate_at_char_boundary(&mut text, MAX_TEXT_BYTES);
    }
    if text.is_empty() {
        " ".to_string()
    } else {
        text
    }
}
