use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Terminal columns occupied by `s` (CJK and emoji count double).
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Fit `s` into `max_width` columns, appending "..." when cut.
///
/// Widths too narrow for the ellipsis get a plain cut. Borrows when the
/// input already fits.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    let (budget, suffix) = if max_width <= ELLIPSIS_WIDTH {
        (max_width, "")
    } else {
        (max_width - ELLIPSIS_WIDTH, ELLIPSIS)
    };

    let mut used = 0;
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        end = idx + c.len_utf8();
    }
    Cow::Owned(format!("{}{}", &s[..end], suffix))
}

/// Remove terminal control characters and ANSI escape sequences from
/// server-supplied text before it reaches the screen.
///
/// Tab, newline and carriage return are kept.
pub fn sanitize(s: &str) -> Cow<'_, str> {
    let dirty = s
        .chars()
        .any(|c| c == '\u{1b}' || c == '\u{7f}' || (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r')));
    if !dirty {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => match chars.peek() {
                Some('[') => {
                    // CSI: parameters then one final byte in @..~
                    chars.next();
                    for f in chars.by_ref() {
                        if ('@'..='~').contains(&f) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    // OSC: terminated by BEL or ESC \
                    chars.next();
                    while let Some(f) = chars.next() {
                        if f == '\u{07}' {
                            break;
                        }
                        if f == '\u{1b}' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_ascii_control() || c == '\u{7f}' => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Plain-text, single-line preview of a post body stored as HTML.
///
/// Tags are dropped, common entities decoded, whitespace collapsed, and the
/// result cut to `max_chars` characters.
pub fn content_preview(html: &str, max_chars: usize) -> String {
    let mut text = String::with_capacity(html.len().min(max_chars * 2));
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                // Block boundaries become spaces so words don't fuse.
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            c => text.push(c),
        }
    }

    let decoded = decode_entities(&text);
    let clean = sanitize(&decoded);
    let collapsed = clean.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let cut: String = collapsed.chars().take(max_chars).collect();
        format!("{}{}", cut.trim_end(), ELLIPSIS)
    }
}

fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_fits_borrowed() {
        assert!(matches!(truncate_to_width("Short", 10), Cow::Borrowed("Short")));
    }

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
    }

    #[test]
    fn test_truncate_cjk_never_exceeds_width() {
        let out = truncate_to_width("日記を書きました", 7);
        assert_eq!(out, "日記...");
        assert!(display_width(&out) <= 7);
    }

    #[test]
    fn test_truncate_narrow_widths() {
        assert_eq!(truncate_to_width("Test", 0), "");
        assert_eq!(truncate_to_width("Testing", 2), "Te");
        assert_eq!(truncate_to_width("Testing", 3), "Tes");
    }

    #[test]
    fn test_sanitize_clean_text_borrowed() {
        assert!(matches!(sanitize("plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_sanitize_strips_ansi_and_controls() {
        assert_eq!(sanitize("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(sanitize("a\x1b]0;title\x07b"), "ab");
        assert_eq!(sanitize("a\x1b]8;;http://x\x1b\\b"), "ab");
        assert_eq!(sanitize("bell\x07 del\x7f"), "bell del");
        assert_eq!(sanitize("keep\ttab\nnl"), "keep\ttab\nnl");
    }

    #[test]
    fn test_preview_strips_tags_and_entities() {
        let html = "<h1>Day&nbsp;one</h1><p>Coffee &amp; <strong>code</strong></p>";
        assert_eq!(content_preview(html, 100), "Day one Coffee & code");
    }

    #[test]
    fn test_preview_cuts_long_text() {
        let html = "<p>one two three four five</p>";
        assert_eq!(content_preview(html, 9), "one two t...");
    }

    #[test]
    fn test_preview_empty() {
        assert_eq!(content_preview("", 10), "");
        assert_eq!(content_preview("<p></p>", 10), "");
    }
}
