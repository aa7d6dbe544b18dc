//! Cleanup of extracted note content.
//!
//! The steps are order-sensitive:
//!
//! 1. line breaks are dropped, they are accidental artifacts of pretty-printed
//!    markup; runs of two or more are kept as a paragraph break
//! 2. paragraph and line-break tags become paragraph breaks
//! 3. runs of paragraph breaks, and the whitespace around them, collapse to one
//! 4. block quotes get their content wrapped in a single paragraph again
//! 5. trailing whitespace and commas are dropped
//! 6. the result is trimmed
//!
//! [`normalize()`] is idempotent.

use std::sync::LazyLock;

use aho_corasick::AhoCorasick;

const PARAGRAPH_BREAK: &str = "\n\n";

static BREAK_TAGS: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::new(["<p>", "</p>", "<p/>", "<lb/>", "<lb>", "</lb>"])
        .expect("break tag patterns must compile")
});

const BREAK_REPLACEMENTS: [&str; 6] = [
    "",
    PARAGRAPH_BREAK,
    PARAGRAPH_BREAK,
    PARAGRAPH_BREAK,
    PARAGRAPH_BREAK,
    "",
];

const BLOCKQUOTE_OPEN: &str = "<blockquote>";
const BLOCKQUOTE_CLOSE: &str = "</blockquote>";

/// Normalizes extracted markup content into note text
pub fn normalize(content: &str) -> String {
    let mut content = squash_line_breaks(content);
    // removing a tag can bring a new one together, repeat until nothing matches
    while BREAK_TAGS.is_match(&content) {
        content = BREAK_TAGS.replace_all(&content, &BREAK_REPLACEMENTS);
    }
    let content = collapse_breaks(&content);
    let content = wrap_blockquotes(&content);
    content
        .trim_end_matches(|c: char| c.is_whitespace() || c == ',')
        .trim()
        .to_string()
}

/// Drops single line breaks and turns every longer run into exactly one paragraph break
fn squash_line_breaks(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut run = 0;
    for c in s.chars() {
        if c == '\n' {
            run += 1;
            continue;
        }
        if run >= 2 {
            out.push_str(PARAGRAPH_BREAK);
        }
        run = 0;
        out.push(c);
    }
    if run >= 2 {
        out.push_str(PARAGRAPH_BREAK);
    }
    out
}

/// Turns every run of whitespace that holds a line break into exactly one paragraph break
fn collapse_breaks(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut run = String::new();
    for c in s.chars() {
        if c.is_whitespace() {
            run.push(c);
            continue;
        }
        flush_whitespace(&mut out, &mut run);
        out.push(c);
    }
    flush_whitespace(&mut out, &mut run);
    out
}

fn flush_whitespace(out: &mut String, run: &mut String) {
    if run.contains('\n') {
        out.push_str(PARAGRAPH_BREAK);
    } else {
        out.push_str(run);
    }
    run.clear();
}

/// Block quote content is stripped of its paragraphs like everything else,
/// put a single paragraph back inside each quote so it renders as a block.
fn wrap_blockquotes(s: &str) -> String {
    if !s.contains(BLOCKQUOTE_OPEN) && !s.contains(BLOCKQUOTE_CLOSE) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 16);
    let mut rest = s;
    loop {
        let open = rest.find(BLOCKQUOTE_OPEN);
        let close = rest.find(BLOCKQUOTE_CLOSE);
        match (open, close) {
            (Some(begin), close) if close.map_or(true, |close| begin < close) => {
                out.push_str(&rest[..begin]);
                out.push_str("<blockquote><p>");
                rest = rest[begin + BLOCKQUOTE_OPEN.len()..].trim_start();
            }
            (_, Some(end)) => {
                out.push_str(rest[..end].trim_end());
                out.push_str("</p></blockquote>");
                rest = &rest[end + BLOCKQUOTE_CLOSE.len()..];
            }
            (_, None) => {
                out.push_str(rest);
                break;
            }
        }
    }
    out
}

/// Strips one layer of enclosing parentheses or brackets from single-paragraph content
pub fn strip_enclosing(content: &str) -> &str {
    if content.contains(PARAGRAPH_BREAK) {
        return content;
    }
    for (open, close) in [('(', ')'), ('[', ']')] {
        if content.len() >= 2 && content.starts_with(open) && content.ends_with(close) {
            let inner = &content[open.len_utf8()..content.len() - close.len_utf8()];
            let mut depth = 0usize;
            let mut balanced = true;
            for c in inner.chars() {
                if c == open {
                    depth += 1;
                } else if c == close {
                    if depth == 0 {
                        // the first bracket closes before the end
                        balanced = false;
                        break;
                    }
                    depth -= 1;
                }
            }
            if balanced && depth == 0 {
                return inner.trim();
            }
        }
    }
    content
}
