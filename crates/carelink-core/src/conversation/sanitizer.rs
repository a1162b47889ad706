//! Removes the internal reasoning preamble from assistant replies.
//!
//! The remote assistant is instructed to answer in two labelled sections:
//!
//! ```text
//! Raciocínio: <internal notes, possibly several lines>
//! Orientação/Resposta: <what the user should read>
//! ```
//!
//! Only the answer section is shown to the user.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static REASONING_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)racioc[ií]nio\s*:").expect("valid reasoning marker regex"));

static ANSWER_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)orienta[çc][ãa]o\s*/\s*resposta\s*:[ \t]*").expect("valid answer marker regex")
});

static EXCESS_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));

/// Strips the reasoning block and the answer marker from `raw`.
///
/// Steps, in order:
/// 1. remove everything from the reasoning marker up to (not including) the
///    next answer marker; a reasoning marker with no answer marker after it
///    is left alone
/// 2. remove answer markers
/// 3. collapse runs of three or more newlines into two
/// 4. trim
///
/// Without any marker the trimmed input is returned unchanged.
///
/// The transform is total and idempotent: it is applied until the text stops
/// changing. Every pass only removes characters, so the loop terminates.
pub fn sanitize(raw: &str) -> String {
    let mut current = sanitize_once(raw);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_once(text: &str) -> String {
    if !REASONING_MARKER.is_match(text) && !ANSWER_MARKER.is_match(text) {
        return text.trim().to_string();
    }

    let without_reasoning = strip_reasoning_block(text);
    let without_marker = ANSWER_MARKER.replace_all(&without_reasoning, "");
    let collapsed = EXCESS_NEWLINES.replace_all(&without_marker, "\n\n");
    collapsed.trim().to_string()
}

fn strip_reasoning_block(text: &str) -> Cow<'_, str> {
    let Some(reasoning) = REASONING_MARKER.find(text) else {
        return Cow::Borrowed(text);
    };
    let Some(answer) = ANSWER_MARKER.find_at(text, reasoning.end()) else {
        return Cow::Borrowed(text);
    };

    let mut kept = String::with_capacity(text.len() - (answer.start() - reasoning.start()));
    kept.push_str(&text[..reasoning.start()]);
    kept.push_str(&text[answer.start()..]);
    Cow::Owned(kept)
}
