//! Derived content fields and normalization rules shared by every source.

use std::collections::BTreeSet;

use crate::domain::error::DomainError;

pub const EXCERPT_MAX_CHARS: usize = 160;
pub const TAG_MAX_CHARS: usize = 32;
const WORDS_PER_MINUTE: usize = 200;
const ELLIPSIS: char = '…';

/// Derive a plain-text excerpt from a markdown body.
///
/// Markdown syntax is stripped, whitespace collapsed, and the text cut at a
/// word boundary so the result (ellipsis included) never exceeds
/// [`EXCERPT_MAX_CHARS`] characters.
pub fn derive_excerpt(body: &str) -> String {
    let text = plain_text(body);
    if text.chars().count() <= EXCERPT_MAX_CHARS {
        return text;
    }

    let budget = EXCERPT_MAX_CHARS - 1;
    let mut excerpt = String::new();
    let mut used = 0usize;
    for word in text.split(' ') {
        let len = word.chars().count();
        let extra = if excerpt.is_empty() { len } else { len + 1 };
        if used + extra > budget {
            break;
        }
        if !excerpt.is_empty() {
            excerpt.push(' ');
        }
        excerpt.push_str(word);
        used += extra;
    }

    if excerpt.is_empty() {
        // a single word longer than the budget
        excerpt = text.chars().take(budget).collect();
    }

    let trimmed_len = excerpt.trim_end_matches([',', ';', ':', '.']).len();
    excerpt.truncate(trimmed_len);
    excerpt.push(ELLIPSIS);
    excerpt
}

/// Reading-time estimate in whole minutes, never below one.
pub fn reading_time_minutes(body: &str) -> u32 {
    let words = body.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Trim, lowercase and deduplicate tags. Blank entries are dropped.
pub fn normalize_tags<I, S>(tags: I) -> Result<BTreeSet<String>, DomainError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized = BTreeSet::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > TAG_MAX_CHARS {
            return Err(DomainError::validation(
                "tags",
                format!("tag `{tag}` exceeds {TAG_MAX_CHARS} characters"),
            ));
        }
        normalized.insert(tag);
    }
    Ok(normalized)
}

/// Flatten markdown into a single line of readable text.
pub fn plain_text(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut in_fence = false;

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        let line = trimmed
            .trim_start_matches('#')
            .trim_start_matches('>')
            .trim_start();
        let line = strip_list_marker(line);
        out.push_str(&strip_inline(line));
        out.push(' ');
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_list_marker(line: &str) -> &str {
    for marker in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest;
        }
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0
        && let Some(rest) = line[digits..].strip_prefix(". ")
    {
        return rest;
    }
    line
}

fn strip_inline(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '!' if chars.peek() == Some(&'[') => {
                chars.next();
                take_until(&mut chars, ']');
                if chars.peek() == Some(&'(') {
                    chars.next();
                    take_until(&mut chars, ')');
                }
            }
            '[' => {
                let text = take_until(&mut chars, ']');
                out.push_str(&strip_inline(&text));
                if chars.peek() == Some(&'(') {
                    chars.next();
                    take_until(&mut chars, ')');
                }
            }
            '*' | '`' | '~' => {}
            other => out.push(other),
        }
    }

    out
}

fn take_until(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, end: char) -> String {
    let mut taken = String::new();
    for ch in chars.by_ref() {
        if ch == end {
            break;
        }
        taken.push(ch);
    }
    taken
}
