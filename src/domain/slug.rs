//! Slug derivation and validation for content records.
//!
//! ASCII slugification comes from the `slug` crate; CJK titles are
//! transliterated with `pinyin` first so “基线对齐” becomes `ji-xian-dui-qi`.

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

pub const SLUG_MAX_CHARS: usize = 120;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("`{slug}` is not a valid slug (lowercase letters, digits and single hyphens)")]
    Malformed { slug: String },
}

/// Derive a slug from human-readable text such as a post title.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let transliterated = transliterate_to_ascii(input);
    let mut candidate = slugify(&transliterated);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    if candidate.len() > SLUG_MAX_CHARS {
        candidate.truncate(SLUG_MAX_CHARS);
        let trimmed = candidate.trim_end_matches('-').len();
        candidate.truncate(trimmed);
    }

    Ok(candidate)
}

/// Check an explicit slug against `^[a-z0-9]+(-[a-z0-9]+)*$`.
pub fn validate_slug(slug: &str) -> Result<(), SlugError> {
    let well_formed = !slug.is_empty()
        && slug.len() <= SLUG_MAX_CHARS
        && slug.split('-').all(|segment| {
            !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        });

    if well_formed {
        Ok(())
    } else {
        Err(SlugError::Malformed {
            slug: slug.to_string(),
        })
    }
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            // slugify decides what to do with the rest
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}
