//! Write commands as received from callers, and their validation into
//! repository parameters. Nothing here touches the network.

use serde::Deserialize;
use url::Url;

use crate::application::repos::{
    ContactUpdate, ContentPatch, NewComment, NewContactMessage, NewContentRecord,
};
use crate::domain::content::normalize_tags;
use crate::domain::error::DomainError;
use crate::domain::slug::{derive_slug, validate_slug};
use crate::domain::types::ContactStatus;

pub const TITLE_MAX_CHARS: usize = 200;
pub const AUTHOR_NAME_MAX_CHARS: usize = 100;
pub const COMMENT_BODY_MAX_CHARS: usize = 5000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateRecordCommand {
    pub title: String,
    pub body: String,
    /// Derived from the title when omitted.
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub tags: Vec<String>,
    pub published: bool,
    pub featured_image_url: Option<String>,
}

impl CreateRecordCommand {
    pub fn validate(self) -> Result<NewContentRecord, DomainError> {
        let title = ensure_title(&self.title)?;
        let body = ensure_non_empty(&self.body, "body")?;
        let slug = match normalize_optional(self.slug) {
            Some(slug) => ensure_slug(slug)?,
            None => derive_slug(&title)
                .map_err(|err| DomainError::validation("slug", err.to_string()))?,
        };
        let featured_image_url = normalize_optional(self.featured_image_url)
            .map(ensure_url)
            .transpose()?;

        Ok(NewContentRecord {
            slug,
            title,
            body,
            excerpt: normalize_optional(self.excerpt),
            tags: normalize_tags(&self.tags)?,
            published: self.published,
            featured_image_url,
        })
    }
}

/// Fields left out are unchanged. An empty `excerpt` or
/// `featured_image_url` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateRecordCommand {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub excerpt: Option<String>,
    pub tags: Option<Vec<String>>,
    pub published: Option<bool>,
    pub featured_image_url: Option<String>,
}

impl UpdateRecordCommand {
    pub fn validate(self) -> Result<ContentPatch, DomainError> {
        let patch = ContentPatch {
            slug: self.slug.map(|slug| ensure_slug(slug.trim().to_string())).transpose()?,
            title: self.title.as_deref().map(ensure_title).transpose()?,
            body: self
                .body
                .as_deref()
                .map(|body| ensure_non_empty(body, "body"))
                .transpose()?,
            excerpt: self.excerpt.map(|excerpt| excerpt.trim().to_string()),
            tags: self.tags.map(normalize_tags).transpose()?,
            published: self.published,
            featured_image_url: self
                .featured_image_url
                .map(|url| {
                    let url = url.trim().to_string();
                    if url.is_empty() { Ok(url) } else { ensure_url(url) }
                })
                .transpose()?,
        };

        if patch.is_empty() {
            return Err(DomainError::validation(
                "patch",
                "update must change at least one field",
            ));
        }
        Ok(patch)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubmitCommentCommand {
    pub author_name: String,
    pub author_email: Option<String>,
    pub author_website: Option<String>,
    pub body: String,
}

impl SubmitCommentCommand {
    pub fn validate(self, post_id: &str) -> Result<NewComment, DomainError> {
        let post_id = ensure_non_empty(post_id, "post_id")?;
        let author_name = ensure_non_empty(&self.author_name, "author_name")?;
        ensure_max_chars(&author_name, AUTHOR_NAME_MAX_CHARS, "author_name")?;
        let body = ensure_non_empty(&self.body, "body")?;
        ensure_max_chars(&body, COMMENT_BODY_MAX_CHARS, "body")?;
        let author_email = normalize_optional(self.author_email)
            .map(|email| ensure_email(email, "author_email"))
            .transpose()?;
        let author_website = normalize_optional(self.author_website)
            .map(ensure_url)
            .transpose()?;

        Ok(NewComment {
            post_id,
            author_name,
            author_email,
            author_website,
            body,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubmitContactCommand {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
}

impl SubmitContactCommand {
    pub fn validate(self) -> Result<NewContactMessage, DomainError> {
        Ok(NewContactMessage {
            name: ensure_non_empty(&self.name, "name")?,
            email: ensure_email(self.email, "email")?,
            subject: normalize_optional(self.subject),
            message: ensure_non_empty(&self.message, "message")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateContactCommand {
    pub status: ContactStatus,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

impl UpdateContactCommand {
    pub fn validate(self) -> Result<ContactUpdate, DomainError> {
        Ok(ContactUpdate {
            status: self.status,
            admin_notes: normalize_optional(self.admin_notes),
        })
    }
}

fn ensure_non_empty(value: &str, field: &'static str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn ensure_max_chars(value: &str, max: usize, field: &'static str) -> Result<(), DomainError> {
    if value.chars().count() > max {
        return Err(DomainError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

fn ensure_title(value: &str) -> Result<String, DomainError> {
    let title = ensure_non_empty(value, "title")?;
    ensure_max_chars(&title, TITLE_MAX_CHARS, "title")?;
    Ok(title)
}

fn ensure_slug(slug: String) -> Result<String, DomainError> {
    validate_slug(&slug).map_err(|err| DomainError::validation("slug", err.to_string()))?;
    Ok(slug)
}

fn ensure_email(value: String, field: &'static str) -> Result<String, DomainError> {
    let email = value.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email.to_string()),
        _ => Err(DomainError::validation(field, "must be an email address")),
    }
}

fn ensure_url(value: String) -> Result<String, DomainError> {
    match Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(value),
        _ => Err(DomainError::validation("url", format!("`{value}` is not an http(s) URL"))),
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(title: &str, body: &str) -> CreateRecordCommand {
        CreateRecordCommand {
            title: title.to_string(),
            body: body.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn create_derives_slug_from_title() {
        let params = create("Go Channels, Again", "body").validate().expect("valid");
        assert_eq!(params.slug, "go-channels-again");
        assert!(!params.published);
    }

    #[test]
    fn create_rejects_blank_title() {
        let err = create("   ", "body").validate().expect_err("blank title");
        assert_eq!(err.field(), Some("title"));
    }

    #[test]
    fn create_rejects_overlong_title() {
        let err = create(&"t".repeat(201), "body")
            .validate()
            .expect_err("too long");
        assert_eq!(err.field(), Some("title"));
    }

    #[test]
    fn create_rejects_malformed_slug() {
        let command = CreateRecordCommand {
            slug: Some("Bad Slug".into()),
            ..create("Title", "body")
        };
        assert_eq!(command.validate().expect_err("slug").field(), Some("slug"));
    }

    #[test]
    fn create_normalizes_tags_and_optional_fields() {
        let command = CreateRecordCommand {
            tags: vec!["Rust".into(), "rust ".into()],
            excerpt: Some("  ".into()),
            featured_image_url: Some("https://img.example.com/a.png".into()),
            ..create("Title", "body")
        };
        let params = command.validate().expect("valid");
        assert_eq!(params.tags.len(), 1);
        assert_eq!(params.excerpt, None);
        assert!(params.featured_image_url.is_some());
    }

    #[test]
    fn create_rejects_non_http_image_url() {
        let command = CreateRecordCommand {
            featured_image_url: Some("javascript:alert(1)".into()),
            ..create("Title", "body")
        };
        assert_eq!(command.validate().expect_err("url").field(), Some("url"));
    }

    #[test]
    fn empty_update_is_rejected() {
        let err = UpdateRecordCommand::default()
            .validate()
            .expect_err("empty patch");
        assert_eq!(err.field(), Some("patch"));
    }

    #[test]
    fn update_allows_clearing_excerpt() {
        let patch = UpdateRecordCommand {
            excerpt: Some(String::new()),
            ..Default::default()
        }
        .validate()
        .expect("valid");
        assert_eq!(patch.excerpt.as_deref(), Some(""));
    }

    #[test]
    fn update_publish_only_is_valid() {
        let patch = UpdateRecordCommand {
            published: Some(true),
            ..Default::default()
        }
        .validate()
        .expect("valid");
        assert!(patch.touches_aggregates());
    }

    #[test]
    fn comment_validation() {
        let ok = SubmitCommentCommand {
            author_name: " Ada ".into(),
            author_email: Some("ada@example.com".into()),
            body: "Nice post".into(),
            ..Default::default()
        }
        .validate("42")
        .expect("valid");
        assert_eq!(ok.author_name, "Ada");
        assert_eq!(ok.post_id, "42");

        let err = SubmitCommentCommand {
            author_name: "Ada".into(),
            author_email: Some("not-an-email".into()),
            body: "Nice post".into(),
            ..Default::default()
        }
        .validate("42")
        .expect_err("bad email");
        assert_eq!(err.field(), Some("author_email"));

        let err = SubmitCommentCommand {
            author_name: "Ada".into(),
            body: "x".repeat(5001),
            ..Default::default()
        }
        .validate("42")
        .expect_err("too long");
        assert_eq!(err.field(), Some("body"));
    }

    #[test]
    fn contact_requires_email_and_message() {
        let err = SubmitContactCommand {
            name: "Ada".into(),
            email: "ada".into(),
            message: "Hi".into(),
            ..Default::default()
        }
        .validate()
        .expect_err("bad email");
        assert_eq!(err.field(), Some("email"));

        let err = SubmitContactCommand {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            message: " ".into(),
            ..Default::default()
        }
        .validate()
        .expect_err("empty message");
        assert_eq!(err.field(), Some("message"));
    }
}
