//! PostgREST-style content backend over HTTP.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, ContactRepo, ContactUpdate, ContentPage, ContentPatch, ContentQuery,
    ContentReadRepo, ContentWriteRepo, NewComment, NewContactMessage, NewContentRecord, ReadScope,
    RepoError,
};
use crate::domain::entities::{Comment, ContactMessage, ContentRecord};
use crate::domain::types::{CommentStatus, ContactStatus};
use crate::infra::error::InfraError;

const POSTS: &str = "posts";
const COMMENTS: &str = "comments";
const CONTACT_MESSAGES: &str = "contact_messages";

const UNIQUE_VIOLATION: &str = "23505";
const NO_ROWS: &str = "PGRST116";

#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base: Url,
}

impl RestBackend {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let mut base = Url::parse(base_url)
            .map_err(|err| InfraError::configuration(format!("invalid backend url: {err}")))?;
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|err| InfraError::configuration(format!("invalid api key: {err}")))?;
            headers.insert("apikey", value);
            let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|err| InfraError::configuration(format!("invalid api key: {err}")))?;
            headers.insert(reqwest::header::AUTHORIZATION, bearer);
        }

        let client = Client::builder()
            .user_agent(format!("folio/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::backend(err.to_string()))?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn table(&self, name: &str) -> Result<Url, RepoError> {
        self.base
            .join(&format!("rest/v1/{name}"))
            .map_err(|err| RepoError::InvalidInput {
                message: format!("invalid backend path: {err}"),
            })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RepoError> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, RepoError> {
        let response = self.send(builder).await?;
        decode(response).await
    }

    async fn returning_one<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, RepoError> {
        let rows: Vec<T> = self
            .fetch(builder.header("Prefer", "return=representation"))
            .await?;
        rows.into_iter().next().ok_or(RepoError::NotFound)
    }
}

fn transport_error(err: reqwest::Error) -> RepoError {
    if err.is_timeout() {
        RepoError::Timeout
    } else if err.is_decode() {
        RepoError::Decode(err.to_string())
    } else {
        RepoError::unavailable(err)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
    details: Option<String>,
}

fn status_error(status: StatusCode, body: &[u8]) -> RepoError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
    let message = if message.is_empty() {
        status.to_string()
    } else {
        message
    };

    match parsed.code.as_deref() {
        Some(UNIQUE_VIOLATION) => {
            return RepoError::Duplicate {
                constraint: parsed.details.unwrap_or(message),
            };
        }
        Some(NO_ROWS) => return RepoError::NotFound,
        _ => {}
    }

    match status {
        StatusCode::NOT_FOUND => RepoError::NotFound,
        StatusCode::CONFLICT => RepoError::Duplicate {
            constraint: message,
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            RepoError::InvalidInput { message }
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RepoError::Timeout,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
            RepoError::Unavailable(message)
        }
        _ => RepoError::backend(
            message,
            parsed.code.or_else(|| Some(status.as_u16().to_string())),
        ),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RepoError> {
    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes).map_err(|err| RepoError::Decode(err.to_string()))
}

/// Total from a `Content-Range: 0-9/42` header; `*` means unknown.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::CONTENT_RANGE)?
        .to_str()
        .ok()?
        .rsplit_once('/')?
        .1
        .parse()
        .ok()
}

/// Listings ask for `count=exact`; a response without a usable total is
/// malformed rather than something to estimate from the page.
fn page_total(headers: &HeaderMap) -> Result<u64, RepoError> {
    content_range_total(headers)
        .ok_or_else(|| RepoError::Decode("missing exact count in Content-Range".into()))
}

fn quote_filter_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn list_filters(query: &ContentQuery) -> Vec<(String, String)> {
    let mut pairs = vec![
        ("select".to_string(), "*".to_string()),
        ("published".to_string(), "eq.true".to_string()),
        ("order".to_string(), "created_at.desc,slug.asc".to_string()),
        ("offset".to_string(), query.offset.to_string()),
    ];
    if let Some(limit) = query.limit {
        pairs.push(("limit".to_string(), limit.to_string()));
    }
    if !query.tags.is_empty() {
        let tags = query
            .tags
            .iter()
            .map(|tag| quote_filter_value(tag))
            .collect::<Vec<_>>()
            .join(",");
        pairs.push(("tags".to_string(), format!("ov.{{{tags}}}")));
    }
    if let Some(search) = query.search.as_deref() {
        let pattern = quote_filter_value(&format!("*{search}*"));
        pairs.push((
            "or".to_string(),
            format!("(title.ilike.{pattern},excerpt.ilike.{pattern},body.ilike.{pattern})"),
        ));
    }
    pairs
}

/// Row as stored remotely; nullable columns get the snapshot's defaults.
#[derive(Debug, Deserialize)]
struct PostRow {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
    slug: String,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    tags: Option<BTreeSet<String>>,
    #[serde(default)]
    published: bool,
    #[serde(default)]
    featured_image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    updated_at: Option<OffsetDateTime>,
}

impl From<PostRow> for ContentRecord {
    fn from(row: PostRow) -> Self {
        ContentRecord {
            id: row.id,
            slug: row.slug,
            title: row.title,
            body: row.body.unwrap_or_default(),
            excerpt: row.excerpt,
            tags: row.tags.unwrap_or_default(),
            published: row.published,
            featured_image_url: row.featured_image_url,
            created_at: row.created_at,
            updated_at: row.updated_at.unwrap_or(row.created_at),
            reading_time_minutes: 0,
        }
        .with_derived_fields()
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct TagsRow {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

fn now_rfc3339() -> Result<String, RepoError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| RepoError::Decode(err.to_string()))
}

fn patch_body(patch: &ContentPatch) -> Result<Value, RepoError> {
    let mut body = Map::new();
    if let Some(slug) = &patch.slug {
        body.insert("slug".into(), json!(slug));
    }
    if let Some(title) = &patch.title {
        body.insert("title".into(), json!(title));
    }
    if let Some(content) = &patch.body {
        body.insert("body".into(), json!(content));
    }
    if let Some(excerpt) = &patch.excerpt {
        let value = (!excerpt.is_empty()).then_some(excerpt);
        body.insert("excerpt".into(), json!(value));
    }
    if let Some(tags) = &patch.tags {
        body.insert("tags".into(), json!(tags));
    }
    if let Some(published) = patch.published {
        body.insert("published".into(), json!(published));
    }
    if let Some(url) = &patch.featured_image_url {
        let value = (!url.is_empty()).then_some(url);
        body.insert("featured_image_url".into(), json!(value));
    }
    body.insert("updated_at".into(), json!(now_rfc3339()?));
    Ok(Value::Object(body))
}

#[async_trait]
impl ContentReadRepo for RestBackend {
    #[instrument(skip(self))]
    async fn list_published(&self, query: &ContentQuery) -> Result<ContentPage, RepoError> {
        let mut url = self.table(POSTS)?;
        url.query_pairs_mut().extend_pairs(list_filters(query));

        let response = self
            .send(
                self.request(Method::GET, url)
                    .header("Prefer", "count=exact"),
            )
            .await?;
        let total = page_total(response.headers())?;
        let rows: Vec<PostRow> = decode(response).await?;
        let items: Vec<ContentRecord> = rows.into_iter().map(ContentRecord::from).collect();

        debug!(items = items.len(), total, "listed published records");
        Ok(ContentPage { items, total })
    }

    #[instrument(skip(self))]
    async fn find_by_slug(
        &self,
        slug: &str,
        scope: ReadScope,
    ) -> Result<Option<ContentRecord>, RepoError> {
        let mut url = self.table(POSTS)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");
            pairs.append_pair("slug", &format!("eq.{slug}"));
            if scope == ReadScope::Public {
                pairs.append_pair("published", "eq.true");
            }
            pairs.append_pair("limit", "1");
        }

        let rows: Vec<PostRow> = self.fetch(self.request(Method::GET, url)).await?;
        Ok(rows.into_iter().next().map(ContentRecord::from))
    }

    #[instrument(skip(self))]
    async fn list_tags(&self) -> Result<Vec<String>, RepoError> {
        let mut url = self.table(POSTS)?;
        url.query_pairs_mut()
            .append_pair("select", "tags")
            .append_pair("published", "eq.true");

        let rows: Vec<TagsRow> = self.fetch(self.request(Method::GET, url)).await?;
        Ok(rows
            .into_iter()
            .flat_map(|row| row.tags.unwrap_or_default())
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }
}

#[async_trait]
impl ContentWriteRepo for RestBackend {
    #[instrument(skip(self, params), fields(slug = %params.slug))]
    async fn create_record(&self, params: NewContentRecord) -> Result<ContentRecord, RepoError> {
        let url = self.table(POSTS)?;
        let now = now_rfc3339()?;
        let body = json!({
            "slug": params.slug,
            "title": params.title,
            "body": params.body,
            "excerpt": params.excerpt,
            "tags": params.tags,
            "published": params.published,
            "featured_image_url": params.featured_image_url,
            "created_at": now,
            "updated_at": now,
        });

        let row: PostRow = self
            .returning_one(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(row.into())
    }

    #[instrument(skip(self, patch))]
    async fn update_record(&self, id: &str, patch: ContentPatch) -> Result<ContentRecord, RepoError> {
        let mut url = self.table(POSTS)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        let body = patch_body(&patch)?;

        let row: PostRow = self
            .returning_one(self.request(Method::PATCH, url).json(&body))
            .await?;
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete_record(&self, id: &str) -> Result<(), RepoError> {
        let mut url = self.table(POSTS)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));

        let _row: PostRow = self.returning_one(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_published(&self, id: &str, published: bool) -> Result<ContentRecord, RepoError> {
        let patch = ContentPatch {
            published: Some(published),
            ..Default::default()
        };
        self.update_record(id, patch).await
    }
}

#[derive(Debug, Deserialize)]
struct CommentRow {
    id: Uuid,
    #[serde(deserialize_with = "id_as_string")]
    post_id: String,
    author_name: String,
    #[serde(default)]
    author_email: Option<String>,
    #[serde(default)]
    author_website: Option<String>,
    #[serde(alias = "content")]
    body: String,
    #[serde(default)]
    status: CommentStatus,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            post_id: row.post_id,
            author_name: row.author_name,
            author_email: row.author_email,
            author_website: row.author_website,
            body: row.body,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CommentsRepo for RestBackend {
    #[instrument(skip(self))]
    async fn list_approved(&self, post_id: &str) -> Result<Vec<Comment>, RepoError> {
        let mut url = self.table(COMMENTS)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("post_id", &format!("eq.{post_id}"))
            .append_pair("status", &format!("eq.{}", CommentStatus::Approved.as_str()))
            .append_pair("order", "created_at.asc");

        let rows: Vec<CommentRow> = self.fetch(self.request(Method::GET, url)).await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    #[instrument(skip(self, params), fields(post_id = %params.post_id))]
    async fn create_comment(&self, params: NewComment) -> Result<Comment, RepoError> {
        let url = self.table(COMMENTS)?;
        let body = json!({
            "post_id": params.post_id,
            "author_name": params.author_name,
            "author_email": params.author_email,
            "author_website": params.author_website,
            "body": params.body,
            "status": CommentStatus::Pending.as_str(),
        });

        let row: CommentRow = self
            .returning_one(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn set_comment_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Comment, RepoError> {
        let mut url = self.table(COMMENTS)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));

        let row: CommentRow = self
            .returning_one(
                self.request(Method::PATCH, url)
                    .json(&json!({ "status": status.as_str() })),
            )
            .await?;
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete_comment(&self, id: Uuid) -> Result<Comment, RepoError> {
        let mut url = self.table(COMMENTS)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));

        let row: CommentRow = self.returning_one(self.request(Method::DELETE, url)).await?;
        Ok(row.into())
    }
}

#[async_trait]
impl ContactRepo for RestBackend {
    #[instrument(skip(self, params))]
    async fn submit_contact(&self, params: NewContactMessage) -> Result<ContactMessage, RepoError> {
        let url = self.table(CONTACT_MESSAGES)?;
        let now = now_rfc3339()?;
        let body = json!({
            "name": params.name,
            "email": params.email,
            "subject": params.subject,
            "message": params.message,
            "status": ContactStatus::Unread.as_str(),
            "created_at": now,
            "updated_at": now,
        });

        self.returning_one(self.request(Method::POST, url).json(&body))
            .await
    }

    #[instrument(skip(self, update))]
    async fn update_contact(
        &self,
        id: Uuid,
        update: ContactUpdate,
    ) -> Result<ContactMessage, RepoError> {
        let mut url = self.table(CONTACT_MESSAGES)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));

        let mut body = Map::new();
        body.insert("status".into(), json!(update.status.as_str()));
        if let Some(notes) = update.admin_notes {
            body.insert("admin_notes".into(), json!(notes));
        }
        body.insert("updated_at".into(), json!(now_rfc3339()?));

        self.returning_one(self.request(Method::PATCH, url).json(&Value::Object(body)))
            .await
    }
}
