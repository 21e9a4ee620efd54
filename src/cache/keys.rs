//! Cache key definitions.
//!
//! A [`QueryKey`] is an ordered `(family, kind, params)` tuple, so prefix
//! invalidation is simply "every key whose leading components match".
//! [`TagGroup`]s let an entry be found by facts that are not part of its key,
//! such as the id of the record a slug lookup resolved to.

use std::fmt;

use crate::application::repos::{ContentQuery, ReadScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    Content,
    Comments,
}

impl Family {
    pub fn as_str(self) -> &'static str {
        match self {
            Family::Content => "content",
            Family::Comments => "comments",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKind {
    /// Published-record listings.
    List,
    /// Single record by slug.
    Detail,
    /// Tag listing.
    Tags,
    /// Approved comments of one post.
    Approved,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::List => "list",
            QueryKind::Detail => "detail",
            QueryKind::Tags => "tags",
            QueryKind::Approved => "approved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub family: Family,
    pub kind: QueryKind,
    pub params: Vec<String>,
}

impl QueryKey {
    pub fn new(family: Family, kind: QueryKind, params: Vec<String>) -> Self {
        Self {
            family,
            kind,
            params,
        }
    }

    /// Expects a normalized query.
    pub fn content_list(query: &ContentQuery) -> Self {
        Self::new(Family::Content, QueryKind::List, query.cache_params())
    }

    pub fn content_detail(slug: &str, scope: ReadScope) -> Self {
        Self::new(
            Family::Content,
            QueryKind::Detail,
            vec![scope.as_str().to_string(), slug.to_string()],
        )
    }

    pub fn tags() -> Self {
        Self::new(Family::Content, QueryKind::Tags, Vec::new())
    }

    pub fn approved_comments(post_id: &str) -> Self {
        Self::new(
            Family::Comments,
            QueryKind::Approved,
            vec![post_id.to_string()],
        )
    }

    pub fn starts_with(&self, prefix: &KeyPrefix) -> bool {
        if self.family != prefix.family {
            return false;
        }
        match prefix.kind {
            None => true,
            Some(kind) if kind != self.kind => false,
            Some(_) => self.params.starts_with(&prefix.params),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.family.as_str(), self.kind.as_str())?;
        for param in &self.params {
            write!(f, "/{param}")?;
        }
        Ok(())
    }
}

/// Leading components of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPrefix {
    pub family: Family,
    pub kind: Option<QueryKind>,
    pub params: Vec<String>,
}

impl KeyPrefix {
    pub fn family(family: Family) -> Self {
        Self {
            family,
            kind: None,
            params: Vec::new(),
        }
    }

    pub fn kind(family: Family, kind: QueryKind) -> Self {
        Self {
            family,
            kind: Some(kind),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.family.as_str())?;
        if let Some(kind) = self.kind {
            write!(f, "/{}", kind.as_str())?;
        }
        for param in &self.params {
            write!(f, "/{param}")?;
        }
        write!(f, "/*")
    }
}

/// Secondary index attached to an entry at write time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagGroup {
    /// Entries holding the record with this id.
    Record(String),
    /// Entries looked up by this slug, found or not.
    Slug(String),
}

impl fmt::Display for TagGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagGroup::Record(id) => write!(f, "record:{id}"),
            TagGroup::Slug(slug) => write!(f, "slug:{slug}"),
        }
    }
}
