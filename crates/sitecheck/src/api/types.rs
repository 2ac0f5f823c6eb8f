//! Request and response payloads of the application's HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Publication status of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Not visible to readers
    #[default]
    Draft,
    /// Visible to readers
    Published,
}

impl PostStatus {
    /// Query-string value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

/// SEO metadata attached to a post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoMeta {
    /// Title tag
    #[serde(default)]
    pub title: String,
    /// Meta description
    #[serde(default)]
    pub description: String,
    /// Meta keywords
    #[serde(default)]
    pub keywords: String,
}

/// Blog post as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    /// Identifier
    pub id: Value,
    /// Title
    pub title: String,
    /// Body
    pub content: String,
    /// Summary
    #[serde(default)]
    pub excerpt: String,
    /// Status
    pub status: PostStatus,
    /// Cover image URL
    #[serde(default)]
    pub featured_image: Option<String>,
    /// External link
    #[serde(default)]
    pub external_link: Option<String>,
    /// Hide the external link
    #[serde(default)]
    pub hide_link: bool,
    /// Likes
    #[serde(default)]
    pub likes_count: u64,
    /// Views
    #[serde(default)]
    pub views_count: u64,
    /// Creation time
    pub created_at: String,
    /// Last update
    pub updated_at: String,
    /// SEO metadata
    #[serde(default)]
    pub seo_meta: Option<SeoMeta>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl BlogPost {
    /// Identifier rendered for use in a path segment
    #[must_use]
    pub fn id_string(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// New or updated post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    /// Title
    pub title: String,
    /// Body
    pub content: String,
    /// Summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// Status
    pub status: PostStatus,
    /// Cover image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    /// External link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_link: Option<String>,
    /// Hide the external link
    pub hide_link: bool,
    /// SEO metadata
    pub seo_meta: SeoMeta,
}

/// Partial post update; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostPatch {
    /// Title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// Status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PostStatus>,
    /// Hide the external link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_link: Option<bool>,
}

/// Account role as the API names it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Administrator
    Admin,
    /// Regular user
    #[default]
    User,
}

/// User account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier
    pub id: Value,
    /// Display name
    pub name: String,
    /// Email
    pub email: String,
    /// Role
    pub role: UserRole,
    /// Creation time
    pub created_at: String,
    /// Last update
    pub updated_at: String,
}

/// Account to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Display name
    pub name: String,
    /// Email
    pub email: String,
    /// Password
    pub password: String,
    /// Role
    pub role: UserRole,
}

/// Successful login payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginData {
    /// Bearer token
    pub token: String,
    /// Logged-in account
    #[serde(default)]
    pub user: Option<User>,
}

/// Filters for listing posts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQuery {
    /// Only this status; all statuses when `None`
    pub status: Option<PostStatus>,
    /// Page size
    pub limit: Option<u32>,
    /// Offset
    pub offset: Option<u32>,
    /// Search term
    pub search: Option<String>,
}

impl PostQuery {
    /// Published posts matching `term`
    #[must_use]
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            status: Some(PostStatus::Published),
            search: Some(term.into()),
            ..Self::default()
        }
    }

    /// Query-string pairs
    #[must_use]
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        pairs
    }
}

/// One page of posts
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PostPage {
    /// Posts on this page
    #[serde(default, rename = "data")]
    pub posts: Vec<BlogPost>,
    /// Total matching posts
    #[serde(default)]
    pub total: u64,
    /// Raw pagination block
    #[serde(default)]
    pub pagination: Value,
}

/// Backend health response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    /// Expected to be `OK`
    pub status: String,
    /// Server time
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthStatus {
    /// Status reported for a healthy backend
    pub const EXPECTED: &'static str = "OK";

    /// Healthy and timestamped
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == Self::EXPECTED && self.timestamp.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_post_accepts_numeric_or_string_id() {
        let raw = r#"{"id": 12, "title": "t", "content": "c", "status": "published",
            "created_at": "x", "updated_at": "y", "seo_meta": null}"#;
        let post: BlogPost = serde_json::from_str(raw).unwrap();
        assert_eq!(post.id_string(), "12");
        assert!(post.seo_meta.is_none());

        let raw = raw.replace("12", "\"abc\"");
        let post: BlogPost = serde_json::from_str(&raw).unwrap();
        assert_eq!(post.id_string(), "abc");
    }

    #[test]
    fn test_query_pairs_skip_unset() {
        let q = PostQuery {
            limit: Some(100),
            ..PostQuery::default()
        };
        assert_eq!(q.pairs(), vec![("limit", "100".to_string())]);
        let s = PostQuery::search("rust");
        assert_eq!(s.pairs()[0], ("status", "published".to_string()));
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = PostPatch {
            title: Some("new".into()),
            ..PostPatch::default()
        };
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"title":"new"}"#);
    }

    #[test]
    fn test_health_requires_timestamp() {
        let ok = HealthStatus {
            status: "OK".into(),
            timestamp: Some("2026-01-01T00:00:00Z".into()),
        };
        assert!(ok.is_healthy());
        let no_ts = HealthStatus {
            timestamp: None,
            ..ok
        };
        assert!(!no_ts.is_healthy());
    }
}
