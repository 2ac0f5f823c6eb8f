//! Structural checks on raw API JSON.
//!
//! These look only at member presence, so they work on responses whose
//! field types drift between backend versions.

use crate::result::{SiteError, SiteResult};
use serde_json::Value;

fn require(value: &Value, what: &str, keys: &[&str]) -> SiteResult<()> {
    let Some(object) = value.as_object() else {
        return Err(SiteError::AssertionFailed {
            message: format!("{what} is not an object"),
        });
    };
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|k| !object.contains_key(*k))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SiteError::AssertionFailed {
            message: format!("{what} is missing {}", missing.join(", ")),
        })
    }
}

/// `{ success: true, data }`
pub fn success_envelope(body: &Value) -> SiteResult<()> {
    require(body, "success response", &["success", "data"])?;
    if body["success"] != Value::Bool(true) {
        return Err(SiteError::AssertionFailed {
            message: "success response has success != true".to_string(),
        });
    }
    Ok(())
}

/// `{ success: false, error }`
pub fn error_envelope(body: &Value) -> SiteResult<()> {
    require(body, "error response", &["success", "error"])?;
    if body["success"] != Value::Bool(false) {
        return Err(SiteError::AssertionFailed {
            message: "error response has success != false".to_string(),
        });
    }
    Ok(())
}

/// Blog post members; `seo_meta` may be null or carry its own members
pub fn blog_post(post: &Value) -> SiteResult<()> {
    require(
        post,
        "blog post",
        &["id", "title", "content", "status", "created_at", "updated_at", "seo_meta"],
    )?;
    match &post["seo_meta"] {
        Value::Null => Ok(()),
        seo => require(seo, "seo_meta", &["title", "description", "keywords"]),
    }
}

/// User members
pub fn user(user: &Value) -> SiteResult<()> {
    require(
        user,
        "user",
        &["id", "name", "email", "role", "created_at", "updated_at"],
    )
}

/// Pagination members
pub fn pagination(pagination: &Value) -> SiteResult<()> {
    require(pagination, "pagination", &["page", "limit", "total", "pages"])
}
