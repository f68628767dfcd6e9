//! Wire types for the Flog client publishing API.
//!
//! Both the `flog` server and the `flog-cli` publishing client depend on this
//! crate so that payload shapes, URL layout and upload file naming cannot drift
//! apart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Root of every client API route.
pub const API_PREFIX: &str = "/client/api/v1";
/// Public URL prefix under which per-entry uploads are served.
pub const UPLOAD_URL_BASE: &str = "/static/uploads/entry";
/// Route prefix of the preview (draft) site.
pub const PREVIEW_PREFIX: &str = "/preview";
/// Name of the cookie carrying the operator session.
pub const SESSION_COOKIE: &str = "flog_session";

/// Front-matter keys accepted in an entry's meta mapping.
pub const META_FIELDS: &[&str] = &[
    "title",
    "author",
    "category",
    "tags",
    "public",
    "commentable",
    "unlocked",
    "archivable",
    "show_author",
    "show_date",
    "since",
    "until",
    "created",
];

/// Scalar entry fields. Absent fields leave the stored value untouched on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archivable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_author: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_date: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub since: Option<OffsetDateTime>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub until: Option<OffsetDateTime>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub created: Option<OffsetDateTime>,
}

impl EntryMeta {
    /// Whether the entry is meant to be publicly visible. Missing means draft.
    pub fn is_public(&self) -> bool {
        self.public.unwrap_or(false)
    }
}

/// Transport representation of an entry, used for writes and reads alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPayload {
    pub slug: String,
    #[serde(default)]
    pub meta: EntryMeta,
    #[serde(default)]
    pub lead: String,
    #[serde(default)]
    pub content: String,
}

/// Named batch of base64 encoded files stored under an entry slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub slug: String,
    pub files: BTreeMap<String, String>,
}

/// One sidebar module as authored in `sidebar.yaml` and sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarModule {
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarRequest {
    pub modules: Vec<SidebarModule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

/// Response envelope shared by every mutating endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiEnvelope {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }

    /// Failure without any detail, as returned by a rejected login.
    pub fn rejected() -> Self {
        Self {
            success: false,
            error: None,
        }
    }
}

/// Reduce an uploaded file name to a safe basename.
///
/// Directory components are dropped, whitespace runs become `_`, and only
/// ASCII alphanumerics plus `.`, `_` and `-` survive. Leading and trailing
/// dots and underscores are stripped, so the result may be empty.
pub fn secure_filename(name: &str) -> String {
    let basename = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let joined = basename.split_whitespace().collect::<Vec<_>>().join("_");
    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    filtered.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Public URL of an uploaded file belonging to `slug`.
pub fn upload_url(slug: &str, filename: &str) -> String {
    format!("{UPLOAD_URL_BASE}/{slug}/{filename}")
}

/// Path of an entry page, optionally under the preview prefix.
pub fn entry_path(slug: &str, preview: bool) -> String {
    if preview {
        format!("{PREVIEW_PREFIX}/entry/{slug}/")
    } else {
        format!("/entry/{slug}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_filename_strips_directories_and_symbols() {
        assert_eq!(secure_filename("../../etc/passwd"), "passwd");
        assert_eq!(secure_filename("my cool photo!.png"), "my_cool_photo.png");
        assert_eq!(secure_filename("C:\\tmp\\plot.1a2b3c4d.svg"), "plot.1a2b3c4d.svg");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn meta_rejects_unknown_fields() {
        let err = serde_json::from_str::<EntryMeta>(r#"{"title":"T","colour":"red"}"#)
            .expect_err("unknown field");
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn meta_serializes_only_present_fields() {
        let meta = EntryMeta {
            title: Some("Hello".into()),
            public: Some(false),
            ..EntryMeta::default()
        };
        let value = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(value, serde_json::json!({"title": "Hello", "public": false}));
    }

    #[test]
    fn meta_parses_rfc3339_timestamps() {
        let meta: EntryMeta =
            serde_json::from_str(r#"{"since":"2024-03-01T10:00:00Z"}"#).expect("parse");
        let since = meta.since.expect("since");
        assert_eq!(since.year(), 2024);
        assert_eq!(since.hour(), 10);
    }

    #[test]
    fn envelope_omits_missing_error() {
        let body = serde_json::to_string(&ApiEnvelope::ok()).expect("serialize");
        assert_eq!(body, r#"{"success":true}"#);
        let failure = ApiEnvelope::failure("boom");
        assert_eq!(failure.error.as_deref(), Some("boom"));
    }

    #[test]
    fn entry_paths_follow_visibility() {
        assert_eq!(entry_path("hello", false), "/entry/hello/");
        assert_eq!(entry_path("hello", true), "/preview/entry/hello/");
        assert_eq!(
            upload_url("hello", "a.png"),
            "/static/uploads/entry/hello/a.png"
        );
    }
}
