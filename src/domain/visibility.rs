//! Which entries a site view may show, and under which URL prefix.

use flog_api_types::{PREVIEW_PREFIX, entry_path};
use time::OffsetDateTime;

use crate::domain::entities::EntryRecord;

/// The two renderings of the site. Handlers take the mode as a value instead of
/// being duplicated per audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityMode {
    Public,
    Preview,
}

impl VisibilityMode {
    pub fn is_preview(self) -> bool {
        matches!(self, Self::Preview)
    }

    pub fn index_href(self) -> String {
        self.href("/")
    }

    /// Site path under this mode's prefix; `path` starts with `/`.
    pub fn href(self, path: &str) -> String {
        match self {
            Self::Public => path.to_string(),
            Self::Preview => format!("{PREVIEW_PREFIX}{path}"),
        }
    }

    pub fn tag_href(self, slug: &str) -> String {
        self.href(&format!("/tag/{slug}/"))
    }

    /// First pages keep the short form.
    pub fn category_href(self, slug: &str, page: usize) -> String {
        if page <= 1 {
            self.href(&format!("/category/{slug}/"))
        } else {
            self.href(&format!("/category/{slug}/{page}/"))
        }
    }

    pub fn entry_href(self, slug: &str) -> String {
        entry_path(slug, self.is_preview())
    }

    /// Whether the entry appears on this mode's index page.
    pub fn lists(self, entry: &EntryRecord, now: OffsetDateTime) -> bool {
        match self {
            Self::Public => is_live(entry, now),
            Self::Preview => !expired(entry, now),
        }
    }

    /// Whether the entry's own page can be opened in this mode.
    pub fn shows(self, entry: &EntryRecord, now: OffsetDateTime) -> bool {
        match self {
            Self::Public => is_live(entry, now),
            Self::Preview => true,
        }
    }
}

fn is_live(entry: &EntryRecord, now: OffsetDateTime) -> bool {
    entry.public && entry.since.is_none_or(|since| since <= now) && !expired(entry, now)
}

fn expired(entry: &EntryRecord, now: OffsetDateTime) -> bool {
    entry.until.is_some_and(|until| until < now)
}
