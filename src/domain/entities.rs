//! Domain entities held by the repositories.

use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryRecord {
    pub slug: String,
    pub title: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub public: bool,
    pub commentable: bool,
    pub unlocked: bool,
    pub archivable: bool,
    pub show_author: bool,
    pub show_date: bool,
    pub since: Option<OffsetDateTime>,
    pub until: Option<OffsetDateTime>,
    pub created: OffsetDateTime,
    pub modified: OffsetDateTime,
    pub lead: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRecord {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRecord {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarModuleRecord {
    pub title: String,
    pub text: String,
    pub visible: bool,
    pub index: i32,
}
