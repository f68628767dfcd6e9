//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{
    AuthorRecord, CategoryRecord, EntryRecord, SidebarModuleRecord, TagRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record `{key}`")]
    Duplicate { key: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait EntriesRepo: Send + Sync {
    /// Fails with [`RepoError::Duplicate`] when the slug is taken.
    async fn insert_entry(&self, entry: EntryRecord) -> Result<(), RepoError>;

    /// Fails with [`RepoError::NotFound`] when no entry has this slug.
    async fn replace_entry(&self, entry: EntryRecord) -> Result<(), RepoError>;

    async fn find_entry(&self, slug: &str) -> Result<Option<EntryRecord>, RepoError>;

    async fn delete_entry(&self, slug: &str) -> Result<(), RepoError>;

    /// Every entry, newest `created` first.
    async fn list_entries(&self) -> Result<Vec<EntryRecord>, RepoError>;
}

#[async_trait]
pub trait TaxonomyRepo: Send + Sync {
    async fn find_author(&self, name: &str) -> Result<Option<AuthorRecord>, RepoError>;

    async fn insert_author(&self, author: AuthorRecord) -> Result<(), RepoError>;

    async fn find_tag(&self, slug: &str) -> Result<Option<TagRecord>, RepoError>;

    async fn insert_tag(&self, tag: TagRecord) -> Result<(), RepoError>;

    /// Look a category up by its name or its slug.
    async fn find_category(&self, name: &str) -> Result<Option<CategoryRecord>, RepoError>;

    async fn insert_category(&self, category: CategoryRecord) -> Result<(), RepoError>;

    /// Categories in the order they were configured.
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError>;
}

#[async_trait]
pub trait SidebarRepo: Send + Sync {
    /// Drop every stored module and store `modules` in their place.
    async fn replace_modules(&self, modules: Vec<SidebarModuleRecord>) -> Result<(), RepoError>;

    /// Stored modules ordered by `index`.
    async fn list_modules(&self) -> Result<Vec<SidebarModuleRecord>, RepoError>;
}
