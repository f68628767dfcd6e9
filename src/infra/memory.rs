//! In-memory repository adapter for a single-operator deployment.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    application::repos::{EntriesRepo, RepoError, SidebarRepo, TaxonomyRepo},
    domain::{
        entities::{AuthorRecord, CategoryRecord, EntryRecord, SidebarModuleRecord, TagRecord},
        slug::derive_slug,
    },
};

#[derive(Default)]
struct Taxonomy {
    authors: BTreeMap<String, AuthorRecord>,
    tags: BTreeMap<String, TagRecord>,
    categories: Vec<CategoryRecord>,
}

#[derive(Default)]
pub struct InMemoryRepositories {
    entries: RwLock<BTreeMap<String, EntryRecord>>,
    taxonomy: RwLock<Taxonomy>,
    sidebar: RwLock<Vec<SidebarModuleRecord>>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the configured categories. Existing categories are kept.
    pub async fn seed_categories(&self, names: &[String]) -> Result<(), RepoError> {
        for name in names {
            let slug = derive_slug(name).map_err(|err| RepoError::InvalidInput {
                message: format!("category `{name}`: {err}"),
            })?;
            let category = CategoryRecord {
                name: name.clone(),
                slug,
            };
            match self.insert_category(category).await {
                Ok(()) | Err(RepoError::Duplicate { .. }) => {}
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EntriesRepo for InMemoryRepositories {
    async fn insert_entry(&self, entry: EntryRecord) -> Result<(), RepoError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.slug) {
            return Err(RepoError::Duplicate { key: entry.slug });
        }
        entries.insert(entry.slug.clone(), entry);
        Ok(())
    }

    async fn replace_entry(&self, entry: EntryRecord) -> Result<(), RepoError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&entry.slug) {
            Some(slot) => {
                *slot = entry;
                Ok(())
            }
            None => Err(RepoError::NotFound),
        }
    }

    async fn find_entry(&self, slug: &str) -> Result<Option<EntryRecord>, RepoError> {
        Ok(self.entries.read().await.get(slug).cloned())
    }

    async fn delete_entry(&self, slug: &str) -> Result<(), RepoError> {
        match self.entries.write().await.remove(slug) {
            Some(_) => Ok(()),
            None => Err(RepoError::NotFound),
        }
    }

    async fn list_entries(&self) -> Result<Vec<EntryRecord>, RepoError> {
        let mut entries: Vec<EntryRecord> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.slug.cmp(&b.slug)));
        Ok(entries)
    }
}

#[async_trait]
impl TaxonomyRepo for InMemoryRepositories {
    async fn find_author(&self, name: &str) -> Result<Option<AuthorRecord>, RepoError> {
        Ok(self.taxonomy.read().await.authors.get(name).cloned())
    }

    async fn insert_author(&self, author: AuthorRecord) -> Result<(), RepoError> {
        let mut taxonomy = self.taxonomy.write().await;
        if taxonomy.authors.contains_key(&author.name) {
            return Err(RepoError::Duplicate { key: author.name });
        }
        taxonomy.authors.insert(author.name.clone(), author);
        Ok(())
    }

    async fn find_tag(&self, slug: &str) -> Result<Option<TagRecord>, RepoError> {
        Ok(self.taxonomy.read().await.tags.get(slug).cloned())
    }

    async fn insert_tag(&self, tag: TagRecord) -> Result<(), RepoError> {
        let mut taxonomy = self.taxonomy.write().await;
        if taxonomy.tags.contains_key(&tag.slug) {
            return Err(RepoError::Duplicate { key: tag.slug });
        }
        taxonomy.tags.insert(tag.slug.clone(), tag);
        Ok(())
    }

    async fn find_category(&self, name: &str) -> Result<Option<CategoryRecord>, RepoError> {
        let slug = derive_slug(name).ok();
        let taxonomy = self.taxonomy.read().await;
        Ok(taxonomy
            .categories
            .iter()
            .find(|category| {
                category.name == name || slug.as_deref() == Some(category.slug.as_str())
            })
            .cloned())
    }

    async fn insert_category(&self, category: CategoryRecord) -> Result<(), RepoError> {
        let mut taxonomy = self.taxonomy.write().await;
        if taxonomy
            .categories
            .iter()
            .any(|existing| existing.slug == category.slug)
        {
            return Err(RepoError::Duplicate { key: category.slug });
        }
        taxonomy.categories.push(category);
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        Ok(self.taxonomy.read().await.categories.clone())
    }
}

#[async_trait]
impl SidebarRepo for InMemoryRepositories {
    async fn replace_modules(&self, modules: Vec<SidebarModuleRecord>) -> Result<(), RepoError> {
        *self.sidebar.write().await = modules;
        Ok(())
    }

    async fn list_modules(&self) -> Result<Vec<SidebarModuleRecord>, RepoError> {
        let mut modules = self.sidebar.read().await.clone();
        // stable: equal indexes keep insertion order
        modules.sort_by_key(|module| module.index);
        Ok(modules)
    }
}
