//! Entry writes and reads for the client publishing API.

use std::sync::Arc;

use flog_api_types::{EntryMeta, EntryPayload};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::{
    application::repos::{EntriesRepo, RepoError, TaxonomyRepo},
    domain::{
        entities::{AuthorRecord, EntryRecord, TagRecord},
        slug::{SlugError, derive_slug, validate_entry_slug},
    },
};

const SOURCE: &str = "application::entries";

#[derive(Debug, Error)]
pub enum EntryWriteError {
    #[error("{0}")]
    Slug(#[from] SlugError),
    #[error("category \"{name}\" does not exist")]
    UnknownCategory { name: String },
    #[error("tag `{name}` cannot be turned into a slug")]
    InvalidTag { name: String },
    #[error("entry `{slug}` does not exist")]
    NotFound { slug: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl EntryWriteError {
    /// Whether the failure was caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Repo(RepoError::Persistence(_)))
    }
}

/// Taxonomy references resolved against the repositories.
struct ResolvedFields {
    author: Option<String>,
    category: Option<String>,
    tags: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct EntryService {
    entries: Arc<dyn EntriesRepo>,
    taxonomy: Arc<dyn TaxonomyRepo>,
}

impl EntryService {
    pub fn new(entries: Arc<dyn EntriesRepo>, taxonomy: Arc<dyn TaxonomyRepo>) -> Self {
        Self { entries, taxonomy }
    }

    /// Create the entry, or update it when the slug is already taken.
    pub async fn upsert(&self, payload: EntryPayload) -> Result<(), EntryWriteError> {
        validate_entry_slug(&payload.slug)?;
        let now = OffsetDateTime::now_utc();
        let resolved = self.resolve_fields(&payload.meta).await?;

        let record = new_record(&payload, &resolved, now);
        match self.entries.insert_entry(record).await {
            Ok(()) => {
                info!(target = SOURCE, slug = %payload.slug, "entry created");
                Ok(())
            }
            Err(RepoError::Duplicate { .. }) => self.apply_update(payload, resolved, now).await,
            Err(other) => Err(other.into()),
        }
    }

    pub async fn update(&self, payload: EntryPayload) -> Result<(), EntryWriteError> {
        validate_entry_slug(&payload.slug)?;
        let now = OffsetDateTime::now_utc();
        let resolved = self.resolve_fields(&payload.meta).await?;
        self.apply_update(payload, resolved, now).await
    }

    pub async fn read(&self, slug: &str) -> Result<Option<EntryPayload>, RepoError> {
        Ok(self.entries.find_entry(slug).await?.map(to_payload))
    }

    pub async fn delete(&self, slug: &str) -> Result<(), EntryWriteError> {
        match self.entries.delete_entry(slug).await {
            Ok(()) => {
                info!(target = SOURCE, slug, "entry deleted");
                Ok(())
            }
            Err(RepoError::NotFound) => Err(EntryWriteError::NotFound {
                slug: slug.to_string(),
            }),
            Err(other) => Err(other.into()),
        }
    }

    async fn apply_update(
        &self,
        payload: EntryPayload,
        resolved: ResolvedFields,
        now: OffsetDateTime,
    ) -> Result<(), EntryWriteError> {
        let Some(mut record) = self.entries.find_entry(&payload.slug).await? else {
            return Err(EntryWriteError::NotFound { slug: payload.slug });
        };

        let meta = &payload.meta;
        if let Some(title) = &meta.title {
            record.title = title.clone();
        }
        if resolved.author.is_some() {
            record.author = resolved.author;
        }
        if resolved.category.is_some() {
            record.category = resolved.category;
        }
        if let Some(tags) = resolved.tags {
            record.tags = tags;
        }
        overwrite(&mut record.public, meta.public);
        overwrite(&mut record.commentable, meta.commentable);
        overwrite(&mut record.unlocked, meta.unlocked);
        overwrite(&mut record.archivable, meta.archivable);
        overwrite(&mut record.show_author, meta.show_author);
        overwrite(&mut record.show_date, meta.show_date);
        if meta.since.is_some() {
            record.since = meta.since;
        }
        if meta.until.is_some() {
            record.until = meta.until;
        }
        overwrite(&mut record.created, meta.created);
        record.modified = now;
        record.lead = payload.lead;
        record.content = payload.content;

        match self.entries.replace_entry(record).await {
            Ok(()) => {
                info!(target = SOURCE, slug = %payload.slug, "entry updated");
                Ok(())
            }
            Err(RepoError::NotFound) => Err(EntryWriteError::NotFound { slug: payload.slug }),
            Err(other) => Err(other.into()),
        }
    }

    async fn resolve_fields(&self, meta: &EntryMeta) -> Result<ResolvedFields, EntryWriteError> {
        let author = match &meta.author {
            Some(name) => Some(self.resolve_author(name).await?),
            None => None,
        };

        let category = match &meta.category {
            Some(name) => {
                let found = self.taxonomy.find_category(name).await?;
                let category = found.ok_or_else(|| EntryWriteError::UnknownCategory {
                    name: name.clone(),
                })?;
                Some(category.name)
            }
            None => None,
        };

        let tags = match &meta.tags {
            Some(names) => {
                let mut resolved: Vec<String> = Vec::with_capacity(names.len());
                for name in names {
                    let tag = self.resolve_tag(name).await?;
                    if !resolved.contains(&tag) {
                        resolved.push(tag);
                    }
                }
                Some(resolved)
            }
            None => None,
        };

        Ok(ResolvedFields {
            author,
            category,
            tags,
        })
    }

    async fn resolve_author(&self, name: &str) -> Result<String, EntryWriteError> {
        if let Some(author) = self.taxonomy.find_author(name).await? {
            return Ok(author.name);
        }
        let author = AuthorRecord {
            name: name.to_string(),
        };
        self.taxonomy.insert_author(author).await?;
        info!(target = SOURCE, author = name, "author created");
        Ok(name.to_string())
    }

    async fn resolve_tag(&self, name: &str) -> Result<String, EntryWriteError> {
        let slug = derive_slug(name).map_err(|_| EntryWriteError::InvalidTag {
            name: name.to_string(),
        })?;
        if let Some(tag) = self.taxonomy.find_tag(&slug).await? {
            return Ok(tag.name);
        }
        let tag = TagRecord {
            name: name.to_string(),
            slug,
        };
        self.taxonomy.insert_tag(tag).await?;
        info!(target = SOURCE, tag = name, "tag created");
        Ok(name.to_string())
    }
}

fn overwrite<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn new_record(payload: &EntryPayload, resolved: &ResolvedFields, now: OffsetDateTime) -> EntryRecord {
    let meta = &payload.meta;
    EntryRecord {
        slug: payload.slug.clone(),
        title: meta.title.clone().unwrap_or_else(|| payload.slug.clone()),
        author: resolved.author.clone(),
        category: resolved.category.clone(),
        tags: resolved.tags.clone().unwrap_or_default(),
        public: meta.public.unwrap_or(false),
        commentable: meta.commentable.unwrap_or(false),
        unlocked: meta.unlocked.unwrap_or(false),
        archivable: meta.archivable.unwrap_or(false),
        show_author: meta.show_author.unwrap_or(false),
        show_date: meta.show_date.unwrap_or(true),
        since: meta.since,
        until: meta.until,
        created: meta.created.unwrap_or(now),
        modified: now,
        lead: payload.lead.clone(),
        content: payload.content.clone(),
    }
}

fn to_payload(record: EntryRecord) -> EntryPayload {
    let meta = EntryMeta {
        title: Some(record.title),
        author: record.author,
        category: record.category,
        tags: Some(record.tags),
        public: Some(record.public),
        commentable: Some(record.commentable),
        unlocked: Some(record.unlocked),
        archivable: Some(record.archivable),
        show_author: Some(record.show_author),
        show_date: Some(record.show_date),
        since: record.since,
        until: record.until,
        created: Some(record.created),
    };
    EntryPayload {
        slug: record.slug,
        meta,
        lead: record.lead,
        content: record.content,
    }
}
