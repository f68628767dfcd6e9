//! View models for the public and preview renderings of the site.

use std::sync::Arc;

use time::{
    OffsetDateTime, format_description::BorrowedFormatItem, format_description::well_known::Rfc3339,
    macros::format_description,
};

use crate::{
    application::{
        error::HttpError,
        repos::{EntriesRepo, TaxonomyRepo},
        sidebar::SidebarService,
    },
    config::SiteSettings,
    domain::{entities::EntryRecord, slug::derive_slug, visibility::VisibilityMode},
    presentation::views::{
        ArchiveItem, ArchiveView, ArchiveYear, BrandView, EntryCard, EntryDetailView, IndexView,
        LayoutChrome, ListingView, NavLink, SidebarModuleView,
    },
};

pub const FEED_PATH: &str = "/atom-feed-entries";

const DISPLAY_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");
const ARCHIVE_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Clone)]
pub struct SiteService {
    entries: Arc<dyn EntriesRepo>,
    taxonomy: Arc<dyn TaxonomyRepo>,
    sidebar: SidebarService,
    title: String,
    per_page: usize,
}

impl SiteService {
    pub fn new(
        entries: Arc<dyn EntriesRepo>,
        taxonomy: Arc<dyn TaxonomyRepo>,
        sidebar: SidebarService,
        settings: &SiteSettings,
    ) -> Self {
        Self {
            entries,
            taxonomy,
            sidebar,
            title: settings.title.clone(),
            per_page: settings.entries_per_page.get(),
        }
    }

    pub async fn chrome(&self, mode: VisibilityMode) -> Result<LayoutChrome, HttpError> {
        let sidebar = self
            .sidebar
            .visible()
            .await?
            .into_iter()
            .map(|module| SidebarModuleView {
                title: module.title,
                html: module.text,
            })
            .collect();

        let categories = self
            .taxonomy
            .list_categories()
            .await?
            .into_iter()
            .map(|category| NavLink {
                href: mode.category_href(&category.slug, 1),
                label: category.name,
            })
            .collect();

        Ok(LayoutChrome {
            brand: BrandView {
                title: self.title.clone(),
                href: mode.index_href(),
            },
            categories,
            archives_href: mode.href("/archives/"),
            feed_href: mode.href(FEED_PATH),
            sidebar,
            preview: mode.is_preview(),
        })
    }

    pub async fn index(
        &self,
        mode: VisibilityMode,
        now: OffsetDateTime,
    ) -> Result<IndexView, HttpError> {
        let entries = self
            .listed(mode, now)
            .await?
            .into_iter()
            .map(|entry| card(mode, entry))
            .collect();

        Ok(IndexView { entries })
    }

    /// Every listed entry carrying the tag. `None` when no tag has this slug.
    pub async fn tag(
        &self,
        mode: VisibilityMode,
        slug: &str,
        now: OffsetDateTime,
    ) -> Result<Option<ListingView>, HttpError> {
        let Some(tag) = self.taxonomy.find_tag(slug).await? else {
            return Ok(None);
        };

        let entries = self
            .listed(mode, now)
            .await?
            .into_iter()
            .filter(|entry| entry.tags.contains(&tag.name))
            .map(|entry| card(mode, entry))
            .collect();

        Ok(Some(ListingView {
            heading: format!("#{}", tag.name),
            entries,
            newer: None,
            older: None,
        }))
    }

    /// One page of a category, counting pages from 1. `None` for an unknown
    /// category or a page past the last one; the first page always exists.
    pub async fn category(
        &self,
        mode: VisibilityMode,
        slug: &str,
        page: usize,
        now: OffsetDateTime,
    ) -> Result<Option<ListingView>, HttpError> {
        if page == 0 {
            return Ok(None);
        }
        let Some(category) = self.taxonomy.find_category(slug).await? else {
            return Ok(None);
        };
        if category.slug != slug {
            return Ok(None);
        }

        let matching: Vec<EntryRecord> = self
            .listed(mode, now)
            .await?
            .into_iter()
            .filter(|entry| entry.category.as_deref() == Some(category.name.as_str()))
            .collect();

        let skip = (page - 1).saturating_mul(self.per_page);
        if page > 1 && skip >= matching.len() {
            return Ok(None);
        }
        let has_older = skip.saturating_add(self.per_page) < matching.len();

        let entries = matching
            .into_iter()
            .skip(skip)
            .take(self.per_page)
            .map(|entry| card(mode, entry))
            .collect();

        Ok(Some(ListingView {
            heading: category.name,
            entries,
            newer: (page > 1).then(|| mode.category_href(slug, page - 1)),
            older: has_older.then(|| mode.category_href(slug, page + 1)),
        }))
    }

    /// Listed entries grouped by the year they were created.
    pub async fn archives(
        &self,
        mode: VisibilityMode,
        now: OffsetDateTime,
    ) -> Result<ArchiveView, HttpError> {
        let mut years: Vec<ArchiveYear> = Vec::new();
        for entry in self.listed(mode, now).await? {
            let year = entry.created.year();
            let item = ArchiveItem {
                href: mode.entry_href(&entry.slug),
                date: entry.created.format(ARCHIVE_DATE).unwrap_or_default(),
                is_draft: !entry.public,
                title: entry.title,
            };
            match years.last_mut() {
                Some(current) if current.year == year => current.entries.push(item),
                _ => years.push(ArchiveYear {
                    year,
                    entries: vec![item],
                }),
            }
        }

        Ok(ArchiveView { years })
    }

    pub async fn entry(
        &self,
        mode: VisibilityMode,
        slug: &str,
        now: OffsetDateTime,
    ) -> Result<Option<EntryDetailView>, HttpError> {
        let Some(entry) = self.entries.find_entry(slug).await? else {
            return Ok(None);
        };
        if !mode.shows(&entry, now) {
            return Ok(None);
        }

        let category = entry
            .category
            .as_deref()
            .and_then(|name| category_nav(mode, name));
        let tags = entry
            .tags
            .iter()
            .filter_map(|name| tag_link(mode, name))
            .collect();

        Ok(Some(EntryDetailView {
            published: display_date(&entry),
            iso_date: iso_date(entry.created),
            is_draft: !entry.public,
            author: entry.author.filter(|_| entry.show_author),
            slug: entry.slug,
            title: entry.title,
            category,
            tags,
            lead_html: entry.lead,
            content_html: entry.content,
        }))
    }

    /// Entries shown on this mode's listings, newest first.
    async fn listed(
        &self,
        mode: VisibilityMode,
        now: OffsetDateTime,
    ) -> Result<Vec<EntryRecord>, HttpError> {
        let mut entries = self.entries.list_entries().await?;
        entries.retain(|entry| mode.lists(entry, now));
        Ok(entries)
    }
}

fn card(mode: VisibilityMode, entry: EntryRecord) -> EntryCard {
    EntryCard {
        href: mode.entry_href(&entry.slug),
        published: display_date(&entry),
        iso_date: iso_date(entry.created),
        is_draft: !entry.public,
        category: entry
            .category
            .as_deref()
            .and_then(|name| category_nav(mode, name)),
        title: entry.title,
        lead_html: card_lead(entry.lead, entry.content),
    }
}

/// Category names are stored as configured, so their slugs derive back.
fn category_nav(mode: VisibilityMode, name: &str) -> Option<NavLink> {
    let slug = derive_slug(name).ok()?;
    Some(NavLink {
        label: name.to_string(),
        href: mode.category_href(&slug, 1),
    })
}

fn tag_link(mode: VisibilityMode, name: &str) -> Option<NavLink> {
    let slug = derive_slug(name).ok()?;
    Some(NavLink {
        label: name.to_string(),
        href: mode.tag_href(&slug),
    })
}

/// Entries without a lead show their whole content on the index.
fn card_lead(lead: String, content: String) -> String {
    if lead.trim().is_empty() { content } else { lead }
}

fn display_date(entry: &EntryRecord) -> Option<String> {
    if !entry.show_date {
        return None;
    }
    entry.created.format(DISPLAY_DATE).ok()
}

fn iso_date(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_default()
}
