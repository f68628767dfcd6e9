//! Atom feed of the most recent listed entries.

use std::sync::Arc;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    application::{error::HttpError, repos::EntriesRepo, site::FEED_PATH},
    config::SiteSettings,
    domain::visibility::VisibilityMode,
};

#[derive(Clone)]
pub struct SyndicationService {
    entries: Arc<dyn EntriesRepo>,
    title: String,
    base: String,
    limit: usize,
}

impl SyndicationService {
    pub fn new(entries: Arc<dyn EntriesRepo>, settings: &SiteSettings) -> Self {
        Self {
            entries,
            title: settings.title.clone(),
            base: settings.public_url.trim_end_matches('/').to_string(),
            limit: settings.entries_in_feed.get(),
        }
    }

    /// Atom 1.0 document with the newest entries this mode lists.
    pub async fn atom_feed(
        &self,
        mode: VisibilityMode,
        now: OffsetDateTime,
    ) -> Result<String, HttpError> {
        let listed: Vec<_> = self
            .entries
            .list_entries()
            .await?
            .into_iter()
            .filter(|entry| mode.lists(entry, now))
            .take(self.limit)
            .collect();

        let updated = listed
            .iter()
            .map(|entry| entry.modified)
            .max()
            .unwrap_or(now);

        let mut items = String::new();
        for entry in &listed {
            let link = format!("{}{}", self.base, mode.entry_href(&entry.slug));
            let published = rfc3339(entry.created);
            let author = entry
                .author
                .as_deref()
                .filter(|_| entry.show_author)
                .map(|name| format!("    <author><name>{}</name></author>\n", xml_escape(name)))
                .unwrap_or_default();
            items.push_str(&format!(
                "  <entry>\n    <title>{}</title>\n    <link href=\"{}\"/>\n    <id>{}</id>\n    <published>{}</published>\n    <updated>{}</updated>\n{}    <content type=\"html\">{}</content>\n  </entry>\n",
                xml_escape(&entry.title),
                xml_escape(&link),
                xml_escape(&link),
                published,
                published,
                author,
                xml_escape(&format!("{}{}", entry.lead, entry.content)),
            ));
        }

        let home = format!("{}{}", self.base, mode.index_href());
        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<feed xmlns=\"http://www.w3.org/2005/Atom\">\n  <title>{} Entries</title>\n  <id>{}</id>\n  <updated>{}</updated>\n  <link href=\"{}\"/>\n  <link href=\"{}{}\" rel=\"self\"/>\n{}</feed>\n",
            xml_escape(&self.title),
            xml_escape(&home),
            rfc3339(updated),
            xml_escape(&home),
            self.base,
            mode.href(FEED_PATH),
            items
        ))
    }
}

fn rfc3339(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
