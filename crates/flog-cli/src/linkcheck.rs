//! Verify that every URL an entry's HTML references actually resolves.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use flog_api_types::{UPLOAD_URL_BASE, entry_path};
use lol_html::{RewriteStrSettings, element, rewrite_str};
use reqwest::header::USER_AGENT;
use reqwest::{StatusCode, Url};
use tracing::{debug, info};

use crate::client::{CliError, Ctx};

pub const CRAWLER_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; flog-linkcheck/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

const URL_ATTRIBUTES: [&str; 4] = ["src", "href", "link", "url"];

/// One URL-bearing attribute found in the rendered HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    pub tag: String,
    pub attribute: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Absolute,
    RootRelative,
    Fragment,
    Relative,
}

pub fn classify(value: &str) -> LinkKind {
    if value.starts_with('#') {
        LinkKind::Fragment
    } else if value.starts_with('/') {
        LinkKind::RootRelative
    } else if Url::parse(value).is_ok() {
        LinkKind::Absolute
    } else {
        LinkKind::Relative
    }
}

/// Collect every checkable attribute value. Empty values and `mailto:` links are skipped.
pub fn collect_links(html: &str) -> Result<Vec<LinkReference>, CliError> {
    let found = Rc::new(RefCell::new(Vec::new()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", {
                let found = Rc::clone(&found);
                move |el| {
                    let tag = el.tag_name();
                    for attribute in URL_ATTRIBUTES {
                        let Some(value) = el.get_attribute(attribute) else {
                            continue;
                        };
                        let value = value.trim();
                        if value.is_empty() || value.starts_with("mailto:") {
                            continue;
                        }
                        found.borrow_mut().push(LinkReference {
                            tag: tag.clone(),
                            attribute,
                            value: value.to_string(),
                        });
                    }
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| CliError::Rewrite(err.to_string()))?;

    let links = found.borrow().clone();
    Ok(links)
}

/// Turns attribute values into absolute URLs relative to one entry.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    domain: Url,
    preview: Url,
    uploads: Url,
}

impl LinkResolver {
    pub fn new(domain: &Url, slug: &str) -> Result<Self, CliError> {
        let domain = domain.join("/")?;
        let preview = domain.join(&entry_path(slug, true))?;
        let uploads = domain.join(&format!("{UPLOAD_URL_BASE}/{slug}/"))?;
        Ok(Self {
            domain,
            preview,
            uploads,
        })
    }

    pub fn resolve(&self, value: &str) -> Result<Url, CliError> {
        let url = match classify(value) {
            LinkKind::Absolute => Url::parse(value)?,
            LinkKind::RootRelative => self.domain.join(value)?,
            LinkKind::Fragment => self.preview.join(value)?,
            LinkKind::Relative => self.uploads.join(value)?,
        };
        Ok(url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkFailure {
    Status(StatusCode),
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkProblem {
    pub link: LinkReference,
    pub url: String,
    pub failure: LinkFailure,
}

impl fmt::Display for LinkProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match &self.failure {
            LinkFailure::Status(status) => format!("status {status}"),
            LinkFailure::Transport(message) => message.clone(),
        };
        write!(
            f,
            "<{} {}=\"{}\"> -> {}: {}",
            self.link.tag, self.link.attribute, self.link.value, self.url, reason
        )
    }
}

/// Fetch every link in `fragments` one after another. Anything but a 200 is a problem.
pub async fn check_links(
    ctx: &Ctx,
    slug: &str,
    fragments: &[&str],
) -> Result<Vec<LinkProblem>, CliError> {
    let resolver = LinkResolver::new(&ctx.base, slug)?;
    let mut links = Vec::new();
    for fragment in fragments {
        links.extend(collect_links(fragment)?);
    }
    info!(target = "flog_cli::linkcheck", slug, links = links.len(), "checking links");

    let mut problems = Vec::new();
    for link in links {
        let url = match resolver.resolve(&link.value) {
            Ok(url) => url,
            Err(err) => {
                problems.push(LinkProblem {
                    url: link.value.clone(),
                    failure: LinkFailure::Transport(err.to_string()),
                    link,
                });
                continue;
            }
        };

        let outcome = ctx
            .client
            .get(url.clone())
            .header(USER_AGENT, CRAWLER_USER_AGENT)
            .send()
            .await;
        let failure = match outcome {
            Ok(resp) if resp.status() == StatusCode::OK => None,
            Ok(resp) => Some(LinkFailure::Status(resp.status())),
            Err(err) => Some(LinkFailure::Transport(err.to_string())),
        };
        debug!(target = "flog_cli::linkcheck", url = %url, ok = failure.is_none(), "checked link");

        if let Some(failure) = failure {
            problems.push(LinkProblem {
                link,
                url: url.to_string(),
                failure,
            });
        }
    }
    Ok(problems)
}
