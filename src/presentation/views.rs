use crate::application::error::{ErrorReport, HttpError};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, NotFoundView::default());
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavLink {
    pub label: String,
    pub href: String,
}

#[derive(Clone)]
pub struct SidebarModuleView {
    pub title: String,
    pub html: String,
}

/// Page furniture shared by every site template.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub categories: Vec<NavLink>,
    pub archives_href: String,
    pub feed_href: String,
    pub sidebar: Vec<SidebarModuleView>,
    pub preview: bool,
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub categories: Vec<NavLink>,
    pub archives_href: String,
    pub feed_href: String,
    pub sidebar: Vec<SidebarModuleView>,
    pub preview: bool,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            categories: chrome.categories,
            archives_href: chrome.archives_href,
            feed_href: chrome.feed_href,
            sidebar: chrome.sidebar,
            preview: chrome.preview,
            content,
        }
    }
}

#[derive(Clone)]
pub struct EntryCard {
    pub href: String,
    pub title: String,
    pub lead_html: String,
    pub published: Option<String>,
    pub iso_date: String,
    pub category: Option<NavLink>,
    pub is_draft: bool,
}

pub struct IndexView {
    pub entries: Vec<EntryCard>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexView>,
}

pub struct EntryDetailView {
    pub slug: String,
    pub title: String,
    pub author: Option<String>,
    pub category: Option<NavLink>,
    pub tags: Vec<NavLink>,
    pub published: Option<String>,
    pub iso_date: String,
    pub lead_html: String,
    pub content_html: String,
    pub is_draft: bool,
}

#[derive(Template)]
#[template(path = "entry.html")]
pub struct EntryTemplate {
    pub view: LayoutContext<EntryDetailView>,
}

/// A tag or category page; `newer`/`older` link neighbouring pages.
pub struct ListingView {
    pub heading: String,
    pub entries: Vec<EntryCard>,
    pub newer: Option<String>,
    pub older: Option<String>,
}

#[derive(Template)]
#[template(path = "listing.html")]
pub struct ListingTemplate {
    pub view: LayoutContext<ListingView>,
}

pub struct ArchiveItem {
    pub href: String,
    pub title: String,
    pub date: String,
    pub is_draft: bool,
}

pub struct ArchiveYear {
    pub year: i32,
    pub entries: Vec<ArchiveItem>,
}

/// Years newest first.
pub struct ArchiveView {
    pub years: Vec<ArchiveYear>,
}

#[derive(Template)]
#[template(path = "archives.html")]
pub struct ArchiveTemplate {
    pub view: LayoutContext<ArchiveView>,
}

pub struct NotFoundView {
    pub title: String,
    pub message: String,
}

impl Default for NotFoundView {
    fn default() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<NotFoundView>,
}
