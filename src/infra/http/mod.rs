pub mod api;
mod middleware;
mod public;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware};

use crate::{
    application::{
        auth::AuthService, entries::EntryService, error::AppError, sidebar::SidebarService,
        site::SiteService, syndication::SyndicationService,
    },
    config::Settings,
    infra::{error::InfraError, memory::InMemoryRepositories, uploads::UploadStorage},
};

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct AppState {
    pub entries: Arc<EntryService>,
    pub sidebar: Arc<SidebarService>,
    pub auth: Arc<AuthService>,
    pub site: Arc<SiteService>,
    pub syndication: Arc<SyndicationService>,
    pub uploads: Arc<UploadStorage>,
    pub max_request_bytes: usize,
}

impl AppState {
    /// Wire every service against a fresh in-memory store seeded from `settings`.
    pub async fn in_memory(settings: &Settings) -> Result<Self, AppError> {
        let repos = Arc::new(InMemoryRepositories::new());
        repos.seed_categories(&settings.site.categories).await?;

        let upload_root = settings.uploads.directory.clone();
        let uploads = UploadStorage::new(upload_root.clone()).map_err(|source| {
            InfraError::UploadRoot {
                path: upload_root,
                source,
            }
        })?;
        let max_request_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
            .map_err(|_| AppError::validation("uploads.max_request_bytes exceeds usize"))?;

        let sidebar = SidebarService::new(repos.clone());
        let site = SiteService::new(repos.clone(), repos.clone(), sidebar.clone(), &settings.site);
        let syndication = SyndicationService::new(repos.clone(), &settings.site);

        Ok(Self {
            entries: Arc::new(EntryService::new(repos.clone(), repos)),
            sidebar: Arc::new(sidebar),
            auth: Arc::new(AuthService::new(&settings.auth)),
            site: Arc::new(site),
            syndication: Arc::new(syndication),
            uploads: Arc::new(uploads),
            max_request_bytes,
        })
    }
}

/// Client API plus the public and preview site, with request logging.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::build_api_router(state.clone()))
        .merge(public::build_public_router(state))
        .layer(axum_middleware::from_fn(set_request_context))
        .layer(axum_middleware::from_fn(log_responses))
}
