use std::sync::Arc;

use flog_api_types::SidebarModule;
use tracing::info;

use crate::{
    application::repos::{RepoError, SidebarRepo},
    domain::entities::SidebarModuleRecord,
};

#[derive(Clone)]
pub struct SidebarService {
    repo: Arc<dyn SidebarRepo>,
}

impl SidebarService {
    pub fn new(repo: Arc<dyn SidebarRepo>) -> Self {
        Self { repo }
    }

    /// Replace every stored module. Missing `index` falls back to the array
    /// position and missing `visible` to hidden.
    pub async fn replace(&self, modules: Vec<SidebarModule>) -> Result<usize, RepoError> {
        let records: Vec<SidebarModuleRecord> = modules
            .into_iter()
            .enumerate()
            .map(|(position, module)| -> Result<SidebarModuleRecord, RepoError> {
                let index = match module.index {
                    Some(index) => index,
                    None => i32::try_from(position).map_err(|_| RepoError::InvalidInput {
                        message: "too many sidebar modules".to_string(),
                    })?,
                };
                Ok(SidebarModuleRecord {
                    title: module.title,
                    text: module.text,
                    visible: module.visible.unwrap_or(false),
                    index,
                })
            })
            .collect::<Result<_, RepoError>>()?;

        let count = records.len();
        self.repo.replace_modules(records).await?;
        info!(target = "application::sidebar", modules = count, "sidebar replaced");
        Ok(count)
    }

    pub async fn list(&self) -> Result<Vec<SidebarModule>, RepoError> {
        let modules = self.repo.list_modules().await?;
        Ok(modules
            .into_iter()
            .map(|module| SidebarModule {
                title: module.title,
                text: module.text,
                visible: Some(module.visible),
                index: Some(module.index),
            })
            .collect())
    }

    /// Modules shown on the site, in index order.
    pub async fn visible(&self) -> Result<Vec<SidebarModuleRecord>, RepoError> {
        let modules = self.repo.list_modules().await?;
        Ok(modules.into_iter().filter(|module| module.visible).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::InMemoryRepositories;

    fn module(title: &str, visible: Option<bool>, index: Option<i32>) -> SidebarModule {
        SidebarModule {
            title: title.to_string(),
            text: format!("<p>{title}</p>"),
            visible,
            index,
        }
    }

    #[tokio::test]
    async fn replace_defaults_index_and_visibility() {
        let service = SidebarService::new(Arc::new(InMemoryRepositories::new()));
        let count = service
            .replace(vec![
                module("a", None, None),
                module("b", Some(true), None),
                module("c", Some(true), Some(-1)),
            ])
            .await
            .expect("replace");
        assert_eq!(count, 3);

        let listed = service.list().await.expect("list");
        let titles: Vec<_> = listed.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["c", "a", "b"]);
        assert_eq!(listed[1].visible, Some(false));
        assert_eq!(listed[2].index, Some(1));
    }

    #[tokio::test]
    async fn replace_discards_previous_modules() {
        let service = SidebarService::new(Arc::new(InMemoryRepositories::new()));
        service
            .replace(vec![module("old", Some(true), None)])
            .await
            .expect("first");
        service
            .replace(vec![module("new", Some(true), None), module("hidden", None, None)])
            .await
            .expect("second");

        let visible = service.visible().await.expect("visible");
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "new");
    }
}
