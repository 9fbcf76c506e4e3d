use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use nb_api::Service;
use nb_api::v1::{
    Build,
    Operation,
};
use serde_json::json;

use crate::client::RestClient;

#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait BuildsApi: Send + Sync {
    async fn create_build(&self, project: &str, build: &Build) -> anyhow::Result<Operation>;
    async fn get_build(&self, project: &str, id: &str) -> anyhow::Result<Build>;
    async fn cancel_build(&self, project: &str, id: &str) -> anyhow::Result<Build>;
    async fn list_builds(&self, project: &str, filter: Option<String>, limit: Option<usize>)
    -> anyhow::Result<Vec<Build>>;
}

#[async_trait]
impl BuildsApi for RestClient {
    async fn create_build(&self, project: &str, build: &Build) -> anyhow::Result<Operation> {
        let url = self.url(Service::Builds, &format!("projects/{project}/builds"))?;
        self.post(url, build).await
    }

    async fn get_build(&self, project: &str, id: &str) -> anyhow::Result<Build> {
        let url = self.url(Service::Builds, &format!("projects/{project}/builds/{id}"))?;
        self.get(url).await
    }

    async fn cancel_build(&self, project: &str, id: &str) -> anyhow::Result<Build> {
        let url = self.url(Service::Builds, &format!("projects/{project}/builds/{id}:cancel"))?;
        self.post(url, &json!({"projectId": project, "id": id})).await
    }

    async fn list_builds(
        &self,
        project: &str,
        filter: Option<String>,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<Build>> {
        let mut url = self.url(Service::Builds, &format!("projects/{project}/builds"))?;
        if let Some(f) = filter {
            url.query_pairs_mut().append_pair("filter", &f);
        }
        self.list_all(url, limit).await
    }
}
