use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use nb_api::Service;
use nb_api::v1::{
    Cluster,
    CreateClusterRequest,
    Operation,
};

use crate::client::RestClient;

#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait ClustersApi: Send + Sync {
    async fn create_cluster(&self, project: &str, location: &str, cluster: &Cluster) -> anyhow::Result<Operation>;
    async fn get_cluster(&self, project: &str, location: &str, name: &str) -> anyhow::Result<Cluster>;
    async fn delete_cluster(&self, project: &str, location: &str, name: &str) -> anyhow::Result<Operation>;
    async fn list_clusters(&self, project: &str, location: &str) -> anyhow::Result<Vec<Cluster>>;
}

fn cluster_parent(project: &str, location: &str) -> String {
    format!("projects/{project}/locations/{location}/clusters")
}

#[async_trait]
impl ClustersApi for RestClient {
    async fn create_cluster(&self, project: &str, location: &str, cluster: &Cluster) -> anyhow::Result<Operation> {
        let url = self.url(Service::Containers, &cluster_parent(project, location))?;
        self.post(url, &CreateClusterRequest { cluster: cluster.clone() }).await
    }

    async fn get_cluster(&self, project: &str, location: &str, name: &str) -> anyhow::Result<Cluster> {
        let url = self.url(Service::Containers, &format!("{}/{name}", cluster_parent(project, location)))?;
        self.get(url).await
    }

    async fn delete_cluster(&self, project: &str, location: &str, name: &str) -> anyhow::Result<Operation> {
        let url = self.url(Service::Containers, &format!("{}/{name}", cluster_parent(project, location)))?;
        self.delete(url).await
    }

    async fn list_clusters(&self, project: &str, location: &str) -> anyhow::Result<Vec<Cluster>> {
        let url = self.url(Service::Containers, &cluster_parent(project, location))?;
        self.list_all(url, None).await
    }
}
