use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use nb_api::Service;
use nb_api::v1::{
    Instance,
    Operation,
};

use crate::client::RestClient;

#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait InstancesApi: Send + Sync {
    async fn insert_instance(&self, project: &str, zone: &str, instance: &Instance) -> anyhow::Result<Operation>;
    async fn get_instance(&self, project: &str, zone: &str, name: &str) -> anyhow::Result<Instance>;
    async fn delete_instance(&self, project: &str, zone: &str, name: &str) -> anyhow::Result<Operation>;
    async fn list_instances(&self, project: &str, zone: &str) -> anyhow::Result<Vec<Instance>>;
}

fn instance_parent(project: &str, zone: &str) -> String {
    format!("projects/{project}/zones/{zone}/instances")
}

#[async_trait]
impl InstancesApi for RestClient {
    async fn insert_instance(&self, project: &str, zone: &str, instance: &Instance) -> anyhow::Result<Operation> {
        let url = self.url(Service::Compute, &instance_parent(project, zone))?;
        self.post(url, instance).await
    }

    async fn get_instance(&self, project: &str, zone: &str, name: &str) -> anyhow::Result<Instance> {
        let url = self.url(Service::Compute, &format!("{}/{name}", instance_parent(project, zone)))?;
        self.get(url).await
    }

    async fn delete_instance(&self, project: &str, zone: &str, name: &str) -> anyhow::Result<Operation> {
        let url = self.url(Service::Compute, &format!("{}/{name}", instance_parent(project, zone)))?;
        self.delete(url).await
    }

    async fn list_instances(&self, project: &str, zone: &str) -> anyhow::Result<Vec<Instance>> {
        let url = self.url(Service::Compute, &instance_parent(project, zone))?;
        self.list_all(url, None).await
    }
}
