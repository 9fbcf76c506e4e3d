use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use nb_api::Service;
use nb_api::v1::Operation;
use serde_json::Value;

use crate::client::RestClient;
use crate::errors::*;

#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait OperationsApi: Send + Sync {
    async fn get_operation(&self, service: Service, name: &str) -> anyhow::Result<Operation>;
    async fn cancel_operation(&self, service: Service, name: &str) -> EmptyResult;
    async fn list_operations(&self, service: Service, parent: &str, limit: Option<usize>)
    -> anyhow::Result<Vec<Operation>>;
}

// Operation names are full resource paths, so they double as the URL path under the
// owning service's versioned base.
#[async_trait]
impl OperationsApi for RestClient {
    async fn get_operation(&self, service: Service, name: &str) -> anyhow::Result<Operation> {
        let url = self.url(service, name)?;
        self.get(url).await
    }

    async fn cancel_operation(&self, service: Service, name: &str) -> EmptyResult {
        let url = self.url(service, &format!("{name}:cancel"))?;
        let _: Value = self.post(url, &serde_json::json!({})).await?;
        Ok(())
    }

    async fn list_operations(
        &self,
        service: Service,
        parent: &str,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<Operation>> {
        let url = self.url(service, &format!("{parent}/operations"))?;
        self.list_all(url, limit).await
    }
}
