use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use crate::client::{
    RangeRead,
    RestClient,
};

#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn read_from(&self, bucket: &str, object: &str, offset: u64) -> anyhow::Result<RangeRead>;
}

#[async_trait]
impl StorageApi for RestClient {
    async fn read_from(&self, bucket: &str, object: &str, offset: u64) -> anyhow::Result<RangeRead> {
        let url = self.storage_media_url(bucket, object)?;
        self.get_range(url, offset).await
    }
}
