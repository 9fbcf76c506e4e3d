pub const TEST_PROJECT: &str = "test-project";
pub const TEST_ACCESS_TOKEN: &str = "test-token-12345";
pub const TEST_BUILD_ID: &str = "6a4d51f2-build";
pub const TEST_LOGS_BUCKET: &str = "test-project-build-logs";
pub const TEST_ZONE: &str = "us-east1-b";
pub const TEST_REGION: &str = "us-east1";
pub const TEST_LOCATION: &str = "us-east1-b";
pub const TEST_CLUSTER_NAME: &str = "test-cluster";
pub const TEST_INSTANCE_NAME: &str = "test-vm";
pub const TEST_OPERATION_NAME: &str = "projects/test-project/locations/us-east1-b/operations/operation-1234";
