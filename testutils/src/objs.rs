use std::collections::BTreeMap;

use chrono::{
    TimeZone,
    Utc,
};
use nb_api::v1::*;
use rstest::fixture;
use serde_json::json;

use crate::constants::*;

#[fixture]
pub fn test_build() -> Build {
    Build {
        id: TEST_BUILD_ID.into(),
        project_id: TEST_PROJECT.into(),
        status: BuildStatus::Success,
        steps: vec![BuildStep {
            name: "builders.nimbusapis.com/docker".into(),
            args: vec!["build".into(), "-t".into(), "app".into(), ".".into()],
            ..Default::default()
        }],
        images: vec!["registry.example/app:latest".into()],
        logs_bucket: Some(format!("gs://{TEST_LOGS_BUCKET}")),
        log_url: Some(format!("https://console.nimbus.example/builds/{TEST_BUILD_ID}")),
        create_time: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single(),
        start_time: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 5).single(),
        finish_time: Utc.with_ymd_and_hms(2026, 3, 1, 12, 1, 17).single(),
        ..Default::default()
    }
}

#[fixture]
pub fn test_operation(#[default(TEST_OPERATION_NAME)] name: &str) -> Operation {
    Operation {
        name: name.into(),
        metadata: Some(json!({"statusMessage": "running"})),
        ..Default::default()
    }
}

#[fixture]
pub fn test_cluster(#[default(TEST_CLUSTER_NAME)] name: &str) -> Cluster {
    Cluster {
        name: name.into(),
        location: Some(TEST_LOCATION.into()),
        initial_node_count: Some(3),
        node_config: Some(NodeConfig {
            machine_type: Some("e2-medium".into()),
            disk_size_gb: Some(100),
        }),
        status: ClusterStatus::Running,
        endpoint: Some("10.0.0.2".into()),
        current_master_version: Some("1.33.1".into()),
        self_link: Some(format!(
            "https://containers.nimbusapis.com/v1/projects/{TEST_PROJECT}/locations/{TEST_LOCATION}/clusters/{name}"
        )),
        ..Default::default()
    }
}

#[fixture]
pub fn test_instance(#[default(TEST_INSTANCE_NAME)] name: &str) -> Instance {
    Instance {
        name: name.into(),
        zone: Some(format!("https://compute.nimbusapis.com/compute/v1/projects/{TEST_PROJECT}/zones/{TEST_ZONE}")),
        machine_type: Some(format!("zones/{TEST_ZONE}/machineTypes/e2-medium")),
        status: InstanceStatus::Running,
        network_interfaces: vec![NetworkInterface {
            network: Some("global/networks/default".into()),
            network_ip: Some("10.128.0.7".into()),
        }],
        labels: BTreeMap::from([("env".to_string(), "test".to_string())]),
        ..Default::default()
    }
}

/// An operation that has finished, successfully if `error` is `None`.
pub fn finished_operation(name: &str, response: serde_json::Value, error: Option<(i32, &str)>) -> Operation {
    Operation {
        name: name.into(),
        done: true,
        response: error.is_none().then_some(response),
        error: error.map(|(code, message)| Status {
            code,
            message: message.into(),
            ..Default::default()
        }),
        ..Default::default()
    }
}
