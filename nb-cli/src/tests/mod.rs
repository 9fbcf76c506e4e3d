
use std::path::Path;

use nb_testutils::*;

use super::*;
use crate::context::{
    Context,
    GlobalArgs,
};

const UNUSED_PROPERTIES_PATH: &str = "/nonexistent/properties.yml";
const FAST_POLL_INTERVAL: &str = "10ms";

pub(crate) fn context_with(props: Properties) -> Context {
    let global = GlobalArgs { project: Some(TEST_PROJECT.into()), ..Default::default() };
    Context::new(&global, props, Path::new(UNUSED_PROPERTIES_PATH)).unwrap()
}

/// A context whose every service endpoint is the fake server, polling fast enough for tests.
pub(crate) fn fake_context(fake: &FakeApi) -> Context {
    let mut props = Properties::default();
    for service in ["builds", "containers", "compute", "storage"] {
        props
            .set(&format!("api_endpoint_overrides/{service}"), &fake.base_url())
            .unwrap();
    }
    props.set("waiter/initial_interval", FAST_POLL_INTERVAL).unwrap();
    props.set("waiter/max_interval", FAST_POLL_INTERVAL).unwrap();
    props.set("builds/logs_poll_interval", FAST_POLL_INTERVAL).unwrap();
    context_with(props)
}
