// Default service endpoints
pub const DEFAULT_BUILDS_ENDPOINT: &str = "https://builds.nimbusapis.com/";
pub const DEFAULT_CONTAINERS_ENDPOINT: &str = "https://containers.nimbusapis.com/";
pub const DEFAULT_COMPUTE_ENDPOINT: &str = "https://compute.nimbusapis.com/";
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.nimbusapis.com/";

// Env vars
pub const CONFIG_DIR_ENV_VAR: &str = "NIMBUS_CONFIG_DIR";
pub const PROPERTY_ENV_VAR_PREFIX: &str = "NIMBUS_";
pub const ACCESS_TOKEN_ENV_VAR: &str = "NIMBUS_ACCESS_TOKEN";
pub const TRACK_ENV_VAR: &str = "NIMBUS_TRACK";

// Files
pub const CONFIG_DIR_NAME: &str = "nimbus";
pub const PROPERTIES_FILE_NAME: &str = "properties.yml";

// Waiter defaults
pub const DEFAULT_INITIAL_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_POLL_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_POLL_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 3;

// Builds
pub const DEFAULT_LOGS_POLL_INTERVAL_MS: u64 = 1000;
pub const LOG_OUTPUT_HEADER: &str = "------------------------------------- REMOTE BUILD OUTPUT --------------------------------------";
pub const LOG_OUTPUT_FOOTER: &str = "------------------------------------------------------------------------------------------------";

// Paging
pub const DEFAULT_PAGE_SIZE: usize = 50;

// Exit codes
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;
