use std::env;
use std::fs::{
    self,
    File,
};
use std::path::{
    Path,
    PathBuf,
};

use serde::{
    Deserialize,
    Serialize,
};
use tracing::*;

use crate::constants::*;
use crate::errors::*;
use crate::time::parse_duration;

pub const PROPERTY_NAMES: &[&str] = &[
    "core/project",
    "core/account",
    "core/verbosity",
    "core/format",
    "core/access_token_file",
    "compute/region",
    "compute/zone",
    "builds/timeout",
    "builds/logs_poll_interval",
    "api_endpoint_overrides/builds",
    "api_endpoint_overrides/containers",
    "api_endpoint_overrides/compute",
    "api_endpoint_overrides/storage",
    "waiter/initial_interval",
    "waiter/max_interval",
    "waiter/timeout",
];

const FORMAT_VALUES: &[&str] = &["json", "yaml", "table", "none"];

err_impl! {PropertyError,
    #[error("unknown property: {0}")]
    UnknownProperty(String),

    #[error("invalid value for property {0}")]
    InvalidValue(String),
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CoreSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_file: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ComputeSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct BuildsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs_poll_interval: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EndpointOverridesSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builds: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub containers: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct WaiterSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_interval: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_interval: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// Properties stored in the user's properties file.  The file holds one YAML mapping per
/// section; a property is addressed as `section/key`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Properties {
    #[serde(default)]
    pub core: CoreSection,

    #[serde(default)]
    pub compute: ComputeSection,

    #[serde(default)]
    pub builds: BuildsSection,

    #[serde(default)]
    pub api_endpoint_overrides: EndpointOverridesSection,

    #[serde(default)]
    pub waiter: WaiterSection,
}

impl Properties {
    fn slot(&self, name: &str) -> anyhow::Result<&Option<String>> {
        Ok(match name {
            "core/project" => &self.core.project,
            "core/account" => &self.core.account,
            "core/verbosity" => &self.core.verbosity,
            "core/format" => &self.core.format,
            "core/access_token_file" => &self.core.access_token_file,
            "compute/region" => &self.compute.region,
            "compute/zone" => &self.compute.zone,
            "builds/timeout" => &self.builds.timeout,
            "builds/logs_poll_interval" => &self.builds.logs_poll_interval,
            "api_endpoint_overrides/builds" => &self.api_endpoint_overrides.builds,
            "api_endpoint_overrides/containers" => &self.api_endpoint_overrides.containers,
            "api_endpoint_overrides/compute" => &self.api_endpoint_overrides.compute,
            "api_endpoint_overrides/storage" => &self.api_endpoint_overrides.storage,
            "waiter/initial_interval" => &self.waiter.initial_interval,
            "waiter/max_interval" => &self.waiter.max_interval,
            "waiter/timeout" => &self.waiter.timeout,
            _ => return Err(unknown_property_error(name)),
        })
    }

    fn slot_mut(&mut self, name: &str) -> anyhow::Result<&mut Option<String>> {
        Ok(match name {
            "core/project" => &mut self.core.project,
            "core/account" => &mut self.core.account,
            "core/verbosity" => &mut self.core.verbosity,
            "core/format" => &mut self.core.format,
            "core/access_token_file" => &mut self.core.access_token_file,
            "compute/region" => &mut self.compute.region,
            "compute/zone" => &mut self.compute.zone,
            "builds/timeout" => &mut self.builds.timeout,
            "builds/logs_poll_interval" => &mut self.builds.logs_poll_interval,
            "api_endpoint_overrides/builds" => &mut self.api_endpoint_overrides.builds,
            "api_endpoint_overrides/containers" => &mut self.api_endpoint_overrides.containers,
            "api_endpoint_overrides/compute" => &mut self.api_endpoint_overrides.compute,
            "api_endpoint_overrides/storage" => &mut self.api_endpoint_overrides.storage,
            "waiter/initial_interval" => &mut self.waiter.initial_interval,
            "waiter/max_interval" => &mut self.waiter.max_interval,
            "waiter/timeout" => &mut self.waiter.timeout,
            _ => return Err(unknown_property_error(name)),
        })
    }

    pub fn get(&self, name: &str) -> anyhow::Result<Option<&str>> {
        Ok(self.slot(name)?.as_deref())
    }

    pub fn set(&mut self, name: &str, value: &str) -> EmptyResult {
        validate(name, value)?;
        *self.slot_mut(name)? = Some(value.into());
        Ok(())
    }

    pub fn unset(&mut self, name: &str) -> anyhow::Result<bool> {
        Ok(self.slot_mut(name)?.take().is_some())
    }

    pub fn list(&self) -> Vec<(&'static str, &str)> {
        PROPERTY_NAMES
            .iter()
            .filter_map(|name| self.slot(name).ok()?.as_deref().map(|v| (*name, v)))
            .collect()
    }

    /// Resolves a property with the environment taking precedence over the file.
    pub fn resolve(&self, name: &str) -> anyhow::Result<Option<String>> {
        self.resolve_with(name, |var| env::var(var).ok())
    }

    pub fn resolve_with(&self, name: &str, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Option<String>> {
        if let Some(value) = lookup(&env_var_for(name)).filter(|v| !v.is_empty()) {
            return Ok(Some(value));
        }
        Ok(self.get(name)?.map(String::from))
    }
}

pub fn env_var_for(name: &str) -> String {
    format!("{PROPERTY_ENV_VAR_PREFIX}{}", name.replace('/', "_").to_uppercase())
}

fn unknown_property_error(name: &str) -> anyhow::Error {
    PropertyError::unknown_property(name).context(format!("valid properties are: {}", PROPERTY_NAMES.join(", ")))
}

fn validate(name: &str, value: &str) -> EmptyResult {
    match name {
        "core/format" if !FORMAT_VALUES.contains(&value) => Err(PropertyError::invalid_value(name)
            .context(format!("{value:?} is not one of: {}", FORMAT_VALUES.join(", ")))),
        "builds/timeout" | "builds/logs_poll_interval" | "waiter/initial_interval" | "waiter/max_interval"
        | "waiter/timeout" => parse_duration(value)
            .map(|_| ())
            .map_err(|e| e.context(PropertyError::invalid_value(name))),
        n if n.starts_with("api_endpoint_overrides/") => url::Url::parse(value)
            .map(|_| ())
            .map_err(|e| PropertyError::invalid_value(name).context(format!("not a URL: {e}"))),
        _ => Ok(()),
    }
}

pub fn default_config_dir() -> PathBuf {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV_VAR)
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }

    let mut dir = dirs::config_dir().unwrap_or(PathBuf::from("."));
    dir.push(CONFIG_DIR_NAME);
    dir
}

#[derive(Clone, Debug)]
pub struct PropertiesFile {
    path: PathBuf,
    pub properties: Properties,
}

impl PropertiesFile {
    pub fn load_default() -> anyhow::Result<PropertiesFile> {
        let mut path = default_config_dir();
        path.push(PROPERTIES_FILE_NAME);
        PropertiesFile::load(&path)
    }

    pub fn load(path: &Path) -> anyhow::Result<PropertiesFile> {
        let properties = if path.exists() {
            debug!("reading properties from {}", path.display());
            serde_yaml::from_reader::<_, Option<Properties>>(File::open(path)?)
                .map_err(|e| anyhow!("could not parse properties file {}: {e}", path.display()))?
                .unwrap_or_default()
        } else {
            debug!("no properties file at {}, using defaults", path.display());
            Properties::default()
        };

        Ok(PropertiesFile { path: path.into(), properties })
    }

    pub fn save(&self) -> EmptyResult {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        serde_yaml::to_writer(File::create(&self.path)?, &self.properties)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
