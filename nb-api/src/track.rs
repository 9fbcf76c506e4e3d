use std::fmt;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseTrack {
    #[default]
    Ga,
    Beta,
    Alpha,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Builds,
    Containers,
    Compute,
    Storage,
}

impl ReleaseTrack {
    /// The API version path segment for a service on this track; storage is unversioned
    /// at this layer because its paths carry their own version.
    pub fn api_version(&self, service: Service) -> Option<&'static str> {
        match (service, self) {
            (Service::Storage, _) => None,
            (Service::Compute, ReleaseTrack::Ga) => Some("compute/v1"),
            (Service::Compute, ReleaseTrack::Beta) => Some("compute/beta"),
            (Service::Compute, ReleaseTrack::Alpha) => Some("compute/alpha"),
            (_, ReleaseTrack::Ga) => Some("v1"),
            (_, ReleaseTrack::Beta) => Some("v1beta1"),
            (_, ReleaseTrack::Alpha) => Some("v1alpha1"),
        }
    }

    pub fn parse(s: &str) -> Result<ReleaseTrack, String> {
        s.parse()
    }
}

impl FromStr for ReleaseTrack {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ga" => Ok(ReleaseTrack::Ga),
            "beta" => Ok(ReleaseTrack::Beta),
            "alpha" => Ok(ReleaseTrack::Alpha),
            other => Err(format!("unknown release track: {other} (expected one of: ga, beta, alpha)")),
        }
    }
}

impl fmt::Display for ReleaseTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReleaseTrack::Ga => "ga",
            ReleaseTrack::Beta => "beta",
            ReleaseTrack::Alpha => "alpha",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "builds" => Ok(Service::Builds),
            "containers" => Ok(Service::Containers),
            "compute" => Ok(Service::Compute),
            "storage" => Ok(Service::Storage),
            other => Err(format!("unknown service: {other}")),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::Builds => "builds",
            Service::Containers => "containers",
            Service::Compute => "compute",
            Service::Storage => "storage",
        };
        write!(f, "{name}")
    }
}
