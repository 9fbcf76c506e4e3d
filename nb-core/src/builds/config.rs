use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use lazy_static::lazy_static;
use nb_api::v1::{
    Build,
    BuildOptions,
    BuildStep,
    Source,
    StorageSource,
};

use super::BuildError;
use crate::errors::*;
use crate::time::to_wire_duration;

pub const DOCKER_BUILDER_IMAGE: &str = "builders.nimbusapis.com/docker";
const STORAGE_URL_PREFIX: &str = "gs://";

lazy_static! {
    static ref USER_SUBSTITUTION_KEY: Regex = Regex::new(r"^_[A-Z0-9_]+$").expect("substitution regex is valid");
}

/// Everything `builds submit` was asked to do, before it is turned into a `Build` message.
#[derive(Clone, Debug, Default)]
pub struct SubmitRequest {
    pub source: Option<String>,
    pub no_source: bool,
    pub config: Option<Build>,
    pub tag: Option<String>,
    pub substitutions: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub machine_type: Option<String>,
}

impl SubmitRequest {
    pub fn into_build(self) -> anyhow::Result<Build> {
        let mut build = match (self.config, &self.tag) {
            (Some(_), Some(_)) => return Err(BuildError::invalid_request("--config and --tag are mutually exclusive")),
            (Some(config), None) => config,
            (None, Some(tag)) => tag_build(tag),
            (None, None) => return Err(BuildError::invalid_request("one of --config or --tag is required")),
        };

        if build.steps.is_empty() {
            return Err(BuildError::invalid_request("the build config has no steps"));
        }

        build.source = match (&self.source, self.no_source) {
            (Some(_), true) => return Err(BuildError::invalid_request("a source cannot be given with --no-source")),
            (Some(src), false) => Some(Source { storage_source: Some(parse_storage_source(src)?) }),
            (None, true) => None,
            (None, false) => {
                return Err(BuildError::invalid_request(
                    "a gs:// source is required; pass --no-source to build without one",
                ));
            },
        };

        build.substitutions.extend(self.substitutions);
        validate_substitutions(&build.substitutions)?;

        if let Some(timeout) = self.timeout {
            build.timeout = Some(to_wire_duration(timeout));
        }
        if let Some(machine_type) = self.machine_type {
            build.options.get_or_insert_with(BuildOptions::default).machine_type = Some(machine_type);
        }

        Ok(build)
    }
}

/// Reads a YAML or JSON build config file.
pub fn load_build_config(path: &Path) -> anyhow::Result<Build> {
    let contents =
        fs::read_to_string(path).map_err(|e| anyhow!("could not read build config {}: {e}", path.display()))?;
    serde_yaml::from_str(&contents).map_err(|e| anyhow!("could not parse build config {}: {e}", path.display()))
}

pub fn tag_build(tag: &str) -> Build {
    let args = ["build", "--network", "cloudbuild", "--no-cache", "-t", tag, "."];
    Build {
        steps: vec![BuildStep {
            name: DOCKER_BUILDER_IMAGE.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }],
        images: vec![tag.into()],
        ..Default::default()
    }
}

/// Parses `_KEY=value,_OTHER=value`.
pub fn parse_substitutions(s: &str) -> anyhow::Result<BTreeMap<String, String>> {
    let mut subs = BTreeMap::new();
    for pair in s.split(',').filter(|p| !p.trim().is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(BuildError::invalid_request(&format!("substitution {pair:?} is not of the form KEY=VALUE")));
        };
        subs.insert(key.trim().to_string(), value.to_string());
    }
    Ok(subs)
}

pub fn validate_substitutions(subs: &BTreeMap<String, String>) -> EmptyResult {
    for key in subs.keys() {
        if !USER_SUBSTITUTION_KEY.is_match(key) {
            return Err(BuildError::invalid_request(&format!(
                "substitution key {key:?} must start with an underscore and contain only \
                upper-case letters, digits and underscores; built-in substitutions cannot be overridden"
            )));
        }
    }
    Ok(())
}

pub fn parse_storage_source(url: &str) -> anyhow::Result<StorageSource> {
    let invalid = || BuildError::invalid_request(&format!("source {url:?} must be of the form gs://bucket/object"));

    let path = url.strip_prefix(STORAGE_URL_PREFIX).ok_or_else(invalid)?;
    let (bucket, object) = path.split_once('/').ok_or_else(invalid)?;
    if bucket.is_empty() || object.is_empty() {
        return Err(invalid());
    }

    Ok(StorageSource { bucket: bucket.into(), object: object.into(), generation: None })
}

#[cfg(test)]
mod tests {
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use assertables::*;
    use rstest::*;

    use super::*;

    fn tagged(tag: &str) -> SubmitRequest {
        SubmitRequest {
            tag: Some(tag.into()),
            no_source: true,
            ..Default::default()
        }
    }

    #[rstest]
    fn test_tag_build() {
        let build = tagged("registry.example/app:v1").into_build().unwrap();
        assert_eq!(build.images, vec!["registry.example/app:v1"]);
        assert_eq!(build.steps.len(), 1);
        assert_eq!(
            build.steps[0].args,
            vec!["build", "--network", "cloudbuild", "--no-cache", "-t", "registry.example/app:v1", "."]
        );
        assert_none!(build.source);
    }

    #[rstest]
    fn test_into_build_sets_source_timeout_and_machine_type() {
        let req = SubmitRequest {
            source: Some("gs://src-bucket/archives/app.tgz".into()),
            no_source: false,
            timeout: Some(Duration::from_secs(600)),
            machine_type: Some("e2-highcpu-8".into()),
            ..tagged("app")
        };

        let build = req.into_build().unwrap();
        let storage = build.source.unwrap().storage_source.unwrap();
        assert_eq!(storage.bucket, "src-bucket");
        assert_eq!(storage.object, "archives/app.tgz");
        assert_eq!(build.timeout.as_deref(), Some("600s"));
        assert_eq!(build.options.unwrap().machine_type.as_deref(), Some("e2-highcpu-8"));
    }

    #[rstest]
    #[case::both(Some(Build::default()), Some("app"))]
    #[case::neither(None, None)]
    fn test_into_build_config_xor_tag(#[case] config: Option<Build>, #[case] tag: Option<&str>) {
        let req = SubmitRequest {
            config,
            tag: tag.map(String::from),
            no_source: true,
            ..Default::default()
        };
        assert_err!(req.into_build());
    }

    #[rstest]
    fn test_into_build_requires_source_or_no_source() {
        let req = SubmitRequest { no_source: false, ..tagged("app") };
        let err = req.into_build().unwrap_err();
        assert_contains!(format!("{err}"), "--no-source");
    }

    #[rstest]
    fn test_flag_substitutions_override_config() {
        let mut config = tag_build("app");
        config.substitutions.insert("_ENV".into(), "dev".into());
        config.substitutions.insert("_REGION".into(), "east".into());

        let req = SubmitRequest {
            config: Some(config),
            no_source: true,
            substitutions: parse_substitutions("_ENV=prod").unwrap(),
            ..Default::default()
        };
        let build = req.into_build().unwrap();
        assert_eq!(build.substitutions["_ENV"], "prod");
        assert_eq!(build.substitutions["_REGION"], "east");
    }

    #[rstest]
    #[case::builtin("PROJECT_ID")]
    #[case::lower("_lower")]
    #[case::bare_underscore("_")]
    fn test_invalid_substitution_keys(#[case] key: &str) {
        let subs = BTreeMap::from([(key.to_string(), "x".to_string())]);
        assert_err!(validate_substitutions(&subs));
    }

    #[rstest]
    fn test_parse_substitutions() {
        let subs = parse_substitutions("_A=1,_B=x=y,").unwrap();
        assert_eq!(subs["_A"], "1");
        assert_eq!(subs["_B"], "x=y");
        assert_err!(parse_substitutions("_A"));
    }

    #[rstest]
    #[case::no_scheme("bucket/object")]
    #[case::no_object("gs://bucket")]
    #[case::empty_object("gs://bucket/")]
    fn test_parse_storage_source_invalid(#[case] url: &str) {
        assert_err!(parse_storage_source(url));
    }

    #[rstest]
    fn test_load_build_config_yaml() {
        let dir = TempDir::new().unwrap();
        let file = dir.child("build.yml");
        file.write_str(
            "steps:\n  - name: builders/go\n    args: [test, ./...]\nimages: [app]\ntimeout: 300s\nsubstitutions:\n  _ENV: dev\n",
        )
        .unwrap();

        let build = load_build_config(file.path()).unwrap();
        assert_eq!(build.steps[0].name, "builders/go");
        assert_eq!(build.steps[0].args, vec!["test", "./..."]);
        assert_eq!(build.timeout.as_deref(), Some("300s"));
        assert_eq!(build.substitutions["_ENV"], "dev");
    }

    #[rstest]
    fn test_load_build_config_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_build_config(&dir.path().join("nope.yml")).unwrap_err();
        assert_contains!(format!("{err}"), "could not read build config");
    }
}
