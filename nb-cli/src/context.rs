use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use anyhow::anyhow;
use nb_core::client::{
    ApiEndpoints,
    ClientConfig,
};
use nb_core::constants::*;
use nb_core::prelude::*;
use nb_core::properties::PropertiesFile;
use nb_core::time::parse_duration;
use nb_core::waiter::WaitOptions;

const DEFAULT_VERBOSITY: &str = "warn";

#[derive(clap::Args, Clone, Debug, Default)]
pub struct GlobalArgs {
    #[arg(long, global = true, long_help = "project to operate on; overrides the core/project property")]
    pub project: Option<String>,

    #[arg(
        short,
        long,
        global = true,
        long_help = "log filter (e.g. warn, debug, nb_core=trace); overrides the core/verbosity property"
    )]
    pub verbosity: Option<String>,

    #[arg(long, global = true, long_help = "log every HTTP request and response status")]
    pub log_http: bool,

    #[arg(long, global = true, long_help = "output format: json, yaml, table or none")]
    pub format: Option<OutputFormat>,

    #[arg(
        long,
        global = true,
        env = ACCESS_TOKEN_ENV_VAR,
        hide_env_values = true,
        long_help = "bearer token to authenticate with; overrides the core/access_token_file property"
    )]
    pub access_token: Option<String>,

    #[arg(long, global = true, env = TRACK_ENV_VAR, long_help = "release track of the APIs to call: ga, beta or alpha")]
    pub track: Option<ReleaseTrack>,

    #[arg(short, long, global = true, long_help = "do not prompt for confirmation")]
    pub quiet: bool,
}

/// Everything a command needs to know about how it was invoked: flags merged with properties.
pub struct Context {
    pub props: Properties,
    pub props_path: PathBuf,
    pub format: OutputFormat,
    pub track: ReleaseTrack,
    pub quiet: bool,
    project: Option<String>,
    access_token: Option<String>,
    verbosity: String,
}

impl Context {
    pub fn load(global: &GlobalArgs) -> anyhow::Result<Context> {
        let file = PropertiesFile::load_default()?;
        Context::new(global, file.properties.clone(), file.path())
    }

    pub fn new(global: &GlobalArgs, props: Properties, props_path: &Path) -> anyhow::Result<Context> {
        let format = match (global.format, props.resolve("core/format")?) {
            (Some(f), _) => f,
            (None, Some(f)) => f.parse().map_err(|e: String| anyhow!(e))?,
            (None, None) => OutputFormat::default(),
        };
        let verbosity = match &global.verbosity {
            Some(v) => v.clone(),
            None => props.resolve("core/verbosity")?.unwrap_or(DEFAULT_VERBOSITY.into()),
        };

        Ok(Context {
            format,
            track: global.track.unwrap_or_default(),
            quiet: global.quiet,
            project: global.project.clone(),
            access_token: global.access_token.clone(),
            verbosity,
            props_path: props_path.into(),
            props,
        })
    }

    pub fn verbosity(&self) -> &str {
        &self.verbosity
    }

    pub fn is_debug(&self) -> bool {
        self.verbosity.contains("debug") || self.verbosity.contains("trace")
    }

    pub fn property(&self, name: &str) -> anyhow::Result<Option<String>> {
        self.props.resolve(name)
    }

    pub fn project(&self) -> anyhow::Result<String> {
        if let Some(p) = &self.project {
            return Ok(p.clone());
        }
        self.property("core/project")?.ok_or(anyhow!(
            "no project is set; pass --project or run `nbctl config set core/project PROJECT`"
        ))
    }

    /// The zone or region to use when a command was not given one explicitly.
    pub fn default_location(&self) -> anyhow::Result<Option<String>> {
        match self.property("compute/zone")? {
            Some(zone) => Ok(Some(zone)),
            None => self.property("compute/region"),
        }
    }

    pub fn access_token(&self) -> anyhow::Result<Option<String>> {
        if let Some(token) = &self.access_token {
            return Ok(Some(token.clone()));
        }

        match self.property("core/access_token_file")? {
            Some(path) => {
                let token = fs::read_to_string(&path).map_err(|e| anyhow!("could not read access token file {path}: {e}"))?;
                Ok(Some(token.trim().into()))
            },
            None => Ok(None),
        }
    }

    pub fn client(&self) -> anyhow::Result<RestClient> {
        RestClient::new(ClientConfig {
            endpoints: ApiEndpoints::from_properties(&self.props)?,
            access_token: self.access_token()?,
            track: self.track,
            user_agent: format!("nbctl/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn wait_options(&self) -> anyhow::Result<WaitOptions> {
        WaitOptions::from_properties(&self.props)
    }

    pub fn logs_poll_interval(&self) -> anyhow::Result<std::time::Duration> {
        match self.property("builds/logs_poll_interval")? {
            Some(v) => parse_duration(&v),
            None => Ok(std::time::Duration::from_millis(DEFAULT_LOGS_POLL_INTERVAL_MS)),
        }
    }
}
