use std::io;
use std::path::PathBuf;

use anyhow::{
    anyhow,
    bail,
};
use clap::Subcommand;
use nb_api::v1::BuildOperationMetadata;
use nb_core::builds::*;
use nb_core::interrupt::{
    CtrlCSection,
    Interrupts,
};
use nb_core::output::{
    BuildRow,
    print_list,
    print_resource,
};
use nb_core::prelude::*;
use nb_core::progress::NoProgress;
use nb_core::services::BuildsApi;
use nb_core::time::parse_duration;
use nb_core::waiter::{
    InterruptPolicy,
    WaitOptions,
    wait_for,
};
use regex::Regex;
use tracing::*;

use crate::context::Context;

const ONGOING_FILTER: &str = r#"status="WORKING" OR status="QUEUED""#;

#[derive(Subcommand)]
pub enum BuildsSubcommand {
    #[command(about = "submit a build and stream its logs until it finishes")]
    Submit(SubmitArgs),

    #[command(about = "print or stream the log of a build")]
    Log(LogArgs),

    #[command(about = "show everything about a build")]
    Describe(IdArgs),

    #[command(about = "list builds", visible_alias = "ls")]
    List(ListArgs),

    #[command(about = "cancel one or more builds")]
    Cancel(CancelArgs),
}

#[derive(clap::Args)]
pub struct SubmitArgs {
    #[arg(long_help = "gs://bucket/object URL of the source archive to build")]
    pub source: Option<String>,

    #[arg(
        long,
        conflicts_with = "tag",
        required_unless_present = "tag",
        long_help = "YAML or JSON build config file"
    )]
    pub config: Option<PathBuf>,

    #[arg(short, long, long_help = "build the source's Dockerfile and push the image under this tag")]
    pub tag: Option<String>,

    #[arg(long, conflicts_with = "source", long_help = "build without any source archive")]
    pub no_source: bool,

    #[arg(long, long_help = "user substitutions, as _KEY=VALUE[,_KEY=VALUE...]")]
    pub substitutions: Option<String>,

    #[arg(long, long_help = "maximum build duration (e.g. 600, 10m, 1h); overrides builds/timeout")]
    pub timeout: Option<String>,

    #[arg(long, long_help = "machine type to run the build on")]
    pub machine_type: Option<String>,

    #[arg(long = "async", long_help = "return as soon as the build is created")]
    pub async_: bool,

    #[arg(long, long_help = "only stream log lines matching this regular expression")]
    pub log_filter: Option<String>,

    #[arg(long, long_help = "do not stream build logs")]
    pub suppress_logs: bool,
}

#[derive(clap::Args)]
pub struct LogArgs {
    #[arg(long_help = "ID of the build")]
    pub id: String,

    #[arg(long, long_help = "keep streaming until the build finishes")]
    pub stream: bool,
}

#[derive(clap::Args)]
pub struct IdArgs {
    #[arg(long_help = "ID of the build")]
    pub id: String,
}

#[derive(clap::Args)]
pub struct ListArgs {
    #[arg(long, long_help = "maximum number of builds to list")]
    pub limit: Option<usize>,

    #[arg(long, conflicts_with = "ongoing", long_help = "server-side filter expression")]
    pub filter: Option<String>,

    #[arg(long, long_help = "only list builds that are queued or running")]
    pub ongoing: bool,
}

#[derive(clap::Args)]
pub struct CancelArgs {
    #[arg(required = true, long_help = "IDs of the builds to cancel")]
    pub ids: Vec<String>,
}

pub async fn cmd(subcommand: &BuildsSubcommand, ctx: &Context) -> EmptyResult {
    let client = ctx.client()?;
    let project = ctx.project()?;

    match subcommand {
        BuildsSubcommand::Submit(args) => {
            let section = CtrlCSection::install();
            submit_cmd(args, ctx, &client, &project, section.interrupts()).await
        },
        BuildsSubcommand::Log(args) => {
            let section = CtrlCSection::install();
            log_cmd(args, ctx, &client, &project, section.interrupts()).await
        },
        BuildsSubcommand::Describe(args) => {
            let build = client.get_build(&project, &args.id).await?;
            print_resource(ctx.format, &build)
        },
        BuildsSubcommand::List(args) => list_cmd(args, ctx, &client, &project).await,
        BuildsSubcommand::Cancel(args) => cancel_cmd(args, ctx, &client, &project).await,
    }
}

pub(crate) fn submit_request(args: &SubmitArgs, ctx: &Context) -> anyhow::Result<Build> {
    let timeout = match &args.timeout {
        Some(t) => Some(parse_duration(t)?),
        None => ctx.property("builds/timeout")?.map(|t| parse_duration(&t)).transpose()?,
    };

    let req = SubmitRequest {
        source: args.source.clone(),
        no_source: args.no_source,
        config: args.config.as_deref().map(load_build_config).transpose()?,
        tag: args.tag.clone(),
        substitutions: args.substitutions.as_deref().map(parse_substitutions).transpose()?.unwrap_or_default(),
        timeout,
        machine_type: args.machine_type.clone(),
    };
    req.into_build()
}

pub(crate) async fn submit_cmd(
    args: &SubmitArgs,
    ctx: &Context,
    client: &RestClient,
    project: &str,
    interrupts: Interrupts,
) -> EmptyResult {
    let request = submit_request(args, ctx)?;
    let filter = args.log_filter.as_deref().map(Regex::new).transpose()?;

    let op = client.create_build(project, &request).await?;
    let created = op
        .metadata_as::<BuildOperationMetadata>()
        .map(|md| md.build)
        .ok_or(anyhow!("the server did not return the new build in operation {}", op.name))?;
    info!("created build {} (operation {})", created.id, op.name);

    if args.async_ {
        return print_resource(ctx.format, &created);
    }

    eprintln!("Created [{}].", created.log_url.as_deref().unwrap_or(&created.id));
    let tailer = if args.suppress_logs {
        None
    } else {
        LogTailer::for_build(client, &created, Box::new(io::stdout())).map(|t| t.with_filter(filter))
    };

    let mut poller = BuildPoller::new(client, project, &created.id).with_tailer(tailer);
    let opts = build_wait_options(ctx)?.with_interrupt_policy(InterruptPolicy::CancelOperation);
    let build = wait_for(&mut poller, &opts, interrupts, &NoProgress).await?;

    print_list(ctx.format, &[build], |b| BuildRow::from(b))
}

pub(crate) async fn log_cmd(
    args: &LogArgs,
    ctx: &Context,
    client: &RestClient,
    project: &str,
    interrupts: Interrupts,
) -> EmptyResult {
    let build = client.get_build(project, &args.id).await?;
    let Some(mut tailer) = LogTailer::for_build(client, &build, Box::new(io::stdout())) else {
        bail!("build {} does not have a logs bucket", args.id);
    };

    if !args.stream {
        tailer.poll(true).await?;
        return tailer.finish();
    }

    // The build's own outcome is reported by `describe`; streaming stops quietly once it is over
    let mut poller = BuildPoller::new(client, project, &args.id).with_tailer(Some(tailer));
    match wait_for(&mut poller, &build_wait_options(ctx)?, interrupts, &NoProgress).await {
        Err(err) if err.downcast_ref::<BuildError>().is_none() => Err(err),
        _ => Ok(()),
    }
}

pub(crate) async fn list_cmd(args: &ListArgs, ctx: &Context, client: &RestClient, project: &str) -> EmptyResult {
    let filter = if args.ongoing { Some(ONGOING_FILTER.to_string()) } else { args.filter.clone() };
    let builds = client.list_builds(project, filter, args.limit).await?;
    print_list(ctx.format, &builds, |b| BuildRow::from(b))
}

pub(crate) async fn cancel_cmd(args: &CancelArgs, ctx: &Context, client: &RestClient, project: &str) -> EmptyResult {
    let mut cancelled = vec![];
    let mut failures = vec![];
    for id in &args.ids {
        match client.cancel_build(project, id).await {
            Ok(build) => {
                eprintln!("Cancelled [{id}].");
                cancelled.push(build);
            },
            Err(err) => failures.push(format!("{id}: {err:#}")),
        }
    }

    print_list(ctx.format, &cancelled, |b| BuildRow::from(b))?;
    if !failures.is_empty() {
        bail!("failed to cancel {} of {} builds:\n  {}", failures.len(), args.ids.len(), failures.join("\n  "));
    }
    Ok(())
}

// Builds are followed at the log polling rate rather than backing off
fn build_wait_options(ctx: &Context) -> anyhow::Result<WaitOptions> {
    Ok(ctx.wait_options()?.with_fixed_interval(ctx.logs_poll_interval()?))
}
