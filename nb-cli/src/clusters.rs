use std::io::{
    self,
    BufRead,
};

use anyhow::anyhow;
use clap::Subcommand;
use futures::future::join_all;
use nb_api::v1::NodeConfig;
use nb_core::interrupt::{
    CtrlCSection,
    Interrupts,
};
use nb_core::output::{
    ClusterRow,
    print_list,
    print_resource,
};
use nb_core::prelude::*;
use nb_core::progress::SpinnerProgress;
use nb_core::services::ClustersApi;
use nb_core::time::parse_duration;
use nb_core::waiter::{
    InterruptPolicy,
    LroPoller,
    wait_for,
};
use tracing::*;

use crate::batch::{
    partition,
    report_started,
    wait_started,
};
use crate::context::Context;
use crate::prompt::confirm_deletion;

const ALL_LOCATIONS: &str = "-";

#[derive(Subcommand)]
pub enum ClustersSubcommand {
    #[command(about = "create a cluster and wait for it to be ready")]
    Create(CreateArgs),

    #[command(about = "delete one or more clusters", visible_aliases = ["del", "rm"])]
    Delete(DeleteArgs),

    #[command(about = "show everything about a cluster")]
    Describe(DescribeArgs),

    #[command(about = "list clusters", visible_alias = "ls")]
    List(ListArgs),
}

#[derive(clap::Args)]
pub struct CreateArgs {
    #[arg(long_help = "name of the cluster")]
    pub name: String,

    #[arg(long, long_help = "zone or region of the cluster; defaults to compute/zone, then compute/region")]
    pub location: Option<String>,

    #[arg(
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(i32).range(1..),
        long_help = "number of nodes in the default node pool"
    )]
    pub num_nodes: i32,

    #[arg(long, default_value = "e2-medium", long_help = "machine type of the nodes")]
    pub machine_type: String,

    #[arg(long, long_help = "boot disk size of each node, in GB")]
    pub disk_size: Option<i32>,

    #[arg(long = "async", long_help = "return as soon as the create request is accepted")]
    pub async_: bool,

    #[arg(long, long_help = "give up waiting after this long (e.g. 30m); overrides waiter/timeout")]
    pub timeout: Option<String>,
}

#[derive(clap::Args)]
pub struct DeleteArgs {
    #[arg(required = true, long_help = "names of the clusters to delete")]
    pub names: Vec<String>,

    #[arg(long, long_help = "zone or region of the clusters; defaults to compute/zone, then compute/region")]
    pub location: Option<String>,

    #[arg(long = "async", long_help = "return as soon as the delete requests are accepted")]
    pub async_: bool,
}

#[derive(clap::Args)]
pub struct DescribeArgs {
    #[arg(long_help = "name of the cluster")]
    pub name: String,

    #[arg(long, long_help = "zone or region of the cluster; defaults to compute/zone, then compute/region")]
    pub location: Option<String>,
}

#[derive(clap::Args)]
pub struct ListArgs {
    #[arg(long, default_value = ALL_LOCATIONS, long_help = "zone or region to list; `-` lists every location")]
    pub location: String,
}

pub async fn cmd(subcommand: &ClustersSubcommand, ctx: &Context) -> EmptyResult {
    let client = ctx.client()?;
    let project = ctx.project()?;

    match subcommand {
        ClustersSubcommand::Create(args) => {
            let section = CtrlCSection::install();
            create_cmd(args, ctx, &client, &project, section.interrupts()).await
        },
        ClustersSubcommand::Delete(args) => {
            // SIGINT keeps its default meaning until the prompt has been answered
            let mut section = None;
            let install = || section.insert(CtrlCSection::install()).interrupts();
            delete_cmd(args, ctx, &client, &project, install, &mut io::stdin().lock()).await
        },
        ClustersSubcommand::Describe(args) => {
            let location = resolve_location(args.location.as_deref(), ctx)?;
            let cluster = client.get_cluster(&project, &location, &args.name).await?;
            print_resource(ctx.format, &cluster)
        },
        ClustersSubcommand::List(args) => {
            let clusters = client.list_clusters(&project, &args.location).await?;
            print_list(ctx.format, &clusters, |c| ClusterRow::from(c))
        },
    }
}

pub(crate) fn resolve_location(flag: Option<&str>, ctx: &Context) -> anyhow::Result<String> {
    if let Some(location) = flag {
        return Ok(location.into());
    }
    ctx.default_location()?.ok_or(anyhow!(
        "no location is set; pass --location or run `nbctl config set compute/zone ZONE` \
        (or `nbctl config set compute/region REGION`)"
    ))
}

pub(crate) fn cluster_request(args: &CreateArgs) -> Cluster {
    Cluster {
        name: args.name.clone(),
        initial_node_count: Some(args.num_nodes),
        node_config: Some(NodeConfig {
            machine_type: Some(args.machine_type.clone()),
            disk_size_gb: args.disk_size,
        }),
        ..Default::default()
    }
}

pub(crate) async fn create_cmd(
    args: &CreateArgs,
    ctx: &Context,
    client: &RestClient,
    project: &str,
    interrupts: Interrupts,
) -> EmptyResult {
    let location = resolve_location(args.location.as_deref(), ctx)?;
    let timeout = args.timeout.as_deref().map(parse_duration).transpose()?;

    let op = client.create_cluster(project, &location, &cluster_request(args)).await?;
    info!("creating cluster {} (operation {})", args.name, op.name);
    if args.async_ {
        return print_resource(ctx.format, &op);
    }

    let opts = ctx
        .wait_options()?
        .with_timeout(timeout)
        .with_interrupt_policy(InterruptPolicy::Abort);
    let mut poller = LroPoller::new(client, Service::Containers, &op.name).with_label(&args.name);
    let progress = SpinnerProgress::new(&format!("Creating cluster {}", args.name));
    wait_for(&mut poller, &opts, interrupts, &progress).await?;

    let cluster = client.get_cluster(project, &location, &args.name).await?;
    eprintln!("Created [{}].", cluster.self_link.as_deref().unwrap_or(&cluster.name));
    print_list(ctx.format, &[cluster], |c| ClusterRow::from(c))
}

pub(crate) async fn delete_cmd(
    args: &DeleteArgs,
    ctx: &Context,
    client: &RestClient,
    project: &str,
    install_interrupts: impl FnOnce() -> Interrupts,
    input: &mut impl BufRead,
) -> EmptyResult {
    let location = resolve_location(args.location.as_deref(), ctx)?;
    confirm_deletion("clusters", &args.names, ctx.quiet, input)?;

    let location = location.as_str();
    let requests = args.names.iter().map(|name| async move {
        (name.clone(), client.delete_cluster(project, location, name).await)
    });
    let started = partition(join_all(requests).await);
    if args.async_ {
        return report_started(ctx.format, started);
    }

    let progress = SpinnerProgress::new(&format!("Deleting {} cluster(s)", args.names.len()));
    let opts = ctx.wait_options()?;
    let outcome = wait_started(client, Service::Containers, started, &opts, install_interrupts(), &progress).await;
    for (name, _) in &outcome.succeeded {
        eprintln!("Deleted [{name}].");
    }
    outcome.into_result()?;
    Ok(())
}
