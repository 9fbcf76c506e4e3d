use std::collections::BTreeMap;
use std::io::{
    self,
    BufRead,
};

use anyhow::{
    anyhow,
    bail,
};
use clap::Subcommand;
use futures::future::join_all;
use nb_api::v1::{
    AttachedDisk,
    InitializeParams,
    NetworkInterface,
};
use nb_core::interrupt::{
    CtrlCSection,
    Interrupts,
};
use nb_core::output::{
    InstanceRow,
    print_list,
    print_resource,
};
use nb_core::prelude::*;
use nb_core::progress::SpinnerProgress;
use nb_core::services::InstancesApi;
use tracing::*;

use crate::batch::{
    partition,
    report_started,
    wait_started,
};
use crate::context::Context;
use crate::prompt::confirm_deletion;

const ALL_ZONES: &str = "-";
const DEFAULT_NETWORK: &str = "global/networks/default";

#[derive(Subcommand)]
pub enum InstancesSubcommand {
    #[command(about = "create one or more VM instances")]
    Create(CreateArgs),

    #[command(about = "delete one or more VM instances", visible_aliases = ["del", "rm"])]
    Delete(DeleteArgs),

    #[command(about = "show everything about a VM instance")]
    Describe(DescribeArgs),

    #[command(about = "list VM instances", visible_alias = "ls")]
    List(ListArgs),
}

#[derive(clap::Args)]
pub struct ZoneArgs {
    #[arg(long, long_help = "zone of the instances; defaults to the compute/zone property")]
    pub zone: Option<String>,
}

#[derive(clap::Args)]
pub struct CreateArgs {
    #[arg(required = true, long_help = "names of the instances to create")]
    pub names: Vec<String>,

    #[command(flatten)]
    pub zone: ZoneArgs,

    #[arg(long, default_value = "e2-medium", long_help = "machine type of the instances")]
    pub machine_type: String,

    #[arg(long, default_value = "debian-12", long_help = "boot disk image")]
    pub image: String,

    #[arg(long, long_help = "labels to attach, as KEY=VALUE[,KEY=VALUE...]")]
    pub labels: Option<String>,

    #[arg(long = "async", long_help = "return as soon as the insert requests are accepted")]
    pub async_: bool,
}

#[derive(clap::Args)]
pub struct DeleteArgs {
    #[arg(required = true, long_help = "names of the instances to delete")]
    pub names: Vec<String>,

    #[command(flatten)]
    pub zone: ZoneArgs,

    #[arg(long = "async", long_help = "return as soon as the delete requests are accepted")]
    pub async_: bool,
}

#[derive(clap::Args)]
pub struct DescribeArgs {
    #[arg(long_help = "name of the instance")]
    pub name: String,

    #[command(flatten)]
    pub zone: ZoneArgs,
}

#[derive(clap::Args)]
pub struct ListArgs {
    #[arg(long, long_help = "zone to list; defaults to compute/zone, or every zone if that is not set")]
    pub zone: Option<String>,
}

pub async fn cmd(subcommand: &InstancesSubcommand, ctx: &Context) -> EmptyResult {
    let client = ctx.client()?;
    let project = ctx.project()?;

    match subcommand {
        InstancesSubcommand::Create(args) => {
            let section = CtrlCSection::install();
            create_cmd(args, ctx, &client, &project, section.interrupts()).await
        },
        InstancesSubcommand::Delete(args) => {
            // SIGINT keeps its default meaning until the prompt has been answered
            let mut section = None;
            let install = || section.insert(CtrlCSection::install()).interrupts();
            delete_cmd(args, ctx, &client, &project, install, &mut io::stdin().lock()).await
        },
        InstancesSubcommand::Describe(args) => {
            let zone = resolve_zone(&args.zone, ctx)?;
            let instance = client.get_instance(&project, &zone, &args.name).await?;
            print_resource(ctx.format, &instance)
        },
        InstancesSubcommand::List(args) => {
            let zone = match &args.zone {
                Some(z) => z.clone(),
                None => ctx.property("compute/zone")?.unwrap_or(ALL_ZONES.into()),
            };
            let instances = client.list_instances(&project, &zone).await?;
            print_list(ctx.format, &instances, |i| InstanceRow::from(i))
        },
    }
}

pub(crate) fn resolve_zone(args: &ZoneArgs, ctx: &Context) -> anyhow::Result<String> {
    if let Some(zone) = &args.zone {
        return Ok(zone.clone());
    }
    ctx.property("compute/zone")?
        .ok_or(anyhow!("no zone is set; pass --zone or run `nbctl config set compute/zone ZONE`"))
}

pub(crate) fn parse_labels(s: &str) -> anyhow::Result<BTreeMap<String, String>> {
    let mut labels = BTreeMap::new();
    for pair in s.split(',').filter(|p| !p.trim().is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("label {pair:?} is not of the form KEY=VALUE");
        };
        let key = key.trim();
        if key.is_empty() || key.chars().any(|c| c.is_ascii_uppercase()) {
            bail!("label key {key:?} must be non-empty and lower case");
        }
        labels.insert(key.to_string(), value.trim().to_string());
    }
    Ok(labels)
}

pub(crate) fn instance_request(
    name: &str,
    zone: &str,
    args: &CreateArgs,
    labels: &BTreeMap<String, String>,
) -> Instance {
    Instance {
        name: name.into(),
        machine_type: Some(format!("zones/{zone}/machineTypes/{}", args.machine_type)),
        disks: vec![AttachedDisk {
            boot: true,
            auto_delete: true,
            initialize_params: Some(InitializeParams { source_image: Some(args.image.clone()), disk_size_gb: None }),
        }],
        network_interfaces: vec![NetworkInterface { network: Some(DEFAULT_NETWORK.into()), network_ip: None }],
        labels: labels.clone(),
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
    let zone = resolve_zone(&args.zone, ctx)?;
    let labels = args.labels.as_deref().map(parse_labels).transpose()?.unwrap_or_default();

    let zone = zone.as_str();
    let requests = args.names.iter().map(|name| {
        let instance = instance_request(name, zone, args, &labels);
        async move { (name.clone(), client.insert_instance(project, zone, &instance).await) }
    });
    let started = partition(join_all(requests).await);
    for (name, err) in &started.failed {
        warn!("could not start creating {name}: {err:#}");
    }
    if args.async_ {
        return report_started(ctx.format, started);
    }

    let progress = SpinnerProgress::new(&format!("Creating {} instance(s)", args.names.len()));
    let outcome = wait_started(client, Service::Compute, started, &ctx.wait_options()?, interrupts, &progress).await;

    let mut created = vec![];
    for (name, _) in &outcome.succeeded {
        match client.get_instance(project, zone, name).await {
            Ok(instance) => created.push(instance),
            Err(err) => warn!("created {name} but could not fetch it: {err:#}"),
        }
    }
    print_list(ctx.format, &created, |i| InstanceRow::from(i))?;

    outcome.into_result()?;
    Ok(())
}

pub(crate) async fn delete_cmd(
    args: &DeleteArgs,
    ctx: &Context,
    client: &RestClient,
    project: &str,
    install_interrupts: impl FnOnce() -> Interrupts,
    input: &mut impl BufRead,
) -> EmptyResult {
    let zone = resolve_zone(&args.zone, ctx)?;
    confirm_deletion("instances", &args.names, ctx.quiet, input)?;

    let zone = zone.as_str();
    let requests = args.names.iter().map(|name| async move {
        (name.clone(), client.delete_instance(project, zone, name).await)
    });
    let started = partition(join_all(requests).await);
    if args.async_ {
        return report_started(ctx.format, started);
    }

    let progress = SpinnerProgress::new(&format!("Deleting {} instance(s)", args.names.len()));
    let opts = ctx.wait_options()?;
    let outcome = wait_started(client, Service::Compute, started, &opts, install_interrupts(), &progress).await;
    for (name, _) in &outcome.succeeded {
        eprintln!("Deleted [{name}].");
    }
    outcome.into_result()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use httpmock::prelude::*;
    use nb_testutils::*;
    use serde_json::json;

    use super::*;
    use crate::tests::*;

    const INSTANCES_PATH: &str = "/compute/v1/projects/test-project/zones/us-east1-b/instances";

    fn create_args(names: &[&str]) -> CreateArgs {
        CreateArgs {
            names: names.iter().map(|n| n.to_string()).collect(),
            zone: ZoneArgs { zone: Some(TEST_ZONE.into()) },
            machine_type: "e2-medium".into(),
            image: "debian-12".into(),
            labels: None,
            async_: false,
        }
    }

    fn op_name(id: &str) -> String {
        format!("projects/{TEST_PROJECT}/zones/{TEST_ZONE}/operations/{id}")
    }

    #[rstest]
    fn test_parse_labels() {
        let labels = parse_labels("env=prod, team = infra").unwrap();
        assert_eq!(labels.get("env").map(String::as_str), Some("prod"));
        assert_eq!(labels.get("team").map(String::as_str), Some("infra"));
    }

    #[rstest]
    #[case::no_value("env")]
    #[case::upper("Env=prod")]
    #[case::empty_key("=prod")]
    fn test_parse_labels_invalid(#[case] input: &str) {
        assert_err!(parse_labels(input));
    }

    #[rstest]
    fn test_instance_request() {
        let instance = instance_request(TEST_INSTANCE_NAME, TEST_ZONE, &create_args(&[]), &BTreeMap::new());
        assert_eq!(instance.machine_type.as_deref(), Some("zones/us-east1-b/machineTypes/e2-medium"));
        assert!(instance.disks[0].boot);
        assert_eq!(
            instance.disks[0].initialize_params.as_ref().and_then(|p| p.source_image.as_deref()),
            Some("debian-12")
        );
    }

    #[rstest]
    fn test_resolve_zone_hint() {
        let err = resolve_zone(&ZoneArgs { zone: None }, &context_with(Properties::default())).unwrap_err();
        assert_contains!(format!("{err}"), "nbctl config set compute/zone");
    }

    #[rstest]
    #[tokio::test]
    async fn test_create_reports_partial_failure() {
        let fake = FakeApi::start().await;
        for (vm, op) in [("vm-1", "insert-1"), ("vm-2", "insert-2")] {
            let body = json!(test_operation(&op_name(op)));
            let pattern = format!(r#""name":"{vm}""#);
            fake.server
                .mock_async(move |when, then| {
                    when.method(POST).path(INSTANCES_PATH).body_includes(pattern.as_str());
                    then.status(200).json_body(body.clone());
                })
                .await;
        }
        fake.server
            .mock_async(|when, then| {
                when.method(POST).path(INSTANCES_PATH).body_includes(r#""name":"vm-3""#);
                then.status(409).json_body(api_error(409, "instance vm-3 already exists"));
            })
            .await;
        fake.get_ok(
            &format!("/compute/v1/{}", op_name("insert-1")),
            json!(finished_operation(&op_name("insert-1"), json!({}), None)),
        )
        .await;
        fake.get_ok(
            &format!("/compute/v1/{}", op_name("insert-2")),
            json!(finished_operation(&op_name("insert-2"), json!({}), Some((3, "image not found")))),
        )
        .await;
        let get = fake.get_ok(&format!("{INSTANCES_PATH}/vm-1"), json!(test_instance("vm-1"))).await;
        let ctx = fake_context(&fake);

        let err = create_cmd(
            &create_args(&["vm-1", "vm-2", "vm-3"]),
            &ctx,
            &ctx.client().unwrap(),
            TEST_PROJECT,
            Interrupts::never(),
        )
        .await
        .unwrap_err();

        get.assert_calls_async(1).await;
        let msg = format!("{err}");
        assert_contains!(msg, "2 of 3 operations failed");
        assert_contains!(msg, "vm-2: operation failed: 3: image not found");
        assert_contains!(msg, "instance vm-3 already exists");
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_quiet_skips_prompt() {
        let fake = FakeApi::start().await;
        let delete = fake
            .delete_ok(&format!("{INSTANCES_PATH}/{TEST_INSTANCE_NAME}"), json!(test_operation(&op_name("delete-1"))))
            .await;
        fake.get_ok(
            &format!("/compute/v1/{}", op_name("delete-1")),
            json!(finished_operation(&op_name("delete-1"), json!({}), None)),
        )
        .await;
        let mut ctx = fake_context(&fake);
        ctx.quiet = true;

        let args = DeleteArgs {
            names: vec![TEST_INSTANCE_NAME.into()],
            zone: ZoneArgs { zone: Some(TEST_ZONE.into()) },
            async_: false,
        };
        delete_cmd(&args, &ctx, &ctx.client().unwrap(), TEST_PROJECT, Interrupts::never, &mut "".as_bytes())
            .await
            .unwrap();
        delete.assert_calls_async(1).await;
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_declined_leaves_ctrl_c_alone() {
        let fake = FakeApi::start().await;
        let delete = fake.delete_ok(&format!("{INSTANCES_PATH}/{TEST_INSTANCE_NAME}"), json!({})).await;
        let ctx = fake_context(&fake);
        let mut installed = false;

        let args = DeleteArgs {
            names: vec![TEST_INSTANCE_NAME.into()],
            zone: ZoneArgs { zone: Some(TEST_ZONE.into()) },
            async_: false,
        };
        let install = || {
            installed = true;
            Interrupts::never()
        };
        let err = delete_cmd(&args, &ctx, &ctx.client().unwrap(), TEST_PROJECT, install, &mut "n\n".as_bytes())
            .await
            .unwrap_err();
        assert_eq!(format!("{err}"), "aborted by user");
        assert!(!installed);
        delete.assert_calls_async(0).await;
    }
}
