use anyhow::{
    anyhow,
    bail,
};
use clap::Subcommand;
use nb_core::interrupt::{
    CtrlCSection,
    Interrupts,
};
use nb_core::output::{
    OperationRow,
    print_list,
    print_resource,
};
use nb_core::prelude::*;
use nb_core::progress::SpinnerProgress;
use nb_core::services::OperationsApi;
use nb_core::time::parse_duration;
use nb_core::waiter::{
    InterruptPolicy,
    LroPoller,
    wait_for,
};

use crate::context::Context;

#[derive(Subcommand)]
pub enum OperationsSubcommand {
    #[command(about = "show the current state of an operation")]
    Describe(NameArgs),

    #[command(about = "wait for an operation to finish and print its response")]
    Wait(WaitArgs),

    #[command(about = "ask the server to cancel an operation")]
    Cancel(NameArgs),

    #[command(about = "list operations", visible_alias = "ls")]
    List(ListArgs),
}

#[derive(clap::Args)]
pub struct ServiceArgs {
    #[arg(
        long,
        default_value = "containers",
        value_parser = parse_operation_service,
        long_help = "service that owns the operation: builds, containers or compute"
    )]
    pub service: Service,

    #[arg(long, long_help = "zone or region of the operation; defaults to compute/zone, then compute/region")]
    pub location: Option<String>,
}

#[derive(clap::Args)]
pub struct NameArgs {
    #[arg(long_help = "operation ID, or its full resource name")]
    pub name: String,

    #[command(flatten)]
    pub service: ServiceArgs,
}

#[derive(clap::Args)]
pub struct WaitArgs {
    #[command(flatten)]
    pub op: NameArgs,

    #[arg(long, long_help = "give up waiting after this long (e.g. 90s, 10m); overrides waiter/timeout")]
    pub timeout: Option<String>,
}

#[derive(clap::Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub service: ServiceArgs,

    #[arg(long, long_help = "maximum number of operations to list")]
    pub limit: Option<usize>,
}

fn parse_operation_service(s: &str) -> Result<Service, String> {
    match s.parse()? {
        Service::Storage => Err("storage does not have operations".into()),
        service => Ok(service),
    }
}

pub async fn cmd(subcommand: &OperationsSubcommand, ctx: &Context) -> EmptyResult {
    let client = ctx.client()?;
    let project = ctx.project()?;

    match subcommand {
        OperationsSubcommand::Describe(args) => {
            let name = operation_path(&args.service, ctx, &project, &args.name)?;
            let op = client.get_operation(args.service.service, &name).await?;
            print_resource(ctx.format, &op)
        },
        OperationsSubcommand::Wait(args) => {
            let section = CtrlCSection::install();
            wait_cmd(args, ctx, &client, &project, section.interrupts()).await
        },
        OperationsSubcommand::Cancel(args) => {
            let name = operation_path(&args.service, ctx, &project, &args.name)?;
            client.cancel_operation(args.service.service, &name).await?;
            eprintln!("Cancellation requested for [{name}].");
            Ok(())
        },
        OperationsSubcommand::List(args) => {
            let parent = operation_parent(&args.service, ctx, &project)?;
            let ops = client.list_operations(args.service.service, &parent, args.limit).await?;
            print_list(ctx.format, &ops, |op| OperationRow::from(op))
        },
    }
}

pub(crate) async fn wait_cmd(
    args: &WaitArgs,
    ctx: &Context,
    client: &RestClient,
    project: &str,
    interrupts: Interrupts,
) -> EmptyResult {
    let name = operation_path(&args.op.service, ctx, project, &args.op.name)?;
    let timeout = args.timeout.as_deref().map(parse_duration).transpose()?;
    let opts = ctx
        .wait_options()?
        .with_timeout(timeout)
        .with_interrupt_policy(InterruptPolicy::Abort);

    let mut poller = LroPoller::new(client, args.op.service.service, &name);
    let progress = SpinnerProgress::new(&format!("Waiting for [{name}]"));
    let response = wait_for(&mut poller, &opts, interrupts, &progress).await?;
    print_resource(ctx.format, &response)
}

/// Expands a bare operation ID into its full resource name; full names pass through.
pub(crate) fn operation_path(args: &ServiceArgs, ctx: &Context, project: &str, name: &str) -> anyhow::Result<String> {
    if name.contains('/') {
        return Ok(name.trim_start_matches('/').into());
    }
    Ok(format!("{}/operations/{name}", operation_parent(args, ctx, project)?))
}

pub(crate) fn operation_parent(args: &ServiceArgs, ctx: &Context, project: &str) -> anyhow::Result<String> {
    let location = match &args.location {
        Some(l) => Some(l.clone()),
        None => ctx.default_location()?,
    };

    match args.service {
        Service::Builds => Ok(format!("projects/{project}/locations/{}", location.as_deref().unwrap_or("global"))),
        Service::Containers => Ok(format!("projects/{project}/locations/{}", location.as_deref().unwrap_or("-"))),
        Service::Compute => {
            let zone = location.ok_or(anyhow!(
                "compute operations are zonal; pass --location or run `nbctl config set compute/zone ZONE`"
            ))?;
            Ok(format!("projects/{project}/zones/{zone}"))
        },
        Service::Storage => bail!("storage does not have operations"),
    }
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use nb_testutils::*;
    use serde_json::json;

    use super::*;
    use crate::tests::*;

    fn service_args(service: Service, location: Option<&str>) -> ServiceArgs {
        ServiceArgs { service, location: location.map(String::from) }
    }

    #[rstest]
    #[case::full_name(Service::Containers, None, TEST_OPERATION_NAME, TEST_OPERATION_NAME)]
    #[case::containers(
        Service::Containers,
        Some(TEST_LOCATION),
        "operation-1234",
        TEST_OPERATION_NAME
    )]
    #[case::containers_any(Service::Containers, None, "op-1", "projects/test-project/locations/-/operations/op-1")]
    #[case::builds(Service::Builds, None, "op-1", "projects/test-project/locations/global/operations/op-1")]
    #[case::compute(
        Service::Compute,
        Some(TEST_ZONE),
        "op-1",
        "projects/test-project/zones/us-east1-b/operations/op-1"
    )]
    fn test_operation_path(
        #[case] service: Service,
        #[case] location: Option<&str>,
        #[case] name: &str,
        #[case] expected: &str,
    ) {
        let ctx = context_with(Properties::default());
        let path = operation_path(&service_args(service, location), &ctx, TEST_PROJECT, name).unwrap();
        assert_eq!(path, expected);
    }

    #[rstest]
    fn test_compute_operation_needs_zone() {
        let ctx = context_with(Properties::default());
        let err = operation_path(&service_args(Service::Compute, None), &ctx, TEST_PROJECT, "op-1").unwrap_err();
        assert_contains!(format!("{err}"), "nbctl config set compute/zone");
    }

    #[rstest]
    fn test_compute_operation_zone_from_property() {
        let mut props = Properties::default();
        props.set("compute/zone", TEST_ZONE).unwrap();
        let ctx = context_with(props);

        let parent = operation_parent(&service_args(Service::Compute, None), &ctx, TEST_PROJECT).unwrap();
        assert_eq!(parent, format!("projects/{TEST_PROJECT}/zones/{TEST_ZONE}"));
    }

    #[rstest]
    fn test_storage_is_not_an_operation_service() {
        assert_err!(parse_operation_service("storage"));
        assert_eq!(parse_operation_service("compute").unwrap(), Service::Compute);
    }

    #[rstest]
    #[tokio::test]
    async fn test_wait_prints_response() {
        let fake = FakeApi::start().await;
        let op = fake
            .get_ok(
                &format!("/v1/{TEST_OPERATION_NAME}"),
                json!(finished_operation(TEST_OPERATION_NAME, json!({"name": TEST_CLUSTER_NAME}), None)),
            )
            .await;
        let ctx = fake_context(&fake);

        let args = WaitArgs {
            op: NameArgs {
                name: TEST_OPERATION_NAME.into(),
                service: service_args(Service::Containers, None),
            },
            timeout: None,
        };
        wait_cmd(&args, &ctx, &ctx.client().unwrap(), TEST_PROJECT, Interrupts::never())
            .await
            .unwrap();
        op.assert_calls_async(1).await;
    }

    #[rstest]
    #[tokio::test]
    async fn test_wait_reports_operation_error() {
        let fake = FakeApi::start().await;
        fake.get_ok(
            &format!("/v1/{TEST_OPERATION_NAME}"),
            json!(finished_operation(TEST_OPERATION_NAME, json!({}), Some((8, "quota exceeded")))),
        )
        .await;
        let ctx = fake_context(&fake);

        let args = WaitArgs {
            op: NameArgs {
                name: "operation-1234".into(),
                service: service_args(Service::Containers, Some(TEST_LOCATION)),
            },
            timeout: None,
        };
        let err = wait_cmd(&args, &ctx, &ctx.client().unwrap(), TEST_PROJECT, Interrupts::never())
            .await
            .unwrap_err();
        assert_eq!(format!("{err}"), "operation failed: 8: quota exceeded");
    }

    #[rstest]
    #[tokio::test]
    async fn test_wait_timeout() {
        let fake = FakeApi::start().await;
        fake.get_ok(&format!("/v1/{TEST_OPERATION_NAME}"), json!(test_operation(TEST_OPERATION_NAME)))
            .await;
        let ctx = fake_context(&fake);

        let args = WaitArgs {
            op: NameArgs {
                name: TEST_OPERATION_NAME.into(),
                service: service_args(Service::Containers, None),
            },
            timeout: Some("50ms".into()),
        };
        let err = wait_cmd(&args, &ctx, &ctx.client().unwrap(), TEST_PROJECT, Interrupts::never())
            .await
            .unwrap_err();
        assert_contains!(format!("{err}"), "timed out waiting for");
    }
}
