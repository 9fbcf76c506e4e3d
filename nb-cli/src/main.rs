mod batch;
mod builds;
mod clusters;
mod completions;
mod config_cmd;
mod context;
mod instances;
mod operations;
mod prompt;

use std::process;

use clap::{
    ArgMatches,
    CommandFactory,
    FromArgMatches,
    Parser,
    Subcommand,
    crate_version,
};
use nb_core::errors::*;
use nb_core::logging;
use nb_core::prelude::*;
use nb_core::waiter::is_aborted;
use tracing::*;

use crate::builds::BuildsSubcommand;
use crate::clusters::ClustersSubcommand;
use crate::config_cmd::ConfigSubcommand;
use crate::context::{
    Context,
    GlobalArgs,
};
use crate::instances::InstancesSubcommand;
use crate::operations::OperationsSubcommand;

const BIN_NAME: &str = "nbctl";

#[derive(Parser)]
#[command(
    name = BIN_NAME,
    about = "command-line tool for the Nimbus cloud platform",
    version,
    propagate_version = true
)]
struct NbCommandRoot {
    #[command(subcommand)]
    subcommand: NbSubcommand,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Subcommand)]
enum NbSubcommand {
    #[command(subcommand, about = "submit builds and follow their logs", visible_alias = "b")]
    Builds(BuildsSubcommand),

    #[command(subcommand, about = "create and manage container clusters")]
    Clusters(ClustersSubcommand),

    #[command(about = "generate shell completions for nbctl")]
    Completions(completions::Args),

    #[command(subcommand, about = "read and write nbctl properties")]
    Config(ConfigSubcommand),

    #[command(subcommand, about = "create and manage VM instances")]
    Instances(InstancesSubcommand),

    #[command(subcommand, about = "inspect and wait on long-running operations", visible_alias = "ops")]
    Operations(OperationsSubcommand),

    #[command(about = "nbctl version")]
    Version,
}

// `nbctl.builds.submit`, used to tag error messages with the command that produced them
fn command_path(matches: &ArgMatches) -> String {
    let mut path = BIN_NAME.to_string();
    let mut current = matches;
    while let Some((name, sub)) = current.subcommand() {
        path += &format!(".{name}");
        current = sub;
    }
    path
}

async fn run(subcommand: &NbSubcommand, ctx: &Context) -> EmptyResult {
    match subcommand {
        NbSubcommand::Builds(sub) => builds::cmd(sub, ctx).await,
        NbSubcommand::Clusters(sub) => clusters::cmd(sub, ctx).await,
        NbSubcommand::Completions(args) => completions::cmd(args, NbCommandRoot::command()),
        NbSubcommand::Config(sub) => config_cmd::cmd(sub, ctx),
        NbSubcommand::Instances(sub) => instances::cmd(sub, ctx).await,
        NbSubcommand::Operations(sub) => operations::cmd(sub, ctx).await,
        NbSubcommand::Version => {
            println!("{BIN_NAME} {}", crate_version!());
            Ok(())
        },
    }
}

#[tokio::main]
async fn main() {
    let matches = NbCommandRoot::command().get_matches();
    let args = NbCommandRoot::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    let path = command_path(&matches);

    let ctx = match Context::load(&args.global) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("ERROR: ({path}) {err:#}");
            process::exit(EXIT_FAILURE);
        },
    };
    logging::setup_for_cli(ctx.verbosity(), args.global.log_http);

    if let Err(err) = run(&args.subcommand, &ctx).await {
        if ctx.is_debug() {
            nberr!(err, "{} failed", path);
        }
        eprintln!("ERROR: ({path}) {err:#}");
        process::exit(if is_aborted(&err) { EXIT_INTERRUPTED } else { EXIT_FAILURE });
    }
}

#[cfg(test)]
mod tests;
