use anyhow::bail;
use clap::Subcommand;
use nb_core::prelude::*;
use nb_core::properties::{
    PROPERTY_NAMES,
    PropertiesFile,
    env_var_for,
};
use tracing::*;

use crate::context::Context;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    #[command(about = "set a property")]
    Set(SetArgs),

    #[command(about = "print the value of a property")]
    Get(NameArgs),

    #[command(about = "remove a property")]
    Unset(NameArgs),

    #[command(about = "list all properties that are set")]
    List,
}

#[derive(clap::Args)]
pub struct SetArgs {
    #[arg(long_help = "property name, as SECTION/KEY (e.g. compute/zone)")]
    pub name: String,

    #[arg(long_help = "value to store")]
    pub value: String,
}

#[derive(clap::Args)]
pub struct NameArgs {
    #[arg(long_help = "property name, as SECTION/KEY (e.g. compute/zone)")]
    pub name: String,
}

pub fn cmd(subcommand: &ConfigSubcommand, ctx: &Context) -> EmptyResult {
    let mut file = PropertiesFile::load(&ctx.props_path)?;
    match subcommand {
        ConfigSubcommand::Set(args) => set_cmd(args, &mut file),
        ConfigSubcommand::Get(args) => {
            println!("{}", get_cmd(args, &file.properties)?);
            Ok(())
        },
        ConfigSubcommand::Unset(args) => unset_cmd(args, &mut file),
        ConfigSubcommand::List => {
            print!("{}", list_cmd(&file.properties));
            Ok(())
        },
    }
}

pub(crate) fn set_cmd(args: &SetArgs, file: &mut PropertiesFile) -> EmptyResult {
    file.properties.set(&args.name, &args.value)?;
    file.save()?;
    eprintln!("Updated property [{}].", args.name);
    if std::env::var(env_var_for(&args.name)).is_ok_and(|v| !v.is_empty()) {
        warn!("{} is set in the environment and overrides this value", env_var_for(&args.name));
    }
    Ok(())
}

pub(crate) fn get_cmd(args: &NameArgs, props: &Properties) -> anyhow::Result<String> {
    match props.resolve(&args.name)? {
        Some(value) => Ok(value),
        None => bail!("property {} is not set", args.name),
    }
}

pub(crate) fn unset_cmd(args: &NameArgs, file: &mut PropertiesFile) -> EmptyResult {
    if file.properties.unset(&args.name)? {
        file.save()?;
        eprintln!("Unset property [{}].", args.name);
    } else {
        eprintln!("Property [{}] was not set.", args.name);
    }
    Ok(())
}

// Grouped into `[section]` blocks in PROPERTY_NAMES order
pub(crate) fn list_cmd(props: &Properties) -> String {
    let mut out = String::new();
    let mut current_section = "";
    for (name, value) in props.list() {
        let (section, key) = name.split_once('/').unwrap_or(("", name));
        if section != current_section {
            out += &format!("[{section}]\n");
            current_section = section;
        }
        out += &format!("{key} = {value}\n");
    }

    if out.is_empty() {
        debug!("no properties set; valid properties are {}", PROPERTY_NAMES.join(", "));
    }
    out
}
