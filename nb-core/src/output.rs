use std::fmt;
use std::str::FromStr;

use nb_api::v1::{
    Build,
    Cluster,
    Instance,
    Operation,
};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{
    Table,
    Tabled,
};

use crate::errors::*;
use crate::time::format_seconds;

const EMPTY_CELL: &str = "-";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    Json,
    Yaml,
    #[default]
    Table,
    None,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            "table" => Ok(OutputFormat::Table),
            "none" => Ok(OutputFormat::None),
            other => Err(format!("unknown format: {other} (expected one of: json, yaml, table, none)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Table => "table",
            OutputFormat::None => "none",
        };
        write!(f, "{s}")
    }
}

/// Renders a single resource.  A table of one row is not very useful for a describe, so the
/// table format falls back to YAML here.
pub fn render_resource<T: Serialize>(format: OutputFormat, resource: &T) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(resource)?),
        OutputFormat::Yaml | OutputFormat::Table => serde_yaml::to_string(resource)?,
        OutputFormat::None => String::new(),
    })
}

pub fn render_list<T: Serialize, R: Tabled>(
    format: OutputFormat,
    items: &[T],
    to_row: impl Fn(&T) -> R,
) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(items)?),
        OutputFormat::Yaml => serde_yaml::to_string(items)?,
        OutputFormat::Table if items.is_empty() => String::new(),
        OutputFormat::Table => {
            let mut table = Table::new(items.iter().map(to_row));
            table.with(Style::blank());
            format!("{table}\n")
        },
        OutputFormat::None => String::new(),
    })
}

pub fn print_resource<T: Serialize>(format: OutputFormat, resource: &T) -> EmptyResult {
    print!("{}", render_resource(format, resource)?);
    Ok(())
}

pub fn print_list<T: Serialize, R: Tabled>(format: OutputFormat, items: &[T], to_row: impl Fn(&T) -> R) -> EmptyResult {
    print!("{}", render_list(format, items, to_row)?);
    Ok(())
}

fn or_empty(value: Option<impl ToString>) -> String {
    value.map_or(EMPTY_CELL.into(), |v| v.to_string())
}

#[derive(Tabled)]
pub struct BuildRow {
    #[tabled(rename = "ID")]
    pub id: String,

    #[tabled(rename = "CREATE_TIME")]
    pub create_time: String,

    #[tabled(rename = "DURATION")]
    pub duration: String,

    #[tabled(rename = "STATUS")]
    pub status: String,
}

impl From<&Build> for BuildRow {
    fn from(build: &Build) -> Self {
        BuildRow {
            id: build.id.clone(),
            create_time: or_empty(build.create_time.map(|t| t.to_rfc3339())),
            duration: or_empty(build.duration_seconds().map(format_seconds)),
            status: build.status.to_string(),
        }
    }
}

#[derive(Tabled)]
pub struct ClusterRow {
    #[tabled(rename = "NAME")]
    pub name: String,

    #[tabled(rename = "LOCATION")]
    pub location: String,

    #[tabled(rename = "MASTER_VERSION")]
    pub master_version: String,

    #[tabled(rename = "MACHINE_TYPE")]
    pub machine_type: String,

    #[tabled(rename = "NUM_NODES")]
    pub num_nodes: String,

    #[tabled(rename = "STATUS")]
    pub status: String,
}

impl From<&Cluster> for ClusterRow {
    fn from(cluster: &Cluster) -> Self {
        ClusterRow {
            name: cluster.name.clone(),
            location: or_empty(cluster.location.as_ref()),
            master_version: or_empty(cluster.current_master_version.as_ref()),
            machine_type: or_empty(cluster.node_config.as_ref().and_then(|nc| nc.machine_type.as_ref())),
            num_nodes: or_empty(cluster.initial_node_count),
            status: wire_name(&cluster.status),
        }
    }
}

#[derive(Tabled)]
pub struct InstanceRow {
    #[tabled(rename = "NAME")]
    pub name: String,

    #[tabled(rename = "ZONE")]
    pub zone: String,

    #[tabled(rename = "MACHINE_TYPE")]
    pub machine_type: String,

    #[tabled(rename = "INTERNAL_IP")]
    pub internal_ip: String,

    #[tabled(rename = "STATUS")]
    pub status: String,
}

impl From<&Instance> for InstanceRow {
    fn from(instance: &Instance) -> Self {
        InstanceRow {
            name: instance.name.clone(),
            zone: or_empty(instance.zone.as_deref().map(last_segment)),
            machine_type: or_empty(instance.machine_type.as_deref().map(last_segment)),
            internal_ip: or_empty(instance.internal_ip()),
            status: wire_name(&instance.status),
        }
    }
}

#[derive(Tabled)]
pub struct OperationRow {
    #[tabled(rename = "NAME")]
    pub name: String,

    #[tabled(rename = "DONE")]
    pub done: bool,

    #[tabled(rename = "ERROR")]
    pub error: String,
}

impl From<&Operation> for OperationRow {
    fn from(op: &Operation) -> Self {
        OperationRow {
            name: op.short_name().into(),
            done: op.done,
            error: or_empty(op.error.as_ref().map(|e| e.message.clone())),
        }
    }
}

fn wire_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => EMPTY_CELL.into(),
    }
}

// Compute returns zones and machine types as full resource URLs
fn last_segment(s: &str) -> &str {
    s.rsplit('/').next().unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use nb_api::v1::BuildStatus;
    use nb_testutils::*;

    use super::*;

    #[rstest]
    fn test_render_list_table(test_build: Build) {
        let mut other = test_build.clone();
        other.id = "second-build".into();
        other.status = BuildStatus::Failure;

        let out = render_list(OutputFormat::Table, &[test_build, other], |b| BuildRow::from(b)).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].split_whitespace().collect::<Vec<_>>(), vec!["ID", "CREATE_TIME", "DURATION", "STATUS"]);
        assert_contains!(lines[1], TEST_BUILD_ID);
        assert_contains!(lines[2], "FAILURE");
    }

    #[rstest]
    fn test_render_list_empty_table() {
        let out = render_list(OutputFormat::Table, &[] as &[Build], |b| BuildRow::from(b)).unwrap();
        assert_eq!(out, "");
    }

    #[rstest]
    fn test_render_resource_table_is_yaml(test_build: Build) {
        let out = render_resource(OutputFormat::Table, &test_build).unwrap();
        assert_contains!(out, &format!("id: {TEST_BUILD_ID}"));
    }

    #[rstest]
    fn test_render_none() {
        assert_eq!(render_resource(OutputFormat::None, &serde_json::json!({"a": 1})).unwrap(), "");
    }

    #[rstest]
    fn test_instance_row_short_names() {
        let instance = Instance {
            name: "vm-1".into(),
            zone: Some("https://compute.example/projects/p/zones/us-east1-b".into()),
            machine_type: Some("zones/us-east1-b/machineTypes/e2-medium".into()),
            ..Default::default()
        };
        let row = InstanceRow::from(&instance);
        assert_eq!(row.zone, "us-east1-b");
        assert_eq!(row.machine_type, "e2-medium");
        assert_eq!(row.internal_ip, "-");
    }
}
