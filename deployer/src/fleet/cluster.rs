//! Cluster state aggregation

use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use crate::errors::DeployError;
use crate::fleet::ctl::FleetCtl;
use crate::fleet::order::ordered_by;
use crate::models::cluster::{ClusterMachine, ClusterStatus, ClusterUnit};

const MATCH_ALL: &str = ".*";

/// Builds ordered cluster snapshots from fleetctl listings
#[derive(Clone)]
pub struct ClusterAggregator {
    fleet: FleetCtl,
}

impl ClusterAggregator {
    pub fn new(fleet: FleetCtl) -> Self {
        Self { fleet }
    }

    /// Query the cluster. Both filters are regular expressions matched against raw
    /// listing lines, an empty filter matches everything.
    pub async fn query(
        &self,
        machine_filter: &str,
        unit_filter: &str,
    ) -> Result<ClusterStatus, DeployError> {
        let machine_query = or_match_all(machine_filter);
        let unit_query = or_match_all(unit_filter);
        let machine_re = Regex::new(machine_query)?;
        let unit_re = Regex::new(unit_query)?;

        let listing = self.fleet.list_machines().await?;
        let mut machines = parse_machines(&listing, &machine_re)?;

        let listing = self.fleet.list_units().await?;
        attach_units(&listing, &unit_re, &mut machines)?;

        debug!(
            "cluster query matched {} machines (machine={:?}, unit={:?})",
            machines.len(),
            machine_query,
            unit_query
        );
        Ok(build_status(machines, unit_query != MATCH_ALL))
    }
}

fn or_match_all(filter: &str) -> &str {
    if filter.is_empty() {
        MATCH_ALL
    } else {
        filter
    }
}

/// Split a listing line on tabs, dropping blank columns
fn fields(line: &str) -> Vec<&str> {
    line.split('\t').filter(|f| !f.trim().is_empty()).collect()
}

fn parse_machines(
    listing: &str,
    filter: &Regex,
) -> Result<BTreeMap<String, ClusterMachine>, DeployError> {
    let mut machines = BTreeMap::new();
    for line in listing.lines().filter(|l| filter.is_match(l)) {
        let words = fields(line);
        if words.len() < 3 {
            return Err(DeployError::SchedulerError(format!(
                "malformed machine line: {:?}",
                line
            )));
        }
        machines.insert(
            words[0].to_string(),
            ClusterMachine::new(words[0], words[1], words[2]),
        );
    }
    Ok(machines)
}

fn attach_units(
    listing: &str,
    filter: &Regex,
    machines: &mut BTreeMap<String, ClusterMachine>,
) -> Result<(), DeployError> {
    for line in listing.lines().filter(|l| filter.is_match(l)) {
        let words = fields(line);
        if words.len() < 6 {
            return Err(DeployError::SchedulerError(format!(
                "malformed unit line: {:?}",
                line
            )));
        }
        let machine_id = words[0].split('/').next().unwrap_or_default();
        // The machine listing is authoritative.
        let Some(machine) = machines.get_mut(machine_id) else {
            continue;
        };
        machine.units.push(ClusterUnit {
            unit: words[1].to_string(),
            hash: words[2].to_string(),
            active: words[3].to_string(),
            load: words[4].to_string(),
            sub: words[5].to_string(),
        });
    }
    Ok(())
}

fn build_status(machines: BTreeMap<String, ClusterMachine>, unit_scoped: bool) -> ClusterStatus {
    let unit_order = ordered_by(|a: &ClusterUnit, b: &ClusterUnit| a.sub < b.sub)
        .then(|a, b| a.unit < b.unit);
    let machine_order =
        ordered_by(|a: &ClusterMachine, b: &ClusterMachine| a.metadata < b.metadata)
            .then(|a, b| a.ip < b.ip);

    let mut status = ClusterStatus::default();
    for (_, mut machine) in machines {
        if unit_scoped && machine.units.is_empty() {
            continue;
        }
        unit_order.sort(&mut machine.units);
        status.machines.push(machine);
    }
    machine_order.sort(&mut status.machines);
    status
}
