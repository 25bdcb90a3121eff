//! A/B cycle bookkeeping and the cycle flip

use std::collections::HashMap;

use tracing::{debug, info};

use crate::errors::DeployError;
use crate::fleet::ctl::FleetCtl;
use crate::kv::KeyValueClient;
use crate::models::deploy::DeployRequest;

/// Unit value meaning no cycle has been deployed for the service yet
pub const NOOP_UNIT: &str = "*coreos-deploy-noop";

const DEFAULT_CYCLE: &str = "B";
const DEFAULT_COUNT: &str = "0";

/// The three keys holding the cycle state of one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleKeys {
    pub cycle: String,
    pub unit: String,
    pub count: String,
}

impl CycleKeys {
    pub fn new(domain: &str, service_name: &str) -> Self {
        let base = format!("/{}/apps/services/{}", domain, service_name);
        Self {
            cycle: format!("{}/current-cycle", base),
            unit: format!("{}/current-cycle-unit", base),
            count: format!("{}/current-cycle-count", base),
        }
    }

    pub fn all(&self) -> Vec<String> {
        vec![self.cycle.clone(), self.unit.clone(), self.count.clone()]
    }

    pub fn pairs(&self, cycle: &str, unit: &str, count: &str) -> HashMap<String, String> {
        HashMap::from([
            (self.cycle.clone(), cycle.to_string()),
            (self.unit.clone(), unit.to_string()),
            (self.count.clone(), count.to_string()),
        ])
    }

    /// Values for a service that was never deployed
    pub fn defaults(&self) -> HashMap<String, String> {
        self.pairs(DEFAULT_CYCLE, NOOP_UNIT, DEFAULT_COUNT)
    }
}

/// The live cycle of a service as read from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleState {
    pub cycle: String,
    pub unit: String,
    pub count: String,
}

impl CycleState {
    fn from_values(keys: &CycleKeys, values: &HashMap<String, String>) -> Result<Self, DeployError> {
        let value = |key: &String| {
            values
                .get(key)
                .cloned()
                .ok_or_else(|| DeployError::NotFound(key.clone()))
        };
        Ok(Self {
            cycle: value(&keys.cycle)?,
            unit: value(&keys.unit)?,
            count: value(&keys.count)?,
        })
    }

    pub fn has_previous(&self) -> bool {
        self.unit != NOOP_UNIT
    }

    pub fn instance_count(&self) -> Result<u32, DeployError> {
        self.count.trim().parse().map_err(|_| {
            DeployError::ParseError(format!("invalid cycle count {:?}", self.count))
        })
    }
}

/// Cycle to deploy into. Anything other than "A" flips to "A".
pub fn next_cycle(current: &str) -> &'static str {
    if current == "A" {
        "B"
    } else {
        "A"
    }
}

/// `{family}@{cycle}{index}.service`
pub fn instance_unit(family: &str, cycle: &str, index: u32) -> String {
    format!("{}@{}{}.service", family, cycle, index)
}

/// Start the new cycle, tear down the previous one, then commit the cycle state.
///
/// New instances that started before a failure stay in place.
pub async fn flip_ab(
    kv: &dyn KeyValueClient,
    fleet: &FleetCtl,
    request: &DeployRequest,
) -> Result<(), DeployError> {
    let keys = CycleKeys::new(&request.domain, &request.service_name);

    kv.make(&keys.defaults()).await?;
    let values = kv.get(&keys.all()).await?;
    let current = CycleState::from_values(&keys, &values)?;

    let new_cycle = next_cycle(&current.cycle);
    let family = request.unit_family();
    info!(
        "Flipping {} from cycle {:?} to {} ({} instances)",
        request.service_name, current.cycle, new_cycle, request.num_instances
    );

    for i in 1..=request.num_instances {
        let unit = instance_unit(&family, new_cycle, i);
        fleet.stop_and_destroy(&unit).await;
        fleet.start(&unit).await?;
        debug!("started {}", unit);
    }

    if current.has_previous() {
        let count = current.instance_count()?;
        for i in 1..=count {
            fleet
                .stop_and_destroy(&instance_unit(&current.unit, &current.cycle, i))
                .await;
        }
        fleet
            .destroy_quietly(&format!("{}@.service", current.unit))
            .await;
        debug!("tore down {} cycle {}", current.unit, current.cycle);
    }

    kv.set(&keys.pairs(new_cycle, &family, &request.num_instances.to_string()))
        .await
}
