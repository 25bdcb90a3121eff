//! coreos-deploy library
//!
//! Deploys fleet services into a CoreOS cluster with an A/B rotation of units,
//! and reports the state of the cluster's machines and units.

pub mod app;
pub mod command;
pub mod deploy;
pub mod deploylog;
pub mod errors;
pub mod filesys;
pub mod fleet;
pub mod kv;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod utils;
pub mod workers;
