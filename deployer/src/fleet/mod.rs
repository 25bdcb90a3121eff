//! fleetctl scheduler integration

pub mod cluster;
pub mod ctl;
pub mod order;
