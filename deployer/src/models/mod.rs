//! Data models

pub mod cluster;
pub mod deploy;
