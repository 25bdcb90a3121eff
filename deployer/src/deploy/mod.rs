//! A/B deployment orchestration

pub mod cycle;
pub mod orchestrator;
