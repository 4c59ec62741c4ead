//! Application layer: orchestration logic and collaborator ports

pub mod errors;
pub mod orchestrator;
pub mod services;
pub mod workflow;
