// src/services/mod.rs

pub mod aggregator;
pub mod grading;
pub mod orchestrator;
pub mod ranking;
