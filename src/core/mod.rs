pub mod audit;
pub mod config;
pub mod lifecycle;
pub mod narrator;
pub mod orchestrator;
pub mod store;
pub mod terminal;
