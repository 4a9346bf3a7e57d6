//! Interfaces to the collaborators the reply pipeline drives: the agent
//! runner, the model catalog and the usage reporter.
//!
//! Implementations live outside this workspace; everything here is injected.

pub mod catalog;
pub mod model;
pub mod runner;
pub mod usage;

pub use {
    catalog::{ModelCatalog, ModelCatalogEntry, StaticCatalog},
    model::{ModelRef, supports_xhigh, xhigh_models_label},
    runner::{AgentRunner, RunMeta, RunRequest, RunResult},
    usage::{NoUsage, ProviderUsage, UsageProvider, UsageSummary, UsageWindow},
};
