//! mend library crate
//!
//! Exposes the repair pipeline so integration tests and external tooling
//! can drive it without going through CLI startup.

pub mod agent;
pub mod config;
pub mod context;
pub mod extract;
pub mod issue;
pub mod keywords;
pub mod ledger;
pub mod llm;
pub mod locate;
pub mod patch;
pub mod prompts;
pub mod sandbox;
pub mod structure;
pub mod telemetry;
pub mod util;
