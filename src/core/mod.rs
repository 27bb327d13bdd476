//! Core module for the script manager
//!
//! # Architecture
//!
//! - `scripts`: discovery, metadata, risk scanning, execution and watching
//!   of user scripts, plus the `ScriptManager` facade over all of it

pub mod scripts;

// Re-export commonly used types
pub use scripts::{
    Capability, ExecutionResult, HeadlessHost, HostInterface, ManagerConfig, NamespaceBuilder,
    RiskWarning, RunOutcome, ScriptError, ScriptManager, ScriptRecord, ScriptResult,
    ScriptsChanged,
};
