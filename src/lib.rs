//! script_manager - discover, inspect and run user Lua scripts
//!
//! This library is the non-UI half of a script manager plugin for a desktop
//! host application. It is designed to be consumed by:
//! - The CLI binary (src/bin/scriptman.rs)
//! - An embedding host that renders menus, toolbars and dialogs on top of
//!   [`ScriptManager`]
//!
//! # Architecture
//!
//! This crate follows the "Library-First" pattern:
//! - **lib.rs** (this file): Pure logic, no CLI concerns
//! - **bin/scriptman.rs**: Thin wrapper that calls the library
//!
//! # Example
//!
//! ```no_run
//! use script_manager::{HeadlessHost, ManagerConfig, ScriptManager};
//!
//! let config = ManagerConfig::new().with_scripts_dir("/tmp/scripts");
//! let mut manager = ScriptManager::new(config, Box::new(HeadlessHost::new()))?;
//! for record in manager.list_scripts().values() {
//!     println!("{}: {}", record.display_name, record.description);
//! }
//! let path = manager.resolve("layers_example");
//! let result = manager.run_captured(&path);
//! print!("{}", result.stdout);
//! # Ok::<(), script_manager::ScriptError>(())
//! ```

pub mod core;

pub use crate::core::scripts::{
    Capability, Catalog, ExecutionResult, HeadlessHost, HostInterface, ManagerConfig,
    NamespaceBuilder, ReloadStats, RiskWarning, RunOutcome, ScriptError, ScriptManager,
    ScriptRecord, ScriptResult, ScriptsChanged, StandardStreams, ToolbarEntry,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the version of the script_manager library
pub fn version() -> &'static str {
    VERSION
}
