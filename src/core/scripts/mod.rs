//! Script Manager Module
//!
//! Discovers, inspects and runs user Lua scripts kept in one folder.
//! Scripts run in an embedded interpreter with the full standard library;
//! the safety net is a textual risk scan plus an explicit confirmation, not
//! isolation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            SCRIPT MANAGER               │
//! │  • list / reload / run / subscribe      │
//! │  • debounced reload on folder changes   │
//! ├─────────────────────────────────────────┤
//! │     REGISTRY            RUNNER          │
//! │  • metadata parse   • risk scan         │
//! │  • syntax check     • confirm policy    │
//! │  • atomic catalog   • capture + contain │
//! ├─────────────────────────────────────────┤
//! │          EMBEDDED INTERPRETER           │
//! │  • Lua 5.4 (mlua)                       │
//! │  • stream bridge, capability namespace  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Script metadata
//!
//! The first docstring block of a script (`--[[ ... ]]`, `"""..."""`) may
//! declare, one per line:
//!
//! ```text
//! Description:  What the script does
//! Toolbar:      true
//! ToolbarLabel: Short Name
//! Validated:    true
//! ```

pub mod bootstrap;
pub mod bridges;
pub mod capture;
pub mod config;
pub mod debounce;
pub mod error;
pub mod host;
pub mod interpreter;
pub mod manager;
pub mod metadata;
pub mod registry;
pub mod runner;
pub mod scanner;
pub mod watcher;

// Re-exports
pub use bootstrap::{ensure_scripts_dir, normalize_locale, EXAMPLE_SCRIPT};
pub use bridges::{Capability, HostFunction, NamespaceBuilder};
pub use capture::{CaptureSession, CapturedOutput, OutputCapture, SharedBuffer, StandardStreams};
pub use config::{ManagerConfig, CONFIG_FILE};
pub use debounce::{Debouncer, DEFAULT_DEBOUNCE};
pub use error::{ScriptError, ScriptResult};
pub use host::{HeadlessHost, HostInterface, DEFAULT_LOCALE};
pub use interpreter::{ExecutionFailure, ScriptInterpreter};
pub use manager::{ScriptManager, ScriptsChanged, ToolbarEntry};
pub use metadata::{display_name, ScriptMetadata, DEFAULT_DESCRIPTION};
pub use registry::{Catalog, ReloadStats, ScriptRecord, ScriptRegistry};
pub use runner::{AcknowledgementSet, ExecutionResult, RunOutcome, ScriptRunner};
pub use scanner::{scan, RiskPattern, RiskWarning, RISK_PATTERNS};
pub use watcher::{ScriptWatcher, WatchBackend};
