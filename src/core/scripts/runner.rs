//! Script Runner - one execution, start to finish
//!
//! Scan, confirm, build the namespace, extend the module search path, run
//! (optionally captured) and package the result. The runner is the boundary
//! between arbitrary script code and the rest of the application: whatever
//! the script does, the caller gets an [`ExecutionResult`] or a `bool`,
//! never an error or a panic.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use super::bridges::NamespaceBuilder;
use super::capture::{CapturedOutput, OutputCapture, StandardStreams};
use super::error::{ScriptError, ScriptResult};
use super::host::HostInterface;
use super::interpreter::{ExecutionFailure, ScriptInterpreter};
use super::registry::ScriptRecord;
use super::scanner::{scan, RiskWarning};

/// Title of the confirmation prompt shown for risky scripts
pub const WARNINGS_TITLE: &str = "Script Validation Warnings";

const SUCCESS_STATUS_TIMEOUT: Duration = Duration::from_millis(3000);
const ERROR_STATUS_TIMEOUT: Duration = Duration::from_millis(5000);

/// Result of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub warnings: Vec<RiskWarning>,
}

impl ExecutionResult {
    /// Warning display strings, in scan order
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(RiskWarning::message).collect()
    }
}

/// What a run produced, depending on the mode it was started in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Capture mode: full result for the caller to render
    Captured(ExecutionResult),
    /// Interactive mode: notifications were already delivered to the host
    Interactive(bool),
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        match self {
            RunOutcome::Captured(result) => result.success,
            RunOutcome::Interactive(success) => *success,
        }
    }
}

/// Scripts the user already agreed to run despite warnings, for this
/// process only. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct AcknowledgementSet {
    paths: HashSet<PathBuf>,
}

impl AcknowledgementSet {
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn insert(&mut self, path: &Path) {
        self.paths.insert(path.to_path_buf());
    }
}

pub struct ScriptRunner {
    interpreter: ScriptInterpreter,
    capture: OutputCapture,
    namespace: NamespaceBuilder,
    acknowledged: AcknowledgementSet,
}

impl std::fmt::Debug for ScriptRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("namespace", &self.namespace.names())
            .field("acknowledged", &self.acknowledged.len())
            .finish_non_exhaustive()
    }
}

impl ScriptRunner {
    /// Runner printing through `streams`, exposing `namespace` to scripts
    pub fn new(streams: StandardStreams, namespace: NamespaceBuilder) -> ScriptResult<Self> {
        Ok(Self {
            interpreter: ScriptInterpreter::new(streams)?,
            capture: OutputCapture::new(),
            namespace,
            acknowledged: AcknowledgementSet::default(),
        })
    }

    pub fn interpreter(&self) -> &ScriptInterpreter {
        &self.interpreter
    }

    pub fn namespace(&self) -> &NamespaceBuilder {
        &self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut NamespaceBuilder {
        &mut self.namespace
    }

    pub fn acknowledged(&self) -> &AcknowledgementSet {
        &self.acknowledged
    }

    /// Run in either mode; see [`run_captured`](Self::run_captured) and
    /// [`run_interactive`](Self::run_interactive).
    pub fn run(
        &mut self,
        path: &Path,
        capture: bool,
        record: Option<&ScriptRecord>,
        host: &dyn HostInterface,
    ) -> RunOutcome {
        if capture {
            RunOutcome::Captured(self.run_captured(path))
        } else {
            RunOutcome::Interactive(self.run_interactive(path, record, host))
        }
    }

    /// Run with output captured. Never prompts; warnings are returned for
    /// the caller to show.
    pub fn run_captured(&mut self, path: &Path) -> ExecutionResult {
        self.execute(path, None, None)
    }

    /// Run against the live streams, asking `host` before running a risky
    /// script and reporting the outcome through it.
    pub fn run_interactive(
        &mut self,
        path: &Path,
        record: Option<&ScriptRecord>,
        host: &dyn HostInterface,
    ) -> bool {
        self.execute(path, record, Some(host)).success
    }

    fn execute(
        &mut self,
        path: &Path,
        record: Option<&ScriptRecord>,
        host: Option<&dyn HostInterface>,
    ) -> ExecutionResult {
        let capture = host.is_none();
        let name = script_name(path);

        let source = match read_source(path) {
            Ok(source) => source,
            Err(e) => {
                return self.report_failure(&name, ExecutionFailure::Setup(e), Vec::new(), None, host)
            }
        };

        let warnings = scan(&source);

        if let Some(host) = host {
            if !warnings.is_empty() && !self.confirm(path, record, &warnings, host) {
                info!(script = %name, "Execution cancelled at validation prompt");
                return ExecutionResult {
                    success: false,
                    warnings,
                    ..Default::default()
                };
            }
        }

        let env = match self.namespace.build(self.interpreter.lua(), path) {
            Ok(env) => env,
            Err(e) => {
                let failure = ExecutionFailure::Setup(ScriptError::from(e));
                return self.report_failure(&name, failure, warnings, None, host);
            }
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let _search_path = match self.interpreter.prepend_search_path(dir) {
            Ok(guard) => guard,
            Err(e) => {
                return self.report_failure(&name, ExecutionFailure::Setup(e), warnings, None, host)
            }
        };

        let (outcome, output) = if capture {
            let session = match self.capture.capture(self.interpreter.streams()) {
                Ok(session) => session,
                Err(e) => {
                    return self.report_failure(&name, ExecutionFailure::Setup(e), warnings, None, host)
                }
            };
            let outcome = self.interpreter.execute(&source, path, env);
            session.finish();
            (outcome, Some(self.capture.retrieve()))
        } else {
            (self.interpreter.execute(&source, path, env), None)
        };

        match outcome {
            Ok(()) => {
                info!(script = %name, "✅ Script executed successfully: {}", name);
                if let Some(host) = host {
                    host.show_status(
                        &format!("✅ Script executed successfully '{}'!", name),
                        SUCCESS_STATUS_TIMEOUT,
                        false,
                    );
                }
                let output = output.unwrap_or_default();
                if !output.stdout.trim().is_empty() {
                    info!(script = %name, "📤 Output captured from script:\n{}", output.stdout);
                }
                ExecutionResult {
                    success: true,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    warnings,
                }
            }
            Err(failure) => self.report_failure(&name, failure, warnings, output, host),
        }
    }

    /// Ask before running unless the script is validated and was already
    /// acknowledged this session.
    fn confirm(
        &mut self,
        path: &Path,
        record: Option<&ScriptRecord>,
        warnings: &[RiskWarning],
        host: &dyn HostInterface,
    ) -> bool {
        let validated = record.map(|r| r.validated).unwrap_or(false);
        if validated && self.acknowledged.contains(path) {
            return true;
        }

        if !host.confirm(WARNINGS_TITLE, &confirmation_message(warnings)) {
            return false;
        }
        if validated {
            self.acknowledged.insert(path);
        }
        true
    }

    fn report_failure(
        &self,
        name: &str,
        failure: ExecutionFailure,
        warnings: Vec<RiskWarning>,
        output: Option<CapturedOutput>,
        host: Option<&dyn HostInterface>,
    ) -> ExecutionResult {
        let summary = failure.summary();
        let error_msg = format!("❌ Error executing script {}: {}", name, summary);
        let detailed = format!("{}\n\nDetails:\n{}", error_msg, failure.details());

        error!(severity = "critical", script = %name, "{}", detailed);

        if let Some(host) = host {
            host.show_status(&format!("❌ Error '{}'", name), ERROR_STATUS_TIMEOUT, true);
            host.alert_error(
                "Script Error",
                &format!(
                    "Error executing script '{}':\n\n{}\n\nCheck the log for more details.",
                    name, summary
                ),
            );
        }

        let output = output.unwrap_or_default();
        let mut stderr = output.stderr;
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&detailed);

        ExecutionResult {
            success: false,
            stdout: output.stdout,
            stderr,
            warnings,
        }
    }
}

/// Prompt text listing every warning
pub fn confirmation_message(warnings: &[RiskWarning]) -> String {
    let lines: Vec<String> = warnings.iter().map(RiskWarning::message).collect();
    format!(
        "{}:\n\n{}\n\nContinue execution?",
        WARNINGS_TITLE,
        lines.join("\n")
    )
}

fn read_source(path: &Path) -> ScriptResult<String> {
    if !path.is_file() {
        return Err(ScriptError::ScriptNotFound(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

fn script_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
