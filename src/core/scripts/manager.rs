//! Script Manager - the API the presentation layer talks to
//!
//! Ties the registry, runner, watcher and debouncer together behind one
//! object owned by the host's event loop. Nothing here spawns threads of its
//! own: the host calls [`ScriptManager::process_events`] from its loop (or
//! blocks in [`ScriptManager::wait_for_events`]) and reloads happen there.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use super::bootstrap::{ensure_scripts_dir, normalize_locale};
use super::bridges::NamespaceBuilder;
use super::capture::StandardStreams;
use super::config::ManagerConfig;
use super::debounce::Debouncer;
use super::error::ScriptResult;
use super::host::HostInterface;
use super::registry::{Catalog, ReloadStats, ScriptRecord, ScriptRegistry};
use super::runner::{ExecutionResult, RunOutcome, ScriptRunner};
use super::watcher::{ScriptWatcher, WatchBackend};

const RELOAD_STATUS_TIMEOUT: Duration = Duration::from_millis(2000);

/// Sent to subscribers after every debounced reload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScriptsChanged {
    pub loaded: usize,
    pub failed: usize,
}

impl From<ReloadStats> for ScriptsChanged {
    fn from(stats: ReloadStats) -> Self {
        Self {
            loaded: stats.loaded,
            failed: stats.failed,
        }
    }
}

/// A script that asked for a toolbar button
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolbarEntry {
    pub filename: String,
    pub label: String,
    /// Tooltip text (the script description)
    pub tooltip: String,
    pub path: PathBuf,
}

pub struct ScriptManager {
    config: ManagerConfig,
    locale: String,
    host: Box<dyn HostInterface>,
    registry: ScriptRegistry,
    runner: ScriptRunner,
    watcher: Option<ScriptWatcher>,
    debouncer: Debouncer,
    subscribers: Vec<Sender<ScriptsChanged>>,
}

impl std::fmt::Debug for ScriptManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptManager")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("watcher", &self.watcher)
            .finish_non_exhaustive()
    }
}

impl ScriptManager {
    /// Manager printing to the process stdout/stderr, with no host
    /// capabilities exposed to scripts
    pub fn new(config: ManagerConfig, host: Box<dyn HostInterface>) -> ScriptResult<Self> {
        Self::with_streams(config, host, StandardStreams::process(), NamespaceBuilder::new())
    }

    /// Create the scripts folder if needed, start watching it and load the
    /// initial catalog.
    pub fn with_streams(
        config: ManagerConfig,
        host: Box<dyn HostInterface>,
        streams: StandardStreams,
        namespace: NamespaceBuilder,
    ) -> ScriptResult<Self> {
        let locale = config.locale.clone().unwrap_or_else(|| host.locale());
        ensure_scripts_dir(&config.scripts_dir, &locale)?;

        let registry = ScriptRegistry::with_options(
            &config.scripts_dir,
            &config.extension,
            &config.description_fallback,
        );
        let runner = ScriptRunner::new(streams, namespace)?;

        let watcher = if config.watch {
            match ScriptWatcher::new(registry.dir(), registry.extension()) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    warn!(error = %e, "Scripts folder will not be watched");
                    None
                }
            }
        } else {
            None
        };

        let mut manager = Self {
            debouncer: Debouncer::new(config.debounce()),
            config,
            locale,
            host,
            registry,
            runner,
            watcher,
            subscribers: Vec::new(),
        };
        manager.reload();
        Ok(manager)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn scripts_dir(&self) -> &Path {
        self.registry.dir()
    }

    /// Language key in effect (`pt_BR`, `en`, ...)
    pub fn language(&self) -> String {
        normalize_locale(&self.locale)
    }

    pub fn host(&self) -> &dyn HostInterface {
        self.host.as_ref()
    }

    pub fn runner(&self) -> &ScriptRunner {
        &self.runner
    }

    /// Capabilities exposed to scripts; changes apply from the next run
    pub fn namespace_mut(&mut self) -> &mut NamespaceBuilder {
        self.runner.namespace_mut()
    }

    pub fn watch_backend(&self) -> Option<WatchBackend> {
        self.watcher.as_ref().map(ScriptWatcher::backend)
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    /// Read-only snapshot of the catalog
    pub fn list_scripts(&self) -> Arc<Catalog> {
        self.registry.list_scripts()
    }

    pub fn get(&self, filename: &str) -> Option<ScriptRecord> {
        self.registry.get(filename)
    }

    /// Rediscover scripts now and re-register file watches
    pub fn reload(&mut self) -> ReloadStats {
        let stats = self.registry.reload();
        if let Some(watcher) = self.watcher.as_mut() {
            let catalog = self.registry.list_scripts();
            watcher.sync_files(catalog.values().map(|r| r.path.as_path()));
        }
        stats
    }

    /// Schedule a reload after the debounce window, as a file change would
    pub fn request_reload(&mut self) {
        self.debouncer.trigger();
    }

    /// Toolbar buttons, sorted by file name
    pub fn toolbar_entries(&self) -> Vec<ToolbarEntry> {
        self.registry
            .list_scripts()
            .values()
            .filter(|r| r.toolbar_visible)
            .map(|r| ToolbarEntry {
                filename: r.filename.clone(),
                label: r.toolbar_text().to_string(),
                tooltip: r.description.clone(),
                path: r.path.clone(),
            })
            .collect()
    }

    /// Path for a script given by catalog file name, bare name or path
    pub fn resolve(&self, script: &str) -> PathBuf {
        if let Some(record) = self.registry.get(script) {
            return record.path;
        }
        let with_ext = format!("{}.{}", script, self.registry.extension());
        if let Some(record) = self.registry.get(&with_ext) {
            return record.path;
        }
        PathBuf::from(script)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    pub fn run(&mut self, path: &Path, capture: bool) -> RunOutcome {
        let record = self.registry.record_for_path(path);
        self.runner.run(path, capture, record.as_ref(), self.host.as_ref())
    }

    pub fn run_captured(&mut self, path: &Path) -> ExecutionResult {
        self.runner.run_captured(path)
    }

    pub fn run_interactive(&mut self, path: &Path) -> bool {
        let record = self.registry.record_for_path(path);
        self.runner
            .run_interactive(path, record.as_ref(), self.host.as_ref())
    }

    // ========================================================================
    // Change notifications
    // ========================================================================

    /// Receive a [`ScriptsChanged`] after every debounced reload
    pub fn subscribe(&mut self) -> Receiver<ScriptsChanged> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Drain watcher events, re-arm the debouncer and reload when it is due.
    /// Returns the notification that was sent, if a reload happened.
    pub fn process_events(&mut self, now: Instant) -> Option<ScriptsChanged> {
        if let Some(watcher) = self.watcher.as_mut() {
            if watcher.drain() > 0 {
                self.debouncer.trigger_at(now);
            }
        }

        if !self.debouncer.poll_at(now) {
            return None;
        }

        let event = ScriptsChanged::from(self.reload());
        self.host.show_status(
            &format!("🔄 Scripts reloaded ({} scripts)", event.loaded),
            RELOAD_STATUS_TIMEOUT,
            false,
        );
        self.subscribers.retain(|tx| tx.send(event).is_ok());
        info!(loaded = event.loaded, failed = event.failed, "🔄 Scripts reloaded successfully");
        Some(event)
    }

    /// When the pending reload is due, if one is scheduled
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    /// Block until a watcher event arrives, the pending reload is due or
    /// `max` elapses. Returns `true` when a watcher event arrived.
    pub fn wait_for_events(&mut self, max: Duration) -> bool {
        let timeout = match self.debouncer.next_deadline() {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()).min(max),
            None => max,
        };
        match self.watcher.as_mut() {
            Some(watcher) => watcher.wait(timeout),
            None => {
                std::thread::sleep(timeout);
                false
            }
        }
    }

    // ========================================================================
    // About
    // ========================================================================

    /// Multi-line status text: version, counts, folder and the docstring
    /// field reference
    pub fn summary(&self) -> String {
        let mut output = format!("📋 Script Manager v{}\n", env!("CARGO_PKG_VERSION"));
        output.push_str(&format!("   ├─ Scripts loaded: {}\n", self.registry.len()));
        output.push_str(&format!("   ├─ Scripts folder: {}\n", self.scripts_dir().display()));
        let watching = match self.watch_backend() {
            Some(WatchBackend::Native) => "native",
            Some(WatchBackend::Poll) => "polling",
            None => "off",
        };
        output.push_str(&format!("   └─ Watching: {}\n", watching));
        output.push_str("\nDocstring Reference:\n");
        output.push_str("   Description:  What the script does\n");
        output.push_str("   Toolbar:      true\n");
        output.push_str("   ToolbarLabel: Short Name\n");
        output.push_str("   Validated:    true\n");
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scripts::bootstrap::EXAMPLE_SCRIPT;
    use crate::core::scripts::capture::SharedBuffer;
    use crate::core::scripts::host::MockHostInterface;
    use mockall::predicate::*;
    use std::fs;
    use tempfile::TempDir;

    fn quiet_host() -> MockHostInterface {
        let mut host = MockHostInterface::new();
        host.expect_locale().return_const("en_US".to_string());
        host
    }

    fn manager(dir: &Path, host: MockHostInterface) -> ScriptManager {
        let config = ManagerConfig::new()
            .with_scripts_dir(dir)
            .with_watch(false)
            .with_debounce_ms(100);
        let streams = StandardStreams::with_writers(
            Box::new(SharedBuffer::new()),
            Box::new(SharedBuffer::new()),
        );
        ScriptManager::with_streams(config, Box::new(host), streams, NamespaceBuilder::new()).unwrap()
    }

    #[test]
    fn test_bootstrap_seeds_new_folder() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("scripts");
        let manager = manager(&dir, quiet_host());
        assert!(dir.join(EXAMPLE_SCRIPT).exists());
        assert!(manager.get(EXAMPLE_SCRIPT).is_some());
        assert_eq!(manager.language(), "en");
    }

    #[test]
    fn test_portuguese_bootstrap_from_host_locale() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("scripts");
        let mut host = MockHostInterface::new();
        host.expect_locale().return_const("pt_BR".to_string());

        let manager = manager(&dir, host);
        let record = manager.get(EXAMPLE_SCRIPT).unwrap();
        assert!(record.description.starts_with("Script exemplo"));
    }

    #[test]
    fn test_existing_folder_not_seeded() {
        let temp = TempDir::new().unwrap();
        let manager = manager(temp.path(), quiet_host());
        assert!(manager.list_scripts().is_empty());
    }

    #[test]
    fn test_toolbar_entries() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b_tool.lua"), "--[[\nToolbar: true\n]]").unwrap();
        fs::write(temp.path().join("a_tool.lua"), "--[[\nDescription: A\nToolbar: yes\nToolbarLabel: AA\n]]").unwrap();
        fs::write(temp.path().join("hidden.lua"), "--[[\nToolbarLabel: nope\n]]").unwrap();

        let manager = manager(temp.path(), quiet_host());
        let entries = manager.toolbar_entries();
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["AA", "B Tool"]);
        assert_eq!(entries[0].tooltip, "A");
    }

    #[test]
    fn test_resolve() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("hello.lua"), "print('hi')").unwrap();
        let manager = manager(temp.path(), quiet_host());

        let expected = manager.get("hello.lua").unwrap().path;
        assert_eq!(manager.resolve("hello.lua"), expected);
        assert_eq!(manager.resolve("hello"), expected);
        assert_eq!(manager.resolve("/elsewhere/x.lua"), PathBuf::from("/elsewhere/x.lua"));
    }

    #[test]
    fn test_debounced_reload_notifies() {
        let temp = TempDir::new().unwrap();
        let mut host = quiet_host();
        host.expect_show_status()
            .with(eq("🔄 Scripts reloaded (1 scripts)"), always(), eq(false))
            .times(1)
            .return_const(());

        let mut manager = manager(temp.path(), host);
        let rx = manager.subscribe();
        fs::write(temp.path().join("new.lua"), "print(1)").unwrap();

        let t0 = Instant::now();
        manager.debouncer.trigger_at(t0);
        assert_eq!(manager.next_wakeup(), Some(t0 + Duration::from_millis(100)));
        assert_eq!(manager.process_events(t0 + Duration::from_millis(50)), None);

        let event = manager.process_events(t0 + Duration::from_millis(100));
        assert_eq!(event, Some(ScriptsChanged { loaded: 1, failed: 0 }));
        assert_eq!(rx.try_recv().unwrap(), ScriptsChanged { loaded: 1, failed: 0 });
        assert!(manager.get("new.lua").is_some());
    }

    #[test]
    fn test_dropped_subscribers_pruned() {
        let temp = TempDir::new().unwrap();
        let mut host = quiet_host();
        host.expect_show_status().return_const(());
        let mut manager = manager(temp.path(), host);

        let kept = manager.subscribe();
        drop(manager.subscribe());
        assert_eq!(manager.subscribers.len(), 2);

        let t0 = Instant::now();
        manager.debouncer.trigger_at(t0);
        manager.process_events(t0 + Duration::from_secs(1));

        assert_eq!(manager.subscribers.len(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn test_run_uses_catalog_validation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("trusted.lua");
        fs::write(&path, "--[[\nValidated: true\n]]\nlocal f = load('return 1')").unwrap();

        let mut host = quiet_host();
        host.expect_confirm().times(1).return_const(true);
        host.expect_show_status().return_const(());

        let mut manager = manager(temp.path(), host);
        let path = manager.resolve("trusted.lua");
        assert!(manager.run_interactive(&path));
        assert!(manager.run(&path, false).success());
        assert!(manager.runner().acknowledged().contains(&path));
    }

    #[test]
    fn test_summary() {
        let temp = TempDir::new().unwrap();
        let manager = manager(temp.path(), quiet_host());
        let summary = manager.summary();
        assert!(summary.contains("Scripts loaded: 0"));
        assert!(summary.contains("Watching: off"));
        assert!(summary.contains("ToolbarLabel: Short Name"));
    }
}
