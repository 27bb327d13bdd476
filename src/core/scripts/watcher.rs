//! Scripts folder watcher
//!
//! Watches the scripts directory (files added or removed) and every
//! registered script file (content changes). Events arrive on a channel from
//! the notify backend thread and are only looked at when the owner calls
//! [`ScriptWatcher::drain`], which keeps all reload logic on the host's own
//! loop. Debouncing is left to the caller.
//!
//! File watches are self-healing: editors that save by writing a new file
//! and renaming it over the old one make some backends drop the watch, so
//! a registered file is re-watched whenever an event shows it exists again.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::Duration;

use notify::event::{MetadataKind, ModifyKind};
use notify::{
    Config as NotifyConfig, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode,
    Watcher,
};
use tracing::{debug, trace, warn};

use super::error::{ScriptError, ScriptResult};

/// Poll interval used by the polling fallback
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

type EventResult = notify::Result<Event>;

/// Which notify backend is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchBackend {
    /// inotify / FSEvents / ReadDirectoryChangesW
    Native,
    /// Periodic stat polling
    Poll,
}

pub struct ScriptWatcher {
    watcher: Box<dyn Watcher + Send>,
    backend: WatchBackend,
    events: Receiver<EventResult>,
    pending: VecDeque<EventResult>,
    dir: PathBuf,
    extension: String,
    files: BTreeSet<PathBuf>,
    /// Registered files whose watch could not be (re)established
    unwatched: BTreeSet<PathBuf>,
}

impl std::fmt::Debug for ScriptWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptWatcher")
            .field("backend", &self.backend)
            .field("dir", &self.dir)
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}

impl ScriptWatcher {
    /// Watch `dir` with the platform backend, falling back to polling when
    /// the native backend cannot be created.
    pub fn new(dir: &Path, extension: &str) -> ScriptResult<Self> {
        let (tx, rx) = channel::<EventResult>();

        let native: notify::Result<RecommendedWatcher> =
            RecommendedWatcher::new(tx.clone(), NotifyConfig::default());
        let (watcher, backend): (Box<dyn Watcher + Send>, WatchBackend) = match native {
            Ok(w) => (Box::new(w), WatchBackend::Native),
            Err(e) => {
                warn!(error = %e, "Native file watcher unavailable, falling back to polling");
                let poll = PollWatcher::new(
                    tx,
                    NotifyConfig::default().with_poll_interval(POLL_INTERVAL),
                )?;
                (Box::new(poll), WatchBackend::Poll)
            }
        };

        Self::start(watcher, backend, rx, dir, extension)
    }

    /// Watch `dir` by polling every `interval`
    pub fn polling(dir: &Path, extension: &str, interval: Duration) -> ScriptResult<Self> {
        let (tx, rx) = channel::<EventResult>();
        let watcher = PollWatcher::new(tx, NotifyConfig::default().with_poll_interval(interval))?;
        Self::start(Box::new(watcher), WatchBackend::Poll, rx, dir, extension)
    }

    fn start(
        mut watcher: Box<dyn Watcher + Send>,
        backend: WatchBackend,
        events: Receiver<EventResult>,
        dir: &Path,
        extension: &str,
    ) -> ScriptResult<Self> {
        if !dir.is_dir() {
            return Err(ScriptError::Watcher(format!(
                "Scripts folder not found: {}",
                dir.display()
            )));
        }
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| ScriptError::Watcher(format!("{}: {}", dir.display(), e)))?;
        debug!(dir = %dir.display(), ?backend, "Watching scripts folder");

        Ok(Self {
            watcher,
            backend,
            events,
            pending: VecDeque::new(),
            dir: dir.to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
            files: BTreeSet::new(),
            unwatched: BTreeSet::new(),
        })
    }

    pub fn backend(&self) -> WatchBackend {
        self.backend
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Registered script files, sorted
    pub fn watched_files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    /// Start watching one script file. A failed registration is logged and
    /// retried on the next [`drain`](Self::drain).
    pub fn watch_file(&mut self, path: &Path) {
        if !self.files.insert(path.to_path_buf()) && !self.unwatched.contains(path) {
            return;
        }
        self.try_watch(path);
    }

    /// Make the registered files exactly `paths`
    pub fn sync_files<'a, I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let wanted: BTreeSet<PathBuf> = paths.into_iter().map(Path::to_path_buf).collect();

        let stale: Vec<PathBuf> = self.files.difference(&wanted).cloned().collect();
        for path in stale {
            let _ = self.watcher.unwatch(&path);
            self.files.remove(&path);
            self.unwatched.remove(&path);
        }

        for path in &wanted {
            self.watch_file(path);
        }
    }

    fn try_watch(&mut self, path: &Path) {
        match self.watcher.watch(path, RecursiveMode::NonRecursive) {
            Ok(()) => {
                self.unwatched.remove(path);
            }
            Err(e) => {
                trace!(path = %path.display(), error = %e, "File watch not established");
                self.unwatched.insert(path.to_path_buf());
            }
        }
    }

    /// Block up to `timeout` for the next backend event. Returns `true` when
    /// one arrived; it is kept for the next [`drain`](Self::drain).
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if !self.pending.is_empty() {
            return true;
        }
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                self.pending.push_back(event);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Consume every queued event and return how many of them were script
    /// changes. Re-watches registered files that have come back.
    pub fn drain(&mut self) -> usize {
        let mut queued: Vec<EventResult> = self.pending.drain(..).collect();
        queued.extend(self.events.try_iter());

        let mut changes = 0;
        let mut touched: BTreeSet<PathBuf> = BTreeSet::new();

        for result in queued {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "File watcher error");
                    continue;
                }
            };

            if !is_change(&event.kind) {
                continue;
            }

            let relevant: Vec<&PathBuf> = event
                .paths
                .iter()
                .filter(|p| self.is_relevant(p))
                .collect();
            if relevant.is_empty() && !event.paths.is_empty() {
                continue;
            }

            trace!(kind = ?event.kind, paths = ?event.paths, "Script change");
            changes += 1;
            touched.extend(relevant.into_iter().cloned());
        }

        self.heal(&touched);
        changes
    }

    /// Re-add watches for registered files that exist but may have lost
    /// their watch: those named in this batch and those that failed before.
    fn heal(&mut self, touched: &BTreeSet<PathBuf>) {
        let candidates: Vec<PathBuf> = touched
            .iter()
            .filter(|p| self.files.contains(*p))
            .chain(self.unwatched.iter())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        for path in candidates {
            if !path.exists() {
                continue;
            }
            let _ = self.watcher.unwatch(&path);
            self.try_watch(&path);
            debug!(path = %path.display(), "Re-watched script file");
        }
    }

    fn is_relevant(&self, path: &Path) -> bool {
        if path == self.dir || self.files.contains(path) {
            return true;
        }
        let in_dir = path.parent().map(|p| p == self.dir).unwrap_or(false);
        let has_ext = path
            .extension()
            .map(|e| e == self.extension.as_str())
            .unwrap_or(false);
        in_dir && has_ext
    }
}

/// Create, remove and content/name modifications count; reads and
/// access-time updates do not.
fn is_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => false,
        EventKind::Modify(_) => true,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => false,
    }
}
