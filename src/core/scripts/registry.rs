//! Script Registry - discovery and catalog
//!
//! Discovers scripts in a single folder (immediate children only) and keeps
//! the current catalog, keyed by file name. Every reload builds a new catalog
//! and swaps it in whole, so readers holding a snapshot never see a mix of
//! old and new entries.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use mlua::Lua;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::{ScriptError, ScriptResult};
use super::interpreter::check_syntax;
use super::metadata::{display_name, ScriptMetadata, DEFAULT_DESCRIPTION};

/// File names starting with this prefix are package markers, not scripts
pub const RESERVED_PREFIX: &str = "__";

/// Default script file extension
pub const DEFAULT_EXTENSION: &str = "lua";

/// One discovered script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptRecord {
    /// File name with extension, unique within the catalog
    pub filename: String,
    pub display_name: String,
    /// Absolute location
    pub path: PathBuf,
    pub description: String,
    pub toolbar_visible: bool,
    pub toolbar_label: Option<String>,
    /// Author-declared "safe"; only affects repeat confirmation prompts
    pub validated: bool,
}

impl ScriptRecord {
    /// Build a record from a script's source text
    pub fn from_source(path: &Path, source: &str, description_fallback: &str) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let meta = ScriptMetadata::parse_with_fallback(source, description_fallback);

        Self {
            display_name: display_name(&filename),
            filename,
            path: path.to_path_buf(),
            description: meta.description,
            toolbar_visible: meta.toolbar_visible,
            toolbar_label: meta.toolbar_label,
            validated: meta.validated,
        }
    }

    /// Text for a toolbar button: the declared label, else the display name
    pub fn toolbar_text(&self) -> &str {
        self.toolbar_label.as_deref().unwrap_or(&self.display_name)
    }
}

/// Catalog snapshot: file name -> record
pub type Catalog = BTreeMap<String, ScriptRecord>;

/// Outcome counts of one reload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReloadStats {
    pub loaded: usize,
    pub failed: usize,
}

pub struct ScriptRegistry {
    dir: PathBuf,
    extension: String,
    description_fallback: String,
    catalog: ArcSwap<Catalog>,
}

impl std::fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field("dir", &self.dir)
            .field("extension", &self.extension)
            .field("scripts", &self.catalog.load().len())
            .finish()
    }
}

impl ScriptRegistry {
    /// Registry over `dir` for `.lua` files; starts empty until [`reload`](Self::reload)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_options(dir, DEFAULT_EXTENSION, DEFAULT_DESCRIPTION)
    }

    pub fn with_options(dir: impl Into<PathBuf>, extension: &str, description_fallback: &str) -> Self {
        let dir = dir.into();
        let dir = if dir.is_absolute() {
            dir
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&dir))
                .unwrap_or(dir)
        };

        Self {
            dir,
            extension: extension.trim_start_matches('.').to_string(),
            description_fallback: description_fallback.to_string(),
            catalog: ArcSwap::from_pointee(Catalog::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Current catalog snapshot
    pub fn list_scripts(&self) -> Arc<Catalog> {
        self.catalog.load_full()
    }

    pub fn get(&self, filename: &str) -> Option<ScriptRecord> {
        self.catalog.load().get(filename).cloned()
    }

    /// Record whose file name matches the last component of `path`
    pub fn record_for_path(&self, path: &Path) -> Option<ScriptRecord> {
        let filename = path.file_name()?.to_string_lossy();
        self.get(&filename)
    }

    pub fn len(&self) -> usize {
        self.catalog.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild the catalog from disk and swap it in.
    ///
    /// Unreadable or syntax-invalid files are logged and skipped. A missing
    /// folder yields an empty catalog.
    pub fn reload(&self) -> ReloadStats {
        let (catalog, stats) = self.discover();
        self.catalog.store(Arc::new(catalog));
        info!(
            loaded = stats.loaded,
            failed = stats.failed,
            dir = %self.dir.display(),
            "Scripts reloaded"
        );
        stats
    }

    fn discover(&self) -> (Catalog, ReloadStats) {
        let mut catalog = Catalog::new();
        let mut stats = ReloadStats::default();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "Scripts folder does not exist");
                return (catalog, stats);
            }
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Cannot list scripts folder");
                return (catalog, stats);
            }
        };

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| self.is_candidate(path))
            .collect();
        candidates.sort();

        let lua = Lua::new();
        for path in candidates {
            match self.load_record(&lua, &path) {
                Ok(record) => {
                    catalog.insert(record.filename.clone(), record);
                    stats.loaded += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping script");
                    stats.failed += 1;
                }
            }
        }

        (catalog, stats)
    }

    fn load_record(&self, lua: &Lua, path: &Path) -> ScriptResult<ScriptRecord> {
        let source = fs::read_to_string(path)?;
        check_syntax(lua, &source, path)?;
        Ok(ScriptRecord::from_source(path, &source, &self.description_fallback))
    }

    /// Immediate child file with the script extension and no reserved prefix
    pub fn is_candidate(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.starts_with(RESERVED_PREFIX) {
            return false;
        }
        let matches_ext = path
            .extension()
            .map(|e| e == self.extension.as_str())
            .unwrap_or(false);
        matches_ext && path.is_file()
    }

    /// Read and validate a single script without touching the catalog
    pub fn inspect(&self, path: &Path) -> ScriptResult<ScriptRecord> {
        if !path.is_file() {
            return Err(ScriptError::ScriptNotFound(path.to_path_buf()));
        }
        self.load_record(&Lua::new(), path)
    }
}
