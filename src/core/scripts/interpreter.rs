//! Script Interpreter - embedded Lua runtime
//!
//! One long-lived Lua state per runner, the way a host application keeps a
//! single embedded interpreter: modules loaded with `require` stay cached
//! between runs. Unlike a sandbox nothing is stripped; scripts run with the
//! full standard library and the privileges of the host process.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use mlua::{Lua, Table};

use super::bridges::install_stream_bridge;
use super::capture::StandardStreams;
use super::error::{ScriptError, ScriptResult};

/// Why a script run failed
#[derive(Debug)]
pub enum ExecutionFailure {
    /// Error raised by Lua code (or a host function it called)
    Lua(mlua::Error),
    /// A host capability panicked while the script was running
    Panic(String),
    /// The script could not be read or prepared
    Setup(ScriptError),
}

impl ExecutionFailure {
    /// One-line summary for dialogs and status text
    pub fn summary(&self) -> String {
        let full = match self {
            ExecutionFailure::Lua(err) => err.to_string(),
            ExecutionFailure::Panic(msg) => format!("host panic: {}", msg),
            ExecutionFailure::Setup(err) => err.to_string(),
        };
        full.lines().next().unwrap_or_default().to_string()
    }

    /// Full diagnostic including the Lua traceback when there is one
    pub fn details(&self) -> String {
        match self {
            ExecutionFailure::Lua(err) => match err {
                mlua::Error::CallbackError { traceback, cause } => {
                    format!("{}\n{}", cause, traceback)
                }
                other => other.to_string(),
            },
            ExecutionFailure::Panic(msg) => format!("host panic: {}", msg),
            ExecutionFailure::Setup(err) => err.to_string(),
        }
    }
}

/// Restores `package.path` when dropped
pub struct SearchPathGuard {
    package: Option<Table>,
    original: String,
}

impl Drop for SearchPathGuard {
    fn drop(&mut self) {
        if let Some(package) = &self.package {
            let _ = package.set("path", self.original.as_str());
        }
    }
}

/// The embedded interpreter
pub struct ScriptInterpreter {
    lua: Lua,
    streams: StandardStreams,
}

impl ScriptInterpreter {
    /// Create an interpreter whose output goes through `streams`
    pub fn new(streams: StandardStreams) -> ScriptResult<Self> {
        let lua = Lua::new();
        install_stream_bridge(&lua, &streams)?;
        Ok(Self { lua, streams })
    }

    /// Get a reference to the Lua runtime
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Streams this interpreter prints to
    pub fn streams(&self) -> &StandardStreams {
        &self.streams
    }

    /// Current `package.path`
    pub fn search_path(&self) -> ScriptResult<String> {
        let package: Table = self.lua.globals().get("package")?;
        Ok(package.get("path")?)
    }

    /// Put `dir` at the front of `package.path` until the guard is dropped.
    ///
    /// Nothing is prepended when `dir` is already the first entry, but the
    /// guard still restores the path as it was when it was taken.
    pub fn prepend_search_path(&self, dir: &Path) -> ScriptResult<SearchPathGuard> {
        let package: Option<Table> = self.lua.globals().get("package")?;
        let Some(package) = package else {
            return Ok(SearchPathGuard {
                package: None,
                original: String::new(),
            });
        };

        let original: String = package.get("path")?;
        let dir = dir.to_string_lossy();
        let entry = format!("{dir}/?.lua;{dir}/?/init.lua");
        if !original.starts_with(&entry) {
            package.set("path", format!("{entry};{original}"))?;
        }

        Ok(SearchPathGuard {
            package: Some(package),
            original,
        })
    }

    /// Run `source` in `env`. Lua errors and host panics both come back as
    /// [`ExecutionFailure`]; nothing escapes this call.
    pub fn execute(&self, source: &str, script_path: &Path, env: Table) -> Result<(), ExecutionFailure> {
        let chunk = self
            .lua
            .load(source)
            .set_name(chunk_name(script_path))
            .set_environment(env);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| chunk.exec()));
        let _ = self.streams.flush();

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ExecutionFailure::Lua(err)),
            Err(payload) => Err(ExecutionFailure::Panic(panic_message(payload.as_ref()))),
        }
    }
}

/// Compile `source` without running it
pub fn check_syntax(lua: &Lua, source: &str, script_path: &Path) -> ScriptResult<()> {
    lua.load(source)
        .set_name(chunk_name(script_path))
        .into_function()
        .map(|_| ())
        .map_err(|err| match err {
            mlua::Error::SyntaxError { message, .. } => ScriptError::syntax(script_path, message),
            other => ScriptError::syntax(script_path, other.to_string()),
        })
}

/// `@path` makes Lua report `path:line:` in messages and tracebacks
fn chunk_name(path: &Path) -> String {
    format!("@{}", path.display())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scripts::bridges::{Capability, NamespaceBuilder};
    use crate::core::scripts::capture::SharedBuffer;

    fn interpreter() -> (ScriptInterpreter, SharedBuffer) {
        let out = SharedBuffer::new();
        let streams = StandardStreams::with_writers(Box::new(out.clone()), Box::new(SharedBuffer::new()));
        (ScriptInterpreter::new(streams).unwrap(), out)
    }

    #[test]
    fn test_check_syntax_ok() {
        let lua = Lua::new();
        assert!(check_syntax(&lua, "print('hi')", Path::new("/s/ok.lua")).is_ok());
    }

    #[test]
    fn test_check_syntax_error_names_path() {
        let lua = Lua::new();
        let err = check_syntax(&lua, "if then end", Path::new("/s/bad.lua")).unwrap_err();
        match err {
            ScriptError::Syntax { path, message } => {
                assert_eq!(path, Path::new("/s/bad.lua"));
                assert!(!message.is_empty());
            }
            e => panic!("Expected syntax error, got: {:?}", e),
        }
    }

    #[test]
    fn test_check_syntax_does_not_run() {
        let (interp, out) = interpreter();
        check_syntax(interp.lua(), "print('side effect')", Path::new("/s/a.lua")).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_execute_prints() {
        let (interp, out) = interpreter();
        let path = Path::new("/s/hello.lua");
        let env = NamespaceBuilder::new().build(interp.lua(), path).unwrap();
        interp.execute("print('hi')", path, env).unwrap();
        assert_eq!(out.contents(), "hi\n");
    }

    #[test]
    fn test_execute_error_mentions_chunk() {
        let (interp, _out) = interpreter();
        let path = Path::new("/s/boom.lua");
        let env = NamespaceBuilder::new().build(interp.lua(), path).unwrap();
        let failure = interp.execute("error('boom')", path, env).unwrap_err();
        assert!(matches!(failure, ExecutionFailure::Lua(_)));
        assert!(failure.details().contains("boom"));
        assert!(failure.details().contains("boom.lua"));
        assert!(!failure.summary().contains('\n'));
    }

    #[test]
    fn test_host_panic_contained() {
        let (interp, _out) = interpreter();
        let path = Path::new("/s/panic.lua");
        let env = NamespaceBuilder::new()
            .with("explode", Capability::function(|_| panic!("capability exploded")))
            .build(interp.lua(), path)
            .unwrap();
        let failure = interp.execute("explode()", path, env).unwrap_err();
        assert!(failure.details().contains("capability exploded"));
    }

    #[test]
    fn test_search_path_guard_restores() {
        let (interp, _out) = interpreter();
        let before = interp.search_path().unwrap();
        {
            let _guard = interp.prepend_search_path(Path::new("/tmp/scripts")).unwrap();
            let during = interp.search_path().unwrap();
            assert!(during.starts_with("/tmp/scripts/?.lua;"));
        }
        assert_eq!(interp.search_path().unwrap(), before);
    }

    #[test]
    fn test_search_path_restored_after_script_mutation() {
        let (interp, _out) = interpreter();
        let before = interp.search_path().unwrap();
        let path = Path::new("/s/mutate.lua");
        {
            let _guard = interp.prepend_search_path(Path::new("/s")).unwrap();
            let env = NamespaceBuilder::new().build(interp.lua(), path).unwrap();
            let _ = interp.execute("package.path = 'hijacked'; error('x')", path, env);
        }
        assert_eq!(interp.search_path().unwrap(), before);
    }

    #[test]
    fn test_search_path_not_duplicated() {
        let (interp, _out) = interpreter();
        let _outer = interp.prepend_search_path(Path::new("/s")).unwrap();
        let once = interp.search_path().unwrap();
        let _inner = interp.prepend_search_path(Path::new("/s")).unwrap();
        assert_eq!(interp.search_path().unwrap(), once);
    }
}
