//! Execution namespace
//!
//! Builds the environment table a script runs in: the host's capability
//! allowlist plus the built-in `json`, `re` and `datetime` modules and the
//! `__name__` / `__file__` / `__dir__` markers. Lookups that miss the
//! environment fall through to the interpreter globals, so the full standard
//! library stays reachable. This is a convenience namespace, not a sandbox.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use mlua::{Lua, MultiValue, Result as LuaResult, Table, Value};

use super::stdlib::{
    create_datetime_table, create_json_table, create_re_table, json_to_lua, lua_to_json,
};

/// Host function exposed to scripts: JSON arguments in, JSON result or error text out
pub type HostFunction =
    Arc<dyn Fn(&[serde_json::Value]) -> Result<serde_json::Value, String> + Send + Sync>;

/// A handle the host makes visible inside scripts, passed through unmodified
#[derive(Clone)]
pub enum Capability {
    /// Plain data
    Value(serde_json::Value),
    /// Callable host function
    Function(HostFunction),
    /// Nested group of capabilities, e.g. `project.layers`
    Table(BTreeMap<String, Capability>),
}

impl Capability {
    /// Wrap a closure as a function capability
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> Result<serde_json::Value, String> + Send + Sync + 'static,
    {
        Capability::Function(Arc::new(f))
    }

    /// Build a table capability from `(name, capability)` pairs
    pub fn table<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Capability)>,
        K: Into<String>,
    {
        Capability::Table(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn to_lua(&self, lua: &Lua) -> LuaResult<Value> {
        match self {
            Capability::Value(value) => json_to_lua(lua, value),
            Capability::Function(f) => {
                let f = Arc::clone(f);
                let function = lua.create_function(move |lua, args: MultiValue| {
                    let args = args
                        .into_iter()
                        .map(|v| lua_to_json(lua, v))
                        .collect::<LuaResult<Vec<_>>>()?;
                    let result = f(&args).map_err(mlua::Error::RuntimeError)?;
                    json_to_lua(lua, &result)
                })?;
                Ok(Value::Function(function))
            }
            Capability::Table(entries) => {
                let table = lua.create_table()?;
                for (name, capability) in entries {
                    table.set(name.as_str(), capability.to_lua(lua)?)?;
                }
                Ok(Value::Table(table))
            }
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Capability::Function(_) => f.write_str("Function(..)"),
            Capability::Table(t) => f.debug_tuple("Table").field(t).finish(),
        }
    }
}

impl From<serde_json::Value> for Capability {
    fn from(value: serde_json::Value) -> Self {
        Capability::Value(value)
    }
}

/// Name -> capability allowlist used to build per-run environments
#[derive(Debug, Clone, Default)]
pub struct NamespaceBuilder {
    capabilities: BTreeMap<String, Capability>,
}

impl NamespaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a capability, builder style
    pub fn with(mut self, name: impl Into<String>, capability: Capability) -> Self {
        self.insert(name, capability);
        self
    }

    /// Add (or replace) a capability
    pub fn insert(&mut self, name: impl Into<String>, capability: Capability) {
        self.capabilities.insert(name.into(), capability);
    }

    /// Names of the host capabilities, sorted
    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(String::as_str).collect()
    }

    /// Build a fresh environment table for the script at `script_path`
    pub fn build(&self, lua: &Lua, script_path: &Path) -> LuaResult<Table> {
        let env = lua.create_table()?;

        env.set("__name__", "__main__")?;
        env.set("__file__", script_path.to_string_lossy().as_ref())?;
        let dir = script_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        env.set("__dir__", dir)?;

        env.set("json", create_json_table(lua)?)?;
        env.set("re", create_re_table(lua)?)?;
        env.set("datetime", create_datetime_table(lua)?)?;

        for (name, capability) in &self.capabilities {
            env.set(name.as_str(), capability.to_lua(lua)?)?;
        }

        let meta = lua.create_table()?;
        meta.set("__index", lua.globals())?;
        env.set_metatable(Some(meta));

        Ok(env)
    }
}
