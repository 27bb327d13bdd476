//! Convenience modules every script gets: `json`, `re` and `datetime`.

use mlua::{Function, Lua, LuaSerdeExt, Result as LuaResult, SerializeOptions, Table, Value};
use regex::Regex;

/// Serialization options that map JSON `null` to Lua `nil`
pub(crate) fn nil_options() -> SerializeOptions {
    SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false)
}

/// Convert a JSON value to a Lua value
pub(crate) fn json_to_lua(lua: &Lua, value: &serde_json::Value) -> LuaResult<Value> {
    lua.to_value_with(value, nil_options())
}

/// Convert a Lua value to JSON
pub(crate) fn lua_to_json(lua: &Lua, value: Value) -> LuaResult<serde_json::Value> {
    lua.from_value(value)
}

/// `json.encode(value)` / `json.decode(text)`
pub fn create_json_table(lua: &Lua) -> LuaResult<Table> {
    let json = lua.create_table()?;

    json.set(
        "encode",
        lua.create_function(|lua, value: Value| {
            let json = lua_to_json(lua, value)?;
            serde_json::to_string(&json)
                .map_err(|e| mlua::Error::RuntimeError(format!("JSON error: {}", e)))
        })?,
    )?;

    json.set(
        "decode",
        lua.create_function(|lua, text: String| {
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| mlua::Error::RuntimeError(format!("JSON error: {}", e)))?;
            json_to_lua(lua, &json)
        })?,
    )?;

    Ok(json)
}

fn compile(pattern: &str) -> LuaResult<Regex> {
    Regex::new(pattern).map_err(|e| mlua::Error::RuntimeError(format!("Regex error: {}", e)))
}

/// `re.is_match`, `re.find_all`, `re.replace`
pub fn create_re_table(lua: &Lua) -> LuaResult<Table> {
    let re = lua.create_table()?;

    re.set(
        "is_match",
        lua.create_function(|_, (pattern, text): (String, String)| {
            Ok(compile(&pattern)?.is_match(&text))
        })?,
    )?;

    re.set(
        "find_all",
        lua.create_function(|lua, (pattern, text): (String, String)| {
            let regex = compile(&pattern)?;
            let matches = lua.create_table()?;
            for (i, m) in regex.find_iter(&text).enumerate() {
                matches.set(i + 1, m.as_str())?;
            }
            Ok(matches)
        })?,
    )?;

    re.set(
        "replace",
        lua.create_function(
            |_, (pattern, text, replacement): (String, String, String)| {
                Ok(compile(&pattern)?
                    .replace_all(&text, replacement.as_str())
                    .into_owned())
            },
        )?,
    )?;

    Ok(re)
}

/// `datetime.now()` (RFC 3339, local time) and `datetime.today()` (YYYY-MM-DD)
pub fn create_datetime_table(lua: &Lua) -> LuaResult<Table> {
    let datetime = lua.create_table()?;
    let now: Function = lua.create_function(|_, ()| Ok(chrono::Local::now().to_rfc3339()))?;
    datetime.set("now", now)?;
    datetime.set(
        "today",
        lua.create_function(|_, ()| Ok(chrono::Local::now().format("%Y-%m-%d").to_string()))?,
    )?;
    Ok(datetime)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lua_with_modules() -> Lua {
        let lua = Lua::new();
        let globals = lua.globals();
        globals.set("json", create_json_table(&lua).unwrap()).unwrap();
        globals.set("re", create_re_table(&lua).unwrap()).unwrap();
        globals
            .set("datetime", create_datetime_table(&lua).unwrap())
            .unwrap();
        lua
    }

    #[test]
    fn test_json_decode_fields() {
        let lua = lua_with_modules();
        let name: String = lua
            .load(r#"return json.decode('{"name": "roads", "count": 3}').name"#)
            .eval()
            .unwrap();
        assert_eq!(name, "roads");
    }

    #[test]
    fn test_json_null_becomes_nil() {
        let lua = lua_with_modules();
        let is_nil: bool = lua
            .load(r#"return json.decode('{"crs": null}').crs == nil"#)
            .eval()
            .unwrap();
        assert!(is_nil);
    }

    #[test]
    fn test_json_encode_table() {
        let lua = lua_with_modules();
        let encoded: String = lua
            .load(r#"return json.encode({ layer = "rivers" })"#)
            .eval()
            .unwrap();
        assert_eq!(encoded, r#"{"layer":"rivers"}"#);
    }

    #[test]
    fn test_json_decode_error_is_lua_error() {
        let lua = lua_with_modules();
        let result = lua.load(r#"return json.decode('{ invalid')"#).exec();
        assert!(result.unwrap_err().to_string().contains("JSON error"));
    }

    #[test]
    fn test_re_functions() {
        let lua = lua_with_modules();
        let (matched, count, replaced): (bool, i64, String) = lua
            .load(
                r#"
                local found = re.find_all("[0-9]+", "a1 b22 c333")
                return re.is_match("^lay", "layers"), #found, re.replace("\\s+", "a  b   c", "_")
            "#,
            )
            .eval()
            .unwrap();
        assert!(matched);
        assert_eq!(count, 3);
        assert_eq!(replaced, "a_b_c");
    }

    #[test]
    fn test_re_invalid_pattern() {
        let lua = lua_with_modules();
        let result = lua.load(r#"re.is_match("(", "x")"#).exec();
        assert!(result.unwrap_err().to_string().contains("Regex error"));
    }

    #[test]
    fn test_datetime_today_format() {
        let lua = lua_with_modules();
        let today: String = lua.load("return datetime.today()").eval().unwrap();
        assert_eq!(today.len(), 10);
        assert_eq!(today.as_bytes()[4], b'-');
    }
}
