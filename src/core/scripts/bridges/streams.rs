//! Stream bridge
//!
//! Replaces `print`, `io.write`, `io.output`, `io.stdout` and `io.stderr` in
//! the interpreter globals so that everything a script (or a module it
//! `require`s) prints goes through [`StandardStreams`]. Bytes are passed on
//! untouched; decoding happens when captured output is retrieved.

use mlua::{
    AnyUserData, Function, Lua, MultiValue, Result as LuaResult, UserData, UserDataMethods, Value,
};

use crate::core::scripts::capture::{Channel, StandardStreams};

/// Registry slot holding the current default output file
const DEFAULT_OUTPUT_KEY: &str = "script_manager.default_output";

/// `io.stdout` / `io.stderr` replacement
struct StreamHandle {
    streams: StandardStreams,
    channel: Channel,
}

impl UserData for StreamHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // file:write returns the file so calls can be chained
        methods.add_function("write", |lua, (ud, args): (AnyUserData, MultiValue)| {
            {
                let handle = ud.borrow::<StreamHandle>()?;
                let bytes = concat_writable(lua, args)?;
                handle
                    .streams
                    .write(handle.channel, &bytes)
                    .map_err(mlua::Error::external)?;
            }
            Ok(ud)
        });

        methods.add_method("flush", |_, this, ()| {
            this.streams.flush().map_err(mlua::Error::external)?;
            Ok(true)
        });

        methods.add_method("setvbuf", |_, _, _: MultiValue| Ok(true));
    }
}

/// Install the routed `print` and `io` overlay into the globals of `lua`
pub fn install_stream_bridge(lua: &Lua, streams: &StandardStreams) -> LuaResult<()> {
    let globals = lua.globals();
    globals.set("print", create_print_function(lua, streams.clone())?)?;

    let io: Option<mlua::Table> = globals.get("io")?;
    let Some(io) = io else {
        return Ok(());
    };

    let stdout = lua.create_userdata(StreamHandle {
        streams: streams.clone(),
        channel: Channel::Stdout,
    })?;
    let stderr = lua.create_userdata(StreamHandle {
        streams: streams.clone(),
        channel: Channel::Stderr,
    })?;
    lua.set_named_registry_value(DEFAULT_OUTPUT_KEY, stdout.clone())?;

    let native_output: Option<Function> = io.get("output")?;
    io.set("output", create_output_function(lua, native_output)?)?;
    io.set("write", create_write_function(lua)?)?;
    io.set("stdout", stdout)?;
    io.set("stderr", stderr)?;

    Ok(())
}

/// `io.output([file])`: with no argument returns the default output, which
/// starts as the routed `io.stdout`. File names and native files are opened
/// by the interpreter's own `io.output` and become the new default.
fn create_output_function(lua: &Lua, native_output: Option<Function>) -> LuaResult<Function> {
    lua.create_function(move |lua, file: Value| {
        let output = match file {
            Value::Nil => return lua.named_registry_value::<Value>(DEFAULT_OUTPUT_KEY),
            Value::UserData(ud) if ud.is::<StreamHandle>() => Value::UserData(ud),
            other => match &native_output {
                Some(native) => native.call::<Value>(other)?,
                None => {
                    return Err(mlua::Error::RuntimeError(
                        "io.output: files are not available".to_string(),
                    ))
                }
            },
        };
        lua.set_named_registry_value(DEFAULT_OUTPUT_KEY, output.clone())?;
        Ok(output)
    })
}

/// `io.write(...)`: `io.output():write(...)`, returning the file
fn create_write_function(lua: &Lua) -> LuaResult<Function> {
    let write_to: Function = lua
        .load("local file = ...; return file:write(select(2, ...))")
        .set_name("=io.write")
        .into_function()?;
    lua.create_function(move |lua, args: MultiValue| {
        let output: Value = lua.named_registry_value(DEFAULT_OUTPUT_KEY)?;
        let mut call_args = args;
        call_args.push_front(output);
        write_to.call::<MultiValue>(call_args)
    })
}

/// `print(...)`: tostring every argument, tab separated, newline terminated
fn create_print_function(lua: &Lua, streams: StandardStreams) -> LuaResult<Function> {
    let tostring: Function = lua.globals().get("tostring")?;
    lua.create_function(move |_, args: MultiValue| {
        let mut line = Vec::new();
        for (i, value) in args.into_iter().enumerate() {
            if i > 0 {
                line.push(b'\t');
            }
            let text: mlua::String = tostring.call(value)?;
            line.extend_from_slice(&text.as_bytes());
        }
        line.push(b'\n');
        streams
            .write(Channel::Stdout, &line)
            .map_err(mlua::Error::external)
    })
}

/// Same coercion rules as `io.write`: strings and numbers only
fn concat_writable(lua: &Lua, args: MultiValue) -> LuaResult<Vec<u8>> {
    let mut bytes = Vec::new();
    for (i, value) in args.into_iter().enumerate() {
        let type_name = value.type_name();
        match lua.coerce_string(value)? {
            Some(s) => bytes.extend_from_slice(&s.as_bytes()),
            None => {
                return Err(mlua::Error::RuntimeError(format!(
                    "bad argument #{} to 'write' (string expected, got {})",
                    i + 1,
                    type_name
                )))
            }
        }
    }
    Ok(bytes)
}
