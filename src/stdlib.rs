use std::{
    env, fs,
    io::{Read, Write},
    net::{Shutdown, TcpStream},
    path::Path,
    process::Command,
    thread,
    time::Duration,
};

use indexmap::IndexMap;

use crate::{
    capture,
    diagnostics::{Diagnostic, NarcissusError, Result},
    environment::EnvironmentRef,
    http,
    value::{Arity, Value, ValueKind},
};

const NET_TIMEOUT: Duration = Duration::from_secs(10);

/// Modules that grant filesystem, environment, process or socket access.
pub const CAPABILITY_MODULES: &[&str] = &["fs", "net", "os", "process"];

/// Every module name `use` can resolve.
pub const MODULES: &[&str] = &[
    "collections",
    "fs",
    "http",
    "io",
    "json",
    "math",
    "net",
    "os",
    "process",
    "string",
    "time",
];

/// Installs the names every snippet sees without importing anything.
pub fn install_builtins(env: &EnvironmentRef) {
    let mut scope = env.borrow_mut();
    scope.define("print", native("print", Arity::Variadic, io_print), false);
    scope.define("write", native("write", Arity::Variadic, io_write), false);
    scope.define("dbg", native("dbg", Arity::Exact(1), io_dbg), false);
    scope.define("len", native("len", Arity::Exact(1), collections_len), false);
    scope.define("str", native("str", Arity::Exact(1), to_str), false);
    scope.define("range", native("range", Arity::Exact(2), collections_range), false);
}

/// Builds a fresh value for the module `name`, or `None` when no such
/// module exists.
pub fn resolve_module(name: &str) -> Option<Value> {
    let exports = match name {
        "io" => io_module(),
        "string" => string_module(),
        "collections" => collections_module(),
        "math" => math_module(),
        "time" => time_module(),
        "json" => json_module(),
        "http" => http::module(),
        "fs" => fs_module(),
        "os" => os_module(),
        "process" => process_module(),
        "net" => net_module(),
        _ => return None,
    };
    Some(Value::module(name, exports))
}

pub(crate) fn native<F>(name: &'static str, arity: Arity, callback: F) -> Value
where
    F: Fn(&[Value]) -> Result<Value> + 'static,
{
    Value::native(name, arity, callback)
}

/// Collects the exported names of one module in declaration order.
#[derive(Default)]
pub(crate) struct Exports(IndexMap<String, Value>);

impl Exports {
    pub(crate) fn function<F>(mut self, name: &'static str, arity: Arity, callback: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        self.0.insert(name.to_string(), native(name, arity, callback));
        self
    }

    pub(crate) fn constant(mut self, name: &str, value: Value) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub(crate) fn build(self) -> IndexMap<String, Value> {
        self.0
    }
}

fn io_module() -> IndexMap<String, Value> {
    Exports::default()
        .function("print", Arity::Variadic, io_print)
        .function("write", Arity::Variadic, io_write)
        .function("dbg", Arity::Exact(1), io_dbg)
        .build()
}

fn string_module() -> IndexMap<String, Value> {
    Exports::default()
        .function("len", Arity::Exact(1), collections_len)
        .function("is_empty", Arity::Exact(1), string_is_empty)
        .function("to_upper", Arity::Exact(1), string_to_upper)
        .function("to_lower", Arity::Exact(1), string_to_lower)
        .function("trim", Arity::Exact(1), string_trim)
        .function("split", Arity::Exact(2), string_split)
        .function("replace", Arity::Exact(3), string_replace)
        .function("contains", Arity::Exact(2), string_contains)
        .function("starts_with", Arity::Exact(2), string_starts_with)
        .function("ends_with", Arity::Exact(2), string_ends_with)
        .function("join", Arity::Exact(2), string_join)
        .function("pad_left", Arity::Exact(2), string_pad_left)
        .build()
}

fn collections_module() -> IndexMap<String, Value> {
    Exports::default()
        .function("len", Arity::Exact(1), collections_len)
        .function("push", Arity::Exact(2), collections_push)
        .function("insert", Arity::Exact(3), collections_insert)
        .function("get", Arity::Exact(3), collections_get)
        .function("keys", Arity::Exact(1), collections_keys)
        .function("values", Arity::Exact(1), collections_values)
        .function("range", Arity::Exact(2), collections_range)
        .function("range_step", Arity::Exact(3), collections_range_step)
        .function("pop", Arity::Exact(1), collections_pop)
        .function("sort", Arity::Exact(1), collections_sort)
        .function("reverse", Arity::Exact(1), collections_reverse)
        .function("take", Arity::Exact(2), collections_take)
        .build()
}

fn math_module() -> IndexMap<String, Value> {
    Exports::default()
        .function("abs", Arity::Exact(1), math_abs)
        .function("floor", Arity::Exact(1), math_floor)
        .function("ceil", Arity::Exact(1), math_ceil)
        .function("sqrt", Arity::Exact(1), math_sqrt)
        .function("round", Arity::Exact(1), math_round)
        .function("pow", Arity::Exact(2), math_pow)
        .function("min", Arity::Exact(2), math_min)
        .function("max", Arity::Exact(2), math_max)
        .constant("pi", Value::float(std::f64::consts::PI))
        .build()
}

fn time_module() -> IndexMap<String, Value> {
    Exports::default()
        .function("now", Arity::Exact(0), time_now)
        .function("sleep", Arity::Exact(1), time_sleep)
        .build()
}

fn json_module() -> IndexMap<String, Value> {
    Exports::default()
        .function("parse", Arity::Exact(1), json_parse)
        .function("stringify", Arity::Exact(1), json_stringify)
        .build()
}

fn fs_module() -> IndexMap<String, Value> {
    Exports::default()
        .function("read_text", Arity::Exact(1), fs_read_text)
        .function("write_text", Arity::Exact(2), fs_write_text)
        .function("exists", Arity::Exact(1), fs_exists)
        .function("create_dir_all", Arity::Exact(1), fs_create_dir_all)
        .function("remove", Arity::Exact(1), fs_remove)
        .build()
}

fn os_module() -> IndexMap<String, Value> {
    Exports::default()
        .function("env", Arity::Exact(1), os_env)
        .function("cwd", Arity::Exact(0), os_cwd)
        .function("platform", Arity::Exact(0), os_platform)
        .build()
}

fn process_module() -> IndexMap<String, Value> {
    Exports::default()
        .function("run", Arity::Range(1, 2), process_run)
        .build()
}

fn net_module() -> IndexMap<String, Value> {
    Exports::default()
        .function("connect", Arity::Range(2, 3), net_connect)
        .build()
}

pub(crate) fn runtime_error(message: impl Into<String>) -> NarcissusError {
    NarcissusError::from(Diagnostic::runtime(message))
}

pub(crate) fn expect_string(value: &Value, name: &str) -> Result<String> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        runtime_error(format!(
            "`{name}` expected String but found {}",
            value.type_name()
        ))
    })
}

pub(crate) fn expect_int(value: &Value, name: &str) -> Result<i64> {
    match &*value.0 {
        ValueKind::Int(n) => Ok(*n),
        _ => Err(runtime_error(format!(
            "`{name}` expected Int but found {}",
            value.type_name()
        ))),
    }
}

fn expect_number(value: &Value, name: &str) -> Result<f64> {
    match &*value.0 {
        ValueKind::Int(n) => Ok(*n as f64),
        ValueKind::Float(f) => Ok(*f),
        _ => Err(runtime_error(format!(
            "`{name}` expected numeric but found {}",
            value.type_name()
        ))),
    }
}

pub(crate) fn expect_array<'v>(value: &'v Value, name: &str) -> Result<&'v Vec<Value>> {
    match &*value.0 {
        ValueKind::Array(values) => Ok(values),
        _ => Err(runtime_error(format!(
            "`{name}` expected Array but found {}",
            value.type_name()
        ))),
    }
}

fn expect_map<'v>(value: &'v Value, name: &str) -> Result<&'v IndexMap<String, Value>> {
    match &*value.0 {
        ValueKind::Map(map) => Ok(map),
        _ => Err(runtime_error(format!(
            "`{name}` expected Map but found {}",
            value.type_name()
        ))),
    }
}

fn joined(args: &[Value]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn io_print(args: &[Value]) -> Result<Value> {
    let mut line = joined(args);
    line.push('\n');
    capture::write_stdout(&line);
    Ok(Value::unit())
}

fn io_write(args: &[Value]) -> Result<Value> {
    capture::write_stdout(&joined(args));
    Ok(Value::unit())
}

fn io_dbg(args: &[Value]) -> Result<Value> {
    capture::write_stdout(&format!("{:?}\n", args[0]));
    Ok(args[0].clone())
}

fn to_str(args: &[Value]) -> Result<Value> {
    Ok(Value::string(args[0].to_string()))
}

fn string_is_empty(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.is_empty")?;
    Ok(Value::bool(text.is_empty()))
}

fn string_to_upper(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.to_upper")?;
    Ok(Value::string(text.to_uppercase()))
}

fn string_to_lower(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.to_lower")?;
    Ok(Value::string(text.to_lowercase()))
}

fn string_trim(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.trim")?;
    Ok(Value::string(text.trim()))
}

fn string_split(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.split")?;
    let separator = expect_string(&args[1], "string.split")?;
    let parts = if separator.is_empty() {
        text.split_whitespace().map(Value::string).collect()
    } else {
        text.split(separator.as_str()).map(Value::string).collect()
    };
    Ok(Value::array(parts))
}

fn string_replace(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.replace")?;
    let from = expect_string(&args[1], "string.replace")?;
    let to = expect_string(&args[2], "string.replace")?;
    Ok(Value::string(text.replace(&from, &to)))
}

fn string_contains(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.contains")?;
    let needle = expect_string(&args[1], "string.contains")?;
    Ok(Value::bool(text.contains(&needle)))
}

fn string_starts_with(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.starts_with")?;
    let prefix = expect_string(&args[1], "string.starts_with")?;
    Ok(Value::bool(text.starts_with(&prefix)))
}

fn string_ends_with(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.ends_with")?;
    let suffix = expect_string(&args[1], "string.ends_with")?;
    Ok(Value::bool(text.ends_with(&suffix)))
}

fn string_join(args: &[Value]) -> Result<Value> {
    let items = expect_array(&args[0], "string.join")?;
    let separator = expect_string(&args[1], "string.join")?;
    let pieces: Vec<String> = items.iter().map(ToString::to_string).collect();
    Ok(Value::string(pieces.join(&separator)))
}

fn string_pad_left(args: &[Value]) -> Result<Value> {
    let text = args[0].to_string();
    let width = expect_int(&args[1], "string.pad_left")?.max(0) as usize;
    Ok(Value::string(format!("{text:>width$}")))
}

fn collections_len(args: &[Value]) -> Result<Value> {
    let len = match &*args[0].0 {
        ValueKind::String(s) => s.chars().count(),
        ValueKind::Array(arr) => arr.len(),
        ValueKind::Map(map) => map.len(),
        _ => {
            return Err(runtime_error(format!(
                "len expects String, Array or Map but found {}",
                args[0].type_name()
            )));
        }
    };
    Ok(Value::int(len as i64))
}

fn collections_push(args: &[Value]) -> Result<Value> {
    let mut values = expect_array(&args[0], "collections.push")?.clone();
    values.push(args[1].clone());
    Ok(Value::array(values))
}

fn collections_insert(args: &[Value]) -> Result<Value> {
    let mut map = expect_map(&args[0], "collections.insert")?.clone();
    let key = expect_string(&args[1], "collections.insert")?;
    map.insert(key, args[2].clone());
    Ok(Value::map(map))
}

fn collections_get(args: &[Value]) -> Result<Value> {
    let map = expect_map(&args[0], "collections.get")?;
    let key = expect_string(&args[1], "collections.get")?;
    Ok(map.get(&key).cloned().unwrap_or_else(|| args[2].clone()))
}

fn collections_keys(args: &[Value]) -> Result<Value> {
    let map = expect_map(&args[0], "collections.keys")?;
    Ok(Value::array(map.keys().cloned().map(Value::string).collect()))
}

fn collections_values(args: &[Value]) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Map(map) => Ok(Value::array(map.values().cloned().collect())),
        ValueKind::Array(arr) => Ok(Value::array(arr.clone())),
        _ => Err(runtime_error("values expects Map or Array")),
    }
}

fn collections_range(args: &[Value]) -> Result<Value> {
    let start = expect_int(&args[0], "range")?;
    let end = expect_int(&args[1], "range")?;
    let step = if start <= end { 1 } else { -1 };
    range_values(start, end, step)
}

fn collections_range_step(args: &[Value]) -> Result<Value> {
    let start = expect_int(&args[0], "collections.range_step")?;
    let end = expect_int(&args[1], "collections.range_step")?;
    let step = expect_int(&args[2], "collections.range_step")?;
    if step == 0 {
        return Err(runtime_error("range step must be non-zero"));
    }
    range_values(start, end, step)
}

fn range_values(start: i64, end: i64, step: i64) -> Result<Value> {
    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current < end) || (step < 0 && current > end) {
        values.push(Value::int(current));
        current = match current.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(Value::array(values))
}

fn collections_pop(args: &[Value]) -> Result<Value> {
    let mut values = expect_array(&args[0], "collections.pop")?.clone();
    let Some(value) = values.pop() else {
        return Err(runtime_error("pop expects non-empty array"));
    };
    let mut result = IndexMap::new();
    result.insert("value".into(), value);
    result.insert("array".into(), Value::array(values));
    Ok(Value::map(result))
}

fn collections_sort(args: &[Value]) -> Result<Value> {
    let values = expect_array(&args[0], "collections.sort")?;
    if values.iter().all(|v| v.as_str().is_some()) {
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
        return Ok(Value::array(sorted));
    }
    let mut keyed = values
        .iter()
        .map(|v| Ok((expect_number(v, "collections.sort")?, v.clone())))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(Value::array(keyed.into_iter().map(|(_, v)| v).collect()))
}

fn collections_reverse(args: &[Value]) -> Result<Value> {
    let mut values = expect_array(&args[0], "collections.reverse")?.clone();
    values.reverse();
    Ok(Value::array(values))
}

fn collections_take(args: &[Value]) -> Result<Value> {
    let values = expect_array(&args[0], "collections.take")?;
    let count = expect_int(&args[1], "collections.take")?.max(0) as usize;
    Ok(Value::array(values.iter().take(count).cloned().collect()))
}

fn math_abs(args: &[Value]) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Int(n) => n
            .checked_abs()
            .map(Value::int)
            .ok_or_else(|| runtime_error("math.abs overflowed the integer range")),
        _ => Ok(Value::float(expect_number(&args[0], "math.abs")?.abs())),
    }
}

fn math_floor(args: &[Value]) -> Result<Value> {
    Ok(Value::float(expect_number(&args[0], "math.floor")?.floor()))
}

fn math_ceil(args: &[Value]) -> Result<Value> {
    Ok(Value::float(expect_number(&args[0], "math.ceil")?.ceil()))
}

fn math_sqrt(args: &[Value]) -> Result<Value> {
    let number = expect_number(&args[0], "math.sqrt")?;
    if number < 0.0 {
        return Err(runtime_error("sqrt expects non-negative input"));
    }
    Ok(Value::float(number.sqrt()))
}

fn math_round(args: &[Value]) -> Result<Value> {
    Ok(Value::float(expect_number(&args[0], "math.round")?.round()))
}

fn math_pow(args: &[Value]) -> Result<Value> {
    let base = expect_number(&args[0], "math.pow")?;
    let exponent = expect_number(&args[1], "math.pow")?;
    Ok(Value::float(base.powf(exponent)))
}

fn math_min(args: &[Value]) -> Result<Value> {
    let left = expect_number(&args[0], "math.min")?;
    let right = expect_number(&args[1], "math.min")?;
    Ok(if right < left { args[1].clone() } else { args[0].clone() })
}

fn math_max(args: &[Value]) -> Result<Value> {
    let left = expect_number(&args[0], "math.max")?;
    let right = expect_number(&args[1], "math.max")?;
    Ok(if right > left { args[1].clone() } else { args[0].clone() })
}

fn time_now(_: &[Value]) -> Result<Value> {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => Ok(Value::float(duration.as_secs_f64())),
        Err(_) => Err(runtime_error("system clock went backwards")),
    }
}

fn time_sleep(args: &[Value]) -> Result<Value> {
    let millis = expect_number(&args[0], "time.sleep")?;
    if millis < 0.0 {
        return Err(runtime_error("sleep duration must be non-negative"));
    }
    let duration = Duration::try_from_secs_f64(millis / 1000.0)
        .map_err(|err| runtime_error(format!("invalid sleep duration: {err}")))?;
    thread::sleep(duration);
    Ok(Value::unit())
}

fn json_parse(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "json.parse")?;
    let parsed: serde_json::Value = serde_json::from_str(&text)
        .map_err(|err| runtime_error(format!("json.parse: {err}")))?;
    Ok(Value::from_json(&parsed))
}

fn json_stringify(args: &[Value]) -> Result<Value> {
    Ok(Value::string(args[0].to_json().to_string()))
}

fn fs_read_text(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "fs.read_text")?;
    fs::read_to_string(&path)
        .map(Value::string)
        .map_err(|err| io_error("fs.read_text", &path, err))
}

fn fs_write_text(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "fs.write_text")?;
    let contents = expect_string(&args[1], "fs.write_text")?;
    fs::write(&path, contents)
        .map(|_| Value::unit())
        .map_err(|err| io_error("fs.write_text", &path, err))
}

fn fs_exists(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "fs.exists")?;
    Ok(Value::bool(Path::new(&path).exists()))
}

fn fs_create_dir_all(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "fs.create_dir_all")?;
    fs::create_dir_all(&path)
        .map(|_| Value::unit())
        .map_err(|err| io_error("fs.create_dir_all", &path, err))
}

fn fs_remove(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "fs.remove")?;
    fs::remove_file(&path)
        .map(|_| Value::unit())
        .map_err(|err| io_error("fs.remove", &path, err))
}

fn os_env(args: &[Value]) -> Result<Value> {
    let name = expect_string(&args[0], "os.env")?;
    Ok(env::var(&name).map(Value::string).unwrap_or_else(|_| Value::unit()))
}

fn os_cwd(_: &[Value]) -> Result<Value> {
    let cwd = env::current_dir()?;
    Ok(Value::string(cwd.display().to_string()))
}

fn os_platform(_: &[Value]) -> Result<Value> {
    Ok(Value::string(env::consts::OS))
}

fn process_run(args: &[Value]) -> Result<Value> {
    let program = expect_string(&args[0], "process.run")?;
    let arguments = match args.get(1) {
        Some(list) => expect_array(list, "process.run")?
            .iter()
            .map(ToString::to_string)
            .collect(),
        None => Vec::new(),
    };
    let output = Command::new(&program)
        .args(&arguments)
        .output()
        .map_err(|err| io_error("process.run", &program, err))?;
    let mut result = IndexMap::new();
    result.insert(
        "status".into(),
        Value::int(i64::from(output.status.code().unwrap_or(-1))),
    );
    result.insert(
        "stdout".into(),
        Value::string(String::from_utf8_lossy(&output.stdout)),
    );
    result.insert(
        "stderr".into(),
        Value::string(String::from_utf8_lossy(&output.stderr)),
    );
    Ok(Value::map(result))
}

/// `connect(host, port[, payload])`: opens a TCP stream, sends the payload,
/// half-closes, and returns everything the peer sends back.
fn net_connect(args: &[Value]) -> Result<Value> {
    let host = expect_string(&args[0], "net.connect")?;
    let port = u16::try_from(expect_int(&args[1], "net.connect")?)
        .map_err(|_| runtime_error("net.connect expects a port between 0 and 65535"))?;
    let target = format!("{host}:{port}");
    let fail = |err| io_error("net.connect", &target, err);

    let mut stream = TcpStream::connect((host.as_str(), port)).map_err(fail)?;
    stream
        .set_read_timeout(Some(NET_TIMEOUT))
        .and_then(|()| stream.set_write_timeout(Some(NET_TIMEOUT)))
        .map_err(fail)?;
    if let Some(payload) = args.get(2) {
        stream
            .write_all(payload.to_string().as_bytes())
            .map_err(fail)?;
    }
    stream.shutdown(Shutdown::Write).map_err(fail)?;

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).map_err(fail)?;
    Ok(Value::string(String::from_utf8_lossy(&reply)))
}

fn io_error(name: &str, target: &str, err: std::io::Error) -> NarcissusError {
    let mut diagnostic = Diagnostic::runtime(format!("`{name}` failed for `{target}`: {err}"));
    if let Some(code) = err.raw_os_error() {
        diagnostic = diagnostic.with_note(format!("os error code: {code}"));
    }
    NarcissusError::from(diagnostic)
}
