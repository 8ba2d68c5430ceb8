use indexmap::IndexMap;
use playpen::{
    diagnostics::NarcissusError,
    parser,
    runtime::Interpreter,
    value::{Value, ValueKind},
};
use std::path::Path;
use tempfile::tempdir;

fn eval(source: &str) -> Value {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed")
}

fn eval_error(source: &str) -> NarcissusError {
    let mut interpreter = Interpreter::new();
    match interpreter.eval_source(source) {
        Ok(value) => panic!("expected error, received value {value}"),
        Err(err) => err,
    }
}

fn expect_int(value: &Value) -> i64 {
    match value.0.as_ref() {
        ValueKind::Int(n) => *n,
        _ => panic!("expected Int, found {}", value.type_name()),
    }
}

fn expect_float(value: &Value) -> f64 {
    match value.0.as_ref() {
        ValueKind::Float(f) => *f,
        _ => panic!("expected Float, found {}", value.type_name()),
    }
}

fn expect_map(value: &Value) -> &IndexMap<String, Value> {
    match value.0.as_ref() {
        ValueKind::Map(map) => map,
        _ => panic!("expected Map, found {}", value.type_name()),
    }
}

fn expect_bool(value: &Value) -> bool {
    match value.0.as_ref() {
        ValueKind::Bool(b) => *b,
        _ => panic!("expected Bool, found {}", value.type_name()),
    }
}

fn path_literal(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "\\\\")
}

#[test]
fn evaluates_basic_arithmetic() {
    let value = eval("return 2 + 2;");
    assert_eq!(expect_int(&value), 4);
}

#[test]
fn integer_division_stays_integral_when_exact() {
    assert_eq!(expect_int(&eval("10 / 2")), 5);
    assert_eq!(expect_float(&eval("7 / 2")), 3.5);
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let message = eval_error("1 / 0").to_string();
    assert!(message.contains("division by zero"), "{message}");
}

#[test]
fn matches_when_pattern() {
    let value = eval(
        r#"
        var value = 2
        when value {
            1 -> { return 1; }
            2 -> { return 42; }
            else -> { return 0; }
        }
        "#,
    );
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn when_binds_tuple_elements() {
    let value = eval(
        r#"
        when (3, 4) {
            (a, b) -> { a * b }
        }
        "#,
    );
    assert_eq!(expect_int(&value), 12);
}

#[test]
fn returns_last_expression_from_script() {
    let value = eval(
        r#"
        var x = 40
        x + 2
        "#,
    );
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn break_carries_value_out_of_loop() {
    let value = eval(
        r#"
        loop {
            break 7
        }
        "#,
    );
    assert_eq!(expect_int(&value), 7);
}

#[test]
fn for_loop_accumulates_sum() {
    let value = eval(
        r#"
        var mut sum = 0
        for item in [1, 2, 3, 4] {
            sum = sum + item
        }
        sum
        "#,
    );
    assert_eq!(expect_int(&value), 10);
}

#[test]
fn map_field_assignment_updates_value() {
    let value = eval(
        r#"
        var mut inventory = {
            "apples": 3,
            "bananas": 7
        }
        inventory.bananas = inventory.bananas + 5
        inventory
        "#,
    );
    let map = expect_map(&value);
    assert_eq!(map.len(), 2);
    assert_eq!(expect_int(map.get("apples").unwrap()), 3);
    assert_eq!(expect_int(map.get("bananas").unwrap()), 12);
}

#[test]
fn array_element_assignment_updates_value() {
    let value = eval(
        r#"
        var mut numbers = [1, 2, 3]
        numbers[1] = numbers[1] + 5
        numbers[-1] = 9
        numbers
        "#,
    );
    match value.0.as_ref() {
        ValueKind::Array(values) => {
            assert_eq!(values.len(), 3);
            assert_eq!(expect_int(&values[0]), 1);
            assert_eq!(expect_int(&values[1]), 7);
            assert_eq!(expect_int(&values[2]), 9);
        }
        _ => panic!("expected Array, found {}", value.type_name()),
    }
}

#[test]
fn recursive_function_evaluates() {
    let value = eval(
        r#"
        fn fib(n) {
            if n <= 1 {
                return n
            }
            return fib(n - 1) + fib(n - 2)
        }

        fib(6)
        "#,
    );
    assert_eq!(expect_int(&value), 8);
}

#[test]
fn lambdas_capture_their_scope() {
    let value = eval(
        r#"
        var offset = 10
        var add = |x| x + offset
        add(5)
        "#,
    );
    assert_eq!(expect_int(&value), 15);
}

#[test]
fn const_assignment_is_rejected() {
    let err = eval_error(
        r#"
        const answer = 42
        answer = 13
        "#,
    );
    let message = format!("{err}");
    assert!(
        message.contains("cannot assign to immutable binding"),
        "{message}"
    );
}

#[test]
fn scope_is_restored_after_a_failing_block() {
    let mut interpreter = Interpreter::new();
    assert!(
        interpreter
            .eval_source("var x = 1\nif true { var y = 2\nmissing() }")
            .is_err()
    );
    let value = interpreter
        .eval_source("x")
        .expect("outer binding still visible");
    assert_eq!(expect_int(&value), 1);
    assert!(interpreter.eval_source("y").is_err());
}

#[test]
fn use_binds_module_and_alias() {
    assert_eq!(expect_int(&eval("use string\nstring.len(\"hello\")")), 5);
    assert_eq!(expect_int(&eval("use collections as c\nc.len([1, 2, 3])")), 3);
    assert_eq!(expect_int(&eval("use math.abs\nabs(-4)")), 4);
}

#[test]
fn use_from_binds_members() {
    let value = eval(
        r#"
        from collections use len, keys as names
        len(names({ "a": 1, "b": 2 }))
        "#,
    );
    assert_eq!(expect_int(&value), 2);
}

#[test]
fn modules_are_not_global() {
    let message = eval_error("math.abs(-1)").to_string();
    assert!(message.contains("undefined variable `math`"), "{message}");
}

#[test]
fn unknown_module_and_member_are_runtime_errors() {
    let message = eval_error("use nothing_here").to_string();
    assert!(message.contains("unknown module `nothing_here`"), "{message}");

    let message = eval_error("from math use tau").to_string();
    assert!(message.contains("has no member `tau`"), "{message}");
}

#[test]
fn std_length_helpers() {
    let string_len = eval("use string\nstring.len(\"hello\")");
    assert_eq!(expect_int(&string_len), 5);

    let map_len = eval(
        r#"
        use collections
        collections.len({ "a": 1, "b": 2 })
        "#,
    );
    assert_eq!(expect_int(&map_len), 2);
}

#[test]
fn std_math_helpers() {
    assert_eq!(expect_int(&eval("use math\nmath.abs(-42)")), 42);
    assert_eq!(expect_float(&eval("use math\nmath.sqrt(49)")), 7.0);
    assert_eq!(expect_float(&eval("use math\nmath.round(2.6)")), 3.0);
    assert_eq!(expect_float(&eval("use math\nmath.pow(2, 8)")), 256.0);
}

#[test]
fn json_round_trips_through_values() {
    let value = eval(
        r#"
        use json
        var data = json.parse("{\"name\": \"ada\", \"tags\": [1, 2]}")
        data.name + ":" + json.stringify(data.tags)
        "#,
    );
    assert_eq!(value.to_string(), "ada:[1,2]");
}

#[test]
fn string_helpers() {
    let value = eval(
        r#"
        use string
        string.join(string.split("a-b-c", "-"), "+")
        "#,
    );
    assert_eq!(value.to_string(), "a+b+c");
}

#[test]
fn std_fs_exists_and_remove() {
    let temp = tempdir().expect("create temp dir");
    let file_path = temp.path().join("sample.txt");
    let dir_path = temp.path().join("nested");

    let file_literal = path_literal(&file_path);
    let dir_literal = path_literal(&dir_path);

    let script = format!(
        r#"
        use fs
        fs.create_dir_all("{dir}")
        fs.write_text("{file}", "hello")
        fs.exists("{dir}")
        "#,
        dir = dir_literal,
        file = file_literal
    );
    let exists_dir = eval(&script);
    assert!(expect_bool(&exists_dir));

    let exists_file = eval(&format!(
        "use fs\nfs.exists(\"{file}\")",
        file = file_literal
    ));
    assert!(expect_bool(&exists_file));

    let removed = eval(&format!(
        r#"
        use fs
        fs.remove("{file}")
        fs.exists("{file}")
        "#,
        file = file_literal
    ));
    assert!(!expect_bool(&removed));
}

#[test]
fn parse_error_reports_line_and_column() {
    let diagnostic = parser::parse_module("var ok = 1\nfn f(:").expect_err("should not parse");
    let location = diagnostic.located("var ok = 1\nfn f(:");
    assert_eq!((location.line, location.column), (2, 6));
    assert_eq!(diagnostic.message, "expected parameter name");
}

#[test]
fn offline_demo_scripts_run() {
    for script in [
        "demos/narcissus/01_hello_world.ns",
        "demos/narcissus/02_fibonacci.ns",
        "demos/narcissus/04_word_count.ns",
        "demos/narcissus/05_pattern_matching.ns",
    ] {
        let source = std::fs::read_to_string(script)
            .unwrap_or_else(|err| panic!("failed to read {script}: {err}"));
        let mut interpreter = Interpreter::new();
        let _capture = playpen::capture::StdoutCapture::begin();
        if let Err(err) = interpreter.eval_source(&source) {
            panic!("{script} should run: {err}");
        }
    }
}

#[test]
fn bindings_persist_in_the_interpreter_environment() {
    let mut interpreter = Interpreter::new();
    let module = parser::parse_module("var answer = 41 + 1").expect("parses");
    interpreter.eval_module(&module).expect("evaluates");

    let env = interpreter.environment().borrow();
    assert!(env.contains("answer"));
    assert!(env.contains("print"));
    assert!(env.names().any(|name| name == "range"));
}

#[test]
fn math_abs_of_the_smallest_integer_is_an_error() {
    let message = eval_error("use math\nmath.abs(-9223372036854775807 - 1)").to_string();
    assert!(message.contains("overflowed"), "{message}");
}

#[test]
fn range_step_stops_at_the_integer_limit() {
    let value = eval(
        r#"
        use collections
        collections.range_step(9223372036854775806, 9223372036854775807, 5)
        "#,
    );
    match value.0.as_ref() {
        ValueKind::Array(values) => {
            assert_eq!(values.len(), 1);
            assert_eq!(expect_int(&values[0]), i64::MAX - 1);
        }
        _ => panic!("expected Array, found {}", value.type_name()),
    }
}

#[test]
fn unrepresentable_sleep_is_an_error() {
    let message = eval_error("use math\nuse time\ntime.sleep(math.pow(10, 300))").to_string();
    assert!(message.contains("invalid sleep duration"), "{message}");
}

#[test]
fn net_connect_exchanges_bytes_with_a_peer() {
    use std::{
        io::{Read, Write},
        net::TcpListener,
        thread,
    };

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let port = listener.local_addr().expect("local addr").port();
    let peer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request = String::new();
        stream.read_to_string(&mut request).expect("read request");
        stream
            .write_all(format!("pong:{request}").as_bytes())
            .expect("write reply");
    });

    let value = eval(&format!(
        "use net\nnet.connect(\"127.0.0.1\", {port}, \"ping\")"
    ));
    peer.join().expect("peer thread");
    assert_eq!(value.to_string(), "pong:ping");
}

#[test]
fn net_connect_rejects_out_of_range_ports() {
    let message = eval_error("use net\nnet.connect(\"127.0.0.1\", 70000)").to_string();
    assert!(message.contains("port between 0 and 65535"), "{message}");
}

#[test]
fn negating_the_smallest_integer_widens_to_float() {
    let value = eval("var low = -9223372036854775807 - 1\n-low");
    assert_eq!(expect_float(&value), 9223372036854775808.0);
}
