use playpen::{
    Block, EngineError, FaultKind, ScriptEngine, Transcript,
    capture,
    engine::Engine,
    engines::{ConsolePresenter, HostEnvironment, PanelPresenter, ScriptEnvironment},
    environment::{EnvironmentRef, ScopeCell},
    host::HostFrame,
    pipeline::{EnvironmentBuilder, ExecutionPipeline, SafetyCheck},
    runtime::MAX_CALL_DEPTH,
    safety::{DenylistAnalyzer, Verdict},
};
use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

fn run(source: &str) -> Transcript {
    let mut transcript = Transcript::new();
    ScriptEngine::new().run(source, &mut transcript);
    transcript
}

/// Accepts everything, so capability modules reach the interpreter.
struct AllowAll;

impl SafetyCheck for AllowAll {
    fn check(&self, _source: &str) -> Verdict {
        Verdict::Accepted
    }
}

/// Host environment that remembers every root scope it hands out.
#[derive(Default)]
struct TrackedEnvironment {
    built: Rc<RefCell<Vec<Weak<ScopeCell>>>>,
}

impl EnvironmentBuilder for TrackedEnvironment {
    fn build(&self, frame: &HostFrame) -> EnvironmentRef {
        let env = HostEnvironment.build(frame);
        self.built.borrow_mut().push(Rc::downgrade(&env));
        env
    }
}

#[test]
fn printed_output_becomes_one_console_block() {
    let transcript = run("print(1 + 1)");
    assert_eq!(
        transcript.blocks,
        vec![Block::Console {
            text: "2\n".to_string()
        }]
    );
}

#[test]
fn output_keeps_order_and_appears_once() {
    let transcript = run("print(\"a\")\nwrite(\"b\")\nprint(\"c\")\nfor i in [1, 2] { print(i) }");
    assert_eq!(transcript.blocks.len(), 1);
    assert_eq!(transcript.console_text(), "a\nbc\n1\n2\n");
}

#[test]
fn silent_snippet_still_gets_a_console_block() {
    let transcript = run("var x = 1");
    assert_eq!(
        transcript.blocks,
        vec![Block::Console {
            text: String::new()
        }]
    );
}

#[test]
fn repeated_runs_are_identical() {
    let source = "var total = 0\nfor i in range(0, 5) { total = total + i }\nprint(total)";
    let first = run(source);
    let second = run(source);
    assert_eq!(first, second);
    assert_eq!(first.console_text(), "10\n");
}

#[test]
fn runs_do_not_share_bindings() {
    let engine = ScriptEngine::new();
    let mut first = Transcript::new();
    engine.run("var x = 1", &mut first);
    assert_eq!(first.faults().count(), 0);

    let mut second = Transcript::new();
    engine.run("print(x)", &mut second);
    let faults: Vec<_> = second.faults().collect();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].kind, FaultKind::Runtime);
    assert!(
        faults[0].message.contains("undefined variable `x`"),
        "{}",
        faults[0].message
    );
}

#[test]
fn entry_module_marker_is_defined() {
    assert_eq!(run("print(__module__)").console_text(), "main\n");
}

#[test]
fn runtime_fault_precedes_console_and_keeps_earlier_output() {
    let transcript = run("print(\"before\")\nmissing()\nprint(\"after\")");
    assert_eq!(transcript.blocks.len(), 2);
    match &transcript.blocks[0] {
        Block::Fault(report) => {
            assert_eq!(report.kind, FaultKind::Runtime);
            assert!(report.message.starts_with("Runtime error: "), "{}", report.message);
            assert_eq!(report.location.map(|location| location.line), Some(2));
        }
        other => panic!("expected fault, found {other:?}"),
    }
    assert_eq!(
        transcript.blocks[1],
        Block::Console {
            text: "before\n".to_string()
        }
    );
}

#[test]
fn rejected_snippet_produces_only_a_fault() {
    let transcript = run("print(\"never\")\nuse os");
    assert_eq!(transcript.blocks.len(), 1);
    match &transcript.blocks[0] {
        Block::Fault(report) => {
            assert_eq!(report.kind, FaultKind::ForbiddenCapability);
            assert_eq!(report.message, EngineError::ForbiddenCapability.to_string());
            assert_eq!(report.location, None);
        }
        other => panic!("expected fault, found {other:?}"),
    }
}

#[test]
fn syntax_error_is_reported_before_running() {
    let transcript = run("print(\"never\")\nfn f(:");
    assert_eq!(transcript.blocks.len(), 1);
    assert_eq!(transcript.faults().next().map(|f| f.kind), Some(FaultKind::Syntax));
}

#[test]
fn capture_is_released_after_every_run() {
    run("print(\"ok\")");
    assert_eq!(capture::depth(), 0);
    run("missing()");
    assert_eq!(capture::depth(), 0);
    run("use fs");
    assert_eq!(capture::depth(), 0);
}

#[test]
fn safety_strategy_is_swappable() {
    let pipeline = ExecutionPipeline::new(AllowAll, ScriptEnvironment, ConsolePresenter);
    let mut transcript = Transcript::new();
    pipeline.execute("use os\nprint(os.platform() != \"\")", &mut transcript);
    assert_eq!(transcript.faults().count(), 0);
    assert_eq!(transcript.console_text(), "true\n");
}

#[test]
fn panel_presenter_skips_blank_output() {
    let pipeline = ExecutionPipeline::new(DenylistAnalyzer, ScriptEnvironment, PanelPresenter);
    let mut transcript = Transcript::new();
    pipeline.execute("print(\"   \")", &mut transcript);
    assert!(transcript.is_empty());

    pipeline.execute("print(\" padded \")", &mut transcript);
    assert_eq!(
        transcript.blocks,
        vec![Block::Panel {
            title: "Console output".to_string(),
            body: "padded".to_string()
        }]
    );
}

#[test]
fn runaway_recursion_is_a_runtime_fault() {
    let transcript = run("print(\"start\")\nfn f(n) { return f(n + 1) }\nf(0)");
    let faults: Vec<_> = transcript.faults().collect();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].kind, FaultKind::Runtime);
    assert!(
        faults[0].message.contains("maximum recursion depth exceeded"),
        "{}",
        faults[0].message
    );
    assert_eq!(transcript.console_text(), "start\n");
    assert_eq!(capture::depth(), 0);
}

#[test]
fn recursion_below_the_limit_still_works() {
    let depth = MAX_CALL_DEPTH - 8;
    let source = format!(
        "fn count(n) {{\n    if n == 0 {{ return 0 }}\n    return 1 + count(n - 1)\n}}\nprint(count({depth}))"
    );
    let transcript = run(&source);
    assert_eq!(transcript.faults().count(), 0);
    assert_eq!(transcript.console_text(), format!("{depth}\n"));
}

#[test]
fn call_depth_resets_between_sibling_calls() {
    let transcript = run(&format!(
        "fn down(n) {{\n    if n == 0 {{ return 0 }}\n    return down(n - 1)\n}}\nfor i in range(0, 4) {{ down({}) }}\nprint(\"done\")",
        MAX_CALL_DEPTH - 8
    ));
    assert_eq!(transcript.faults().count(), 0);
    assert_eq!(transcript.console_text(), "done\n");
}

#[test]
fn environment_is_dropped_after_every_run() {
    let tracked = TrackedEnvironment::default();
    let built = Rc::clone(&tracked.built);
    let pipeline = ExecutionPipeline::new(DenylistAnalyzer, tracked, PanelPresenter);

    let sources = [
        "print(1)",
        "fn f() { return 1 }\nprint(f())",
        "var g = |x| x + 1\nprint(g(1))",
        "if true {\n    fn inner() { return 2 }\n    print(inner())\n}",
        "fn outer() { return |y| y }\nvar h = outer()\nprint(h(3))",
        "ui.title(\"kept\")\nfn broken() { return missing }\nbroken()",
        "fn f(n) { return f(n + 1) }\nf(0)",
    ];
    for source in sources {
        let mut transcript = Transcript::new();
        pipeline.execute(source, &mut transcript);
        let env = built.borrow_mut().pop().expect("environment was built");
        assert!(env.upgrade().is_none(), "environment outlived the run of {source:?}");
    }
}
