use playpen::{
    EngineError, FaultKind, SourceSpan, Verdict,
    ast::{Expr, ExprKind, Module, Stmt, StmtKind},
    parser,
    safety::{self, DENYLIST},
};

fn rejection(source: &str) -> EngineError {
    match safety::check(source) {
        Verdict::Rejected(reason) => reason,
        Verdict::Accepted => panic!("expected rejection for {source:?}"),
    }
}

#[test]
fn denylisted_use_is_rejected() {
    let reason = rejection("use os\nprint(1)");
    assert_eq!(reason, EngineError::ForbiddenCapability);
    assert_eq!(reason.kind(), FaultKind::ForbiddenCapability);
    assert_eq!(reason.to_string(), "Blocked: forbidden capability import.");
}

#[test]
fn every_denylisted_root_is_rejected() {
    for module in DENYLIST {
        assert_eq!(
            rejection(&format!("use {module}")),
            EngineError::ForbiddenCapability
        );
        assert_eq!(
            rejection(&format!("use {module} as alias")),
            EngineError::ForbiddenCapability
        );
    }
}

#[test]
fn from_import_is_rejected() {
    assert_eq!(
        rejection("from process use run\nrun(\"ls\")"),
        EngineError::ForbiddenCapability
    );
}

#[test]
fn dotted_path_is_judged_by_its_root() {
    assert_eq!(rejection("use fs.read_text"), EngineError::ForbiddenCapability);
    assert!(safety::check("use math.abs").is_ok());
}

#[test]
fn nested_imports_are_found() {
    let sources = [
        "fn sneaky() {\n    use os\n    return os.cwd()\n}",
        "fn outer() {\n    fn inner() {\n        from net use connect\n    }\n}",
        "if true {\n    for i in [1] {\n        use fs\n    }\n}",
        "when 1 {\n    1 -> { use process }\n    else -> {}\n}",
        "while true {\n    use os\n    break\n}",
        "loop {\n    from fs use read_text\n    break\n}",
        "{\n    {\n        use net\n    }\n}",
    ];
    for source in sources {
        assert_eq!(rejection(source), EngineError::ForbiddenCapability, "{source}");
    }
}

#[test]
fn forbidden_import_reports_the_offending_path() {
    let module = parser::parse_module("use string\nuse os.env as env").expect("parses");
    let path = safety::forbidden_import(&module).expect("found");
    assert_eq!(path, ["os".to_string(), "env".to_string()]);

    let module = parser::parse_module("use string").expect("parses");
    assert!(safety::forbidden_import(&module).is_none());
}

#[test]
fn allowed_imports_are_accepted() {
    let verdict = safety::check(
        "use string\nuse math as m\nfrom collections use len\nfrom json use parse\nuse time\nuse http",
    );
    assert!(verdict.is_ok());
    assert_eq!(verdict.reason(), None);
}

#[test]
fn module_names_in_strings_are_not_imports() {
    assert!(safety::check("print(\"use os\")\nvar fs = 1\nprint(fs)").is_ok());
}

#[test]
fn parse_failure_is_a_syntax_rejection() {
    let reason = rejection("fn f(:");
    assert_eq!(reason.kind(), FaultKind::Syntax);
    let location = reason.location().expect("syntax errors are located");
    assert_eq!((location.line, location.column), (1, 6));
    assert_eq!(
        reason.to_string(),
        "Syntax error: expected parameter name (line 1, column 6)"
    );
}

fn stmt(kind: StmtKind) -> Stmt {
    Stmt {
        kind,
        span: SourceSpan::new(0, 0),
    }
}

fn expr(kind: ExprKind) -> Expr {
    Expr {
        kind,
        span: SourceSpan::new(0, 0),
    }
}

fn import(root: &str) -> Stmt {
    stmt(StmtKind::Use {
        path: vec![root.to_string()],
        alias: None,
    })
}

/// `var g = |x| <body>`, built directly because lambda bodies are a
/// single expression in source form.
fn lambda_binding(body: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::VarDecl {
        name: "g".to_string(),
        initializer: Some(expr(ExprKind::Lambda {
            params: vec!["x".to_string()],
            body,
        })),
    })
}

#[test]
fn imports_inside_lambda_bodies_are_found() {
    let module = Module {
        items: vec![lambda_binding(vec![import("os")])],
    };
    assert_eq!(
        safety::forbidden_import(&module),
        Some(["os".to_string()].as_slice())
    );

    let module = Module {
        items: vec![lambda_binding(vec![import("math")])],
    };
    assert!(safety::forbidden_import(&module).is_none());
}

#[test]
fn imports_inside_initializer_expressions_are_found() {
    let call = expr(ExprKind::Call {
        callee: Box::new(expr(ExprKind::Variable("apply".to_string()))),
        args: vec![expr(ExprKind::ArrayLiteral(vec![expr(ExprKind::Lambda {
            params: Vec::new(),
            body: vec![import("process")],
        })]))],
    });
    let module = Module {
        items: vec![stmt(StmtKind::ConstDecl {
            name: "result".to_string(),
            value: call,
        })],
    };
    assert_eq!(
        safety::forbidden_import(&module),
        Some(["process".to_string()].as_slice())
    );
}

#[test]
fn statement_in_lambda_source_is_still_rejected() {
    assert!(!safety::check("var g = |x| { use os }").is_ok());
}
