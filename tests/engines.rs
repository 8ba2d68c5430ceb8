use playpen::{
    Block, Engine, ExampleCatalog, FaultKind, HostEngine, MarkupEngine, ScriptEngine,
    TranspileEngine, Transcript, Viewport, Widget,
    engine::{bundled_examples_root, humanize},
    engines::{MARKUP_HEIGHT, TRANSPILE_HEIGHT},
    host::HostFrame,
    registry::EngineLabel,
    sink::AlertLevel,
};
use serde_json::json;
use std::fs;
use tempfile::tempdir;

fn run(engine: &dyn Engine, source: &str) -> Transcript {
    let mut transcript = Transcript::new();
    engine.run(source, &mut transcript);
    transcript
}

#[test]
fn markup_is_embedded_verbatim() {
    let transcript = run(&MarkupEngine::new(), "<b>hi</b>");
    assert_eq!(
        transcript.blocks,
        vec![Block::Markup(Viewport {
            document: "<b>hi</b>".to_string(),
            height: MARKUP_HEIGHT,
            scrolling: true,
        })]
    );
    assert_eq!(MARKUP_HEIGHT, 640);
}

#[test]
fn markup_with_nul_is_a_render_fault() {
    let transcript = run(&MarkupEngine::new(), "<b>\0</b>");
    let faults: Vec<_> = transcript.faults().collect();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].kind, FaultKind::Render);
    assert_eq!(transcript.blocks.len(), 1);
}

#[test]
fn transpile_wraps_component_in_host_document() {
    let source = "const App = () => <h1>Hi</h1>;\nReactDOM.render(<App />, document.getElementById('root'));";
    let transcript = run(&TranspileEngine::new(), source);
    assert_eq!(transcript.blocks.len(), 1);
    let Block::Markup(viewport) = &transcript.blocks[0] else {
        panic!("expected markup, found {:?}", transcript.blocks[0]);
    };
    assert_eq!(viewport.height, TRANSPILE_HEIGHT);
    assert_eq!(TRANSPILE_HEIGHT, 800);
    assert!(viewport.document.starts_with("<!DOCTYPE html>"));
    assert!(viewport.document.contains("<div id=\"root\"></div>"));
    assert!(viewport.document.contains("babel.min.js"));
    assert!(viewport.document.contains("react@18"));
    assert!(viewport.document.contains("<script type=\"text/babel\""));
    assert!(viewport.document.contains(source));
    assert!(viewport.document.trim_end().ends_with("</html>"));
}

#[test]
fn transpile_rejects_closing_script_tag() {
    for source in ["const s = '</script>';", "// </SCRIPT"] {
        let transcript = run(&TranspileEngine::new(), source);
        let faults: Vec<_> = transcript.faults().collect();
        assert_eq!(faults.len(), 1, "{source}");
        assert_eq!(faults[0].kind, FaultKind::Render);
        assert!(faults[0].message.starts_with("Render error: "));
    }
    assert!(TranspileEngine::document("const ok = 1;").is_ok());
}

#[test]
fn host_engine_emits_widgets_then_panel() {
    let source = r#"
        print("  working  ")
        ui.title("Dashboard")
        ui.metric("Users", 42, "+3")
        ui.table([{ "name": "ada", "age": 36 }, { "name": "alan" }])
        ui.json({ "ok": true })
        ui.warning("careful")
        ui.divider()
        ui.write("plain", 7)
    "#;
    let transcript = run(&HostEngine::new(), source);
    let widgets: Vec<_> = transcript.widgets().cloned().collect();
    assert_eq!(
        widgets,
        vec![
            Widget::Title {
                text: "Dashboard".to_string()
            },
            Widget::Metric {
                label: "Users".to_string(),
                value: "42".to_string(),
                delta: Some("+3".to_string()),
            },
            Widget::Table {
                columns: vec!["name".to_string(), "age".to_string()],
                rows: vec![
                    vec!["ada".to_string(), "36".to_string()],
                    vec!["alan".to_string(), String::new()],
                ],
            },
            Widget::Json {
                value: json!({ "ok": true })
            },
            Widget::Alert {
                level: AlertLevel::Warning,
                message: "careful".to_string(),
            },
            Widget::Divider,
            Widget::Markdown {
                text: "plain".to_string()
            },
            Widget::Text {
                text: "7".to_string()
            },
        ]
    );
    assert_eq!(
        transcript.blocks.last(),
        Some(&Block::Panel {
            title: "Console output".to_string(),
            body: "working".to_string(),
        })
    );
}

#[test]
fn host_engine_without_output_has_no_panel() {
    let transcript = run(&HostEngine::new(), "ui.text(\"only\")");
    assert_eq!(
        transcript.blocks,
        vec![Block::Widget {
            widget: Widget::Text {
                text: "only".to_string()
            }
        }]
    );
}

#[test]
fn host_engine_keeps_widgets_before_a_fault() {
    let transcript = run(&HostEngine::new(), "ui.header(\"kept\")\nui.table(5)");
    assert!(matches!(
        &transcript.blocks[0],
        Block::Widget {
            widget: Widget::Header { .. }
        }
    ));
    assert!(matches!(&transcript.blocks[1], Block::Fault(report) if report.kind == FaultKind::Runtime));
    assert_eq!(transcript.blocks.len(), 2);
}

#[test]
fn ui_binding_is_only_in_host_engine() {
    let transcript = run(&ScriptEngine::new(), "ui.title(\"x\")");
    let fault = transcript.faults().next().expect("ui is undefined");
    assert!(fault.message.contains("undefined variable `ui`"), "{}", fault.message);
}

#[test]
fn language_ids_are_distinct() {
    let mut ids: Vec<_> = EngineLabel::ALL
        .iter()
        .map(|label| label.build().language_id())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), EngineLabel::ALL.len());
}

#[test]
fn labels_round_trip_through_names() {
    for label in EngineLabel::ALL {
        assert_eq!(label.name().parse::<EngineLabel>(), Ok(label));
        assert_eq!(label.label().parse::<EngineLabel>(), Ok(label));
    }
    let err = "cobol".parse::<EngineLabel>().expect_err("unknown");
    assert!(err.to_string().contains("unknown engine `cobol`"));
}

#[test]
fn bundled_catalogs_are_sorted_and_filtered() {
    let names: Vec<_> = ScriptEngine::new()
        .list_examples()
        .into_iter()
        .map(|example| example.name)
        .collect();
    assert_eq!(names.first().map(String::as_str), Some("01 Hello World"));
    assert!(names.contains(&"03 Http Requests".to_string()));
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);

    for label in EngineLabel::ALL {
        assert!(!label.build().list_examples().is_empty(), "{label}");
    }
}

#[test]
fn bundled_host_examples_pass_screening() {
    for label in [EngineLabel::Narcissus, EngineLabel::NarcissusUi] {
        for example in label.build().list_examples() {
            let source = example.read().expect("example readable");
            assert!(
                playpen::safety::check(&source).is_ok(),
                "{} was rejected",
                example.name
            );
        }
    }
}

#[test]
fn custom_catalog_lists_matching_files_only() {
    let dir = tempdir().expect("create temp dir");
    fs::write(dir.path().join("b_second.html"), "<i>2</i>").expect("write");
    fs::write(dir.path().join("a_first.html"), "<i>1</i>").expect("write");
    fs::write(dir.path().join("notes.txt"), "skip").expect("write");
    fs::create_dir(dir.path().join("nested.html")).expect("mkdir");

    let engine = MarkupEngine::with_catalog(ExampleCatalog::new(dir.path(), "html"));
    let examples = engine.list_examples();
    let names: Vec<_> = examples.iter().map(|example| example.name.as_str()).collect();
    assert_eq!(names, ["A First", "B Second"]);
    assert_eq!(examples[0].read().expect("readable"), "<i>1</i>");
}

#[test]
fn missing_catalog_directory_is_empty() {
    let dir = tempdir().expect("create temp dir");
    let catalog = ExampleCatalog::new(dir.path().join("absent"), "ns");
    assert!(catalog.list().is_empty());
}

#[test]
fn humanize_title_cases_words() {
    assert_eq!(humanize("03_http_requests"), "03 Http Requests");
    assert_eq!(humanize("hello"), "Hello");
    assert_eq!(humanize("TODO_list"), "Todo List");
}

#[test]
fn iframe_escapes_the_document() {
    let viewport = Viewport::new("<p class=\"x\">a & b</p>", 300);
    let frame = viewport.iframe();
    assert!(frame.contains("srcdoc=\"&lt;p class=&quot;x&quot;&gt;a &amp; b&lt;/p&gt;\""), "{frame}");
    assert!(frame.contains("height: 300px"));
    assert!(frame.contains("sandbox=\"allow-scripts\""));
}

#[test]
fn offline_host_demos_render_without_faults() {
    let engine = HostEngine::new();
    for example in engine.list_examples() {
        // Needs network access.
        if example.name == "04 Hacker News" {
            continue;
        }
        let source = example.read().expect("example readable");
        let transcript = run(&engine, &source);
        assert_eq!(transcript.faults().count(), 0, "{} faulted", example.name);
        assert!(transcript.widgets().count() > 0, "{}", example.name);
    }
}

#[test]
fn host_frame_collects_and_drains_widgets() {
    let frame = HostFrame::new();
    assert!(frame.is_empty());
    frame.push(Widget::Divider);
    frame.clone().push(Widget::Caption {
        text: "shared".to_string(),
    });
    assert_eq!(frame.len(), 2);
    assert_eq!(
        frame.drain(),
        vec![
            Widget::Divider,
            Widget::Caption {
                text: "shared".to_string()
            }
        ]
    );
    assert!(frame.is_empty());
}

#[test]
fn bundled_catalog_points_into_demos() {
    let catalog = ExampleCatalog::bundled("react", "tsx");
    assert_eq!(catalog.dir(), bundled_examples_root().join("react"));
}
