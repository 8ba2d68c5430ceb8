//! The concrete engines: two that execute Narcissus and two that only embed
//! markup.

use crate::{
    engine::{Engine, ExampleCatalog, ExampleRef},
    environment::{Environment, EnvironmentRef},
    error::EngineError,
    host::HostFrame,
    pipeline::{EnvironmentBuilder, ExecutionPipeline, OutputPresenter},
    safety::DenylistAnalyzer,
    sink::{FaultReport, OutputSink, Viewport},
    stdlib,
    value::Value,
};

/// Name of the entry-module marker defined in every executing run.
pub const MODULE_MARKER: &str = "__module__";
/// Name under which host-augmented snippets see the UI binding.
pub const UI_BINDING: &str = "ui";
pub const CONSOLE_PANEL_TITLE: &str = "Console output";

pub const MARKUP_HEIGHT: u32 = 640;
pub const TRANSPILE_HEIGHT: u32 = 800;

/// Builtins plus the entry-module marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptEnvironment;

impl EnvironmentBuilder for ScriptEnvironment {
    fn build(&self, _frame: &HostFrame) -> EnvironmentRef {
        let env = Environment::new();
        stdlib::install_builtins(&env);
        env.borrow_mut()
            .define(MODULE_MARKER, Value::string("main"), false);
        env
    }
}

/// [`ScriptEnvironment`] plus the `ui` binding wired to the run's frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostEnvironment;

impl EnvironmentBuilder for HostEnvironment {
    fn build(&self, frame: &HostFrame) -> EnvironmentRef {
        let env = ScriptEnvironment.build(frame);
        env.borrow_mut().define(UI_BINDING, frame.ui_module(), false);
        env
    }
}

/// Shows captured text as a raw console block, even when empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePresenter;

impl OutputPresenter for ConsolePresenter {
    fn present(&self, console: &str, sink: &mut dyn OutputSink) {
        sink.console(console);
    }
}

/// Shows trimmed captured text in a collapsible panel, skipping it when
/// there is nothing to show.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanelPresenter;

impl OutputPresenter for PanelPresenter {
    fn present(&self, console: &str, sink: &mut dyn OutputSink) {
        let console = console.trim();
        if !console.is_empty() {
            sink.panel(CONSOLE_PANEL_TITLE, console);
        }
    }
}

/// Plain Narcissus: stdout is the only output.
pub struct ScriptEngine {
    pipeline: ExecutionPipeline<DenylistAnalyzer, ScriptEnvironment, ConsolePresenter>,
    catalog: ExampleCatalog,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::with_catalog(ExampleCatalog::bundled("narcissus", "ns"))
    }

    pub fn with_catalog(catalog: ExampleCatalog) -> Self {
        Self {
            pipeline: ExecutionPipeline::new(DenylistAnalyzer, ScriptEnvironment, ConsolePresenter),
            catalog,
        }
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for ScriptEngine {
    fn language_id(&self) -> &'static str {
        "narcissus"
    }

    fn run(&self, source: &str, sink: &mut dyn OutputSink) {
        self.pipeline.execute(source, sink);
    }

    fn list_examples(&self) -> Vec<ExampleRef> {
        self.catalog.list()
    }
}

/// Narcissus with the `ui` binding: widgets first, console in a panel.
pub struct HostEngine {
    pipeline: ExecutionPipeline<DenylistAnalyzer, HostEnvironment, PanelPresenter>,
    catalog: ExampleCatalog,
}

impl HostEngine {
    pub fn new() -> Self {
        Self::with_catalog(ExampleCatalog::bundled("narcissus_ui", "ns"))
    }

    pub fn with_catalog(catalog: ExampleCatalog) -> Self {
        Self {
            pipeline: ExecutionPipeline::new(DenylistAnalyzer, HostEnvironment, PanelPresenter),
            catalog,
        }
    }
}

impl Default for HostEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for HostEngine {
    fn language_id(&self) -> &'static str {
        "narcissus-ui"
    }

    fn run(&self, source: &str, sink: &mut dyn OutputSink) {
        self.pipeline.execute(source, sink);
    }

    fn list_examples(&self) -> Vec<ExampleRef> {
        self.catalog.list()
    }
}

/// Embeds an HTML/CSS/JavaScript document verbatim.
pub struct MarkupEngine {
    catalog: ExampleCatalog,
}

impl MarkupEngine {
    pub fn new() -> Self {
        Self::with_catalog(ExampleCatalog::bundled("html", "html"))
    }

    pub fn with_catalog(catalog: ExampleCatalog) -> Self {
        Self { catalog }
    }
}

impl Default for MarkupEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MarkupEngine {
    fn language_id(&self) -> &'static str {
        "html"
    }

    fn run(&self, source: &str, sink: &mut dyn OutputSink) {
        match embeddable(source) {
            Ok(()) => sink.markup(Viewport::new(source, MARKUP_HEIGHT)),
            Err(err) => sink.fault(FaultReport::from(err)),
        }
    }

    fn list_examples(&self) -> Vec<ExampleRef> {
        self.catalog.list()
    }
}

/// Wraps a TSX component in a host document that loads React and Babel and
/// transpiles the component in the viewport.
pub struct TranspileEngine {
    catalog: ExampleCatalog,
}

impl TranspileEngine {
    pub fn new() -> Self {
        Self::with_catalog(ExampleCatalog::bundled("react", "tsx"))
    }

    pub fn with_catalog(catalog: ExampleCatalog) -> Self {
        Self { catalog }
    }

    /// The full document shown in the viewport for `source`.
    pub fn document(source: &str) -> Result<String, EngineError> {
        embeddable(source)?;
        if source.to_ascii_lowercase().contains("</script") {
            return Err(EngineError::Render(
                "source contains `</script`, which would close the host script block".into(),
            ));
        }
        Ok(format!("{HOST_DOCUMENT_HEAD}{source}{HOST_DOCUMENT_TAIL}"))
    }
}

impl Default for TranspileEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for TranspileEngine {
    fn language_id(&self) -> &'static str {
        "typescript"
    }

    fn run(&self, source: &str, sink: &mut dyn OutputSink) {
        match Self::document(source) {
            Ok(document) => sink.markup(Viewport::new(document, TRANSPILE_HEIGHT)),
            Err(err) => sink.fault(FaultReport::from(err)),
        }
    }

    fn list_examples(&self) -> Vec<ExampleRef> {
        self.catalog.list()
    }
}

fn embeddable(document: &str) -> Result<(), EngineError> {
    if document.contains('\0') {
        return Err(EngineError::Render(
            "document contains a NUL character".into(),
        ));
    }
    Ok(())
}

const HOST_DOCUMENT_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>React TypeScript App</title>
    <script crossorigin src="https://unpkg.com/react@18/umd/react.production.min.js"></script>
    <script crossorigin src="https://unpkg.com/react-dom@18/umd/react-dom.production.min.js"></script>
    <script src="https://unpkg.com/@babel/standalone/babel.min.js"></script>
    <style>
        body {
            margin: 0;
            padding: 20px;
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Roboto', 'Oxygen',
                'Ubuntu', 'Cantarell', 'Fira Sans', 'Droid Sans', 'Helvetica Neue',
                sans-serif;
            -webkit-font-smoothing: antialiased;
            -moz-osx-font-smoothing: grayscale;
        }
        #root {
            max-width: 100%;
        }
    </style>
</head>
<body>
    <div id="root"></div>
    <script type="text/babel" data-type="module">
"#;

const HOST_DOCUMENT_TAIL: &str = r#"
    </script>
</body>
</html>
"#;
