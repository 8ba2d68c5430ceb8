//! Host-side selection state: which engine is active and which example is
//! loaded. Engines themselves stay stateless.

use std::io;

use crate::{
    engine::{Engine, ExampleRef},
    registry::EngineLabel,
    sink::OutputSink,
};

pub struct Session {
    label: EngineLabel,
    engine: Box<dyn Engine>,
    selected: Option<ExampleRef>,
}

impl Session {
    pub fn new(label: EngineLabel) -> Self {
        Self::with_engine(label, label.build())
    }

    /// A session around an already-built engine, e.g. one with a custom
    /// example catalog.
    pub fn with_engine(label: EngineLabel, engine: Box<dyn Engine>) -> Self {
        Self {
            label,
            engine,
            selected: None,
        }
    }

    pub fn label(&self) -> EngineLabel {
        self.label
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Switches engines. The example selection belongs to the previous
    /// engine and is cleared.
    pub fn select_engine(&mut self, label: EngineLabel) {
        log::debug!("switching engine to {label}");
        self.label = label;
        self.engine = label.build();
        self.selected = None;
    }

    pub fn examples(&self) -> Vec<ExampleRef> {
        self.engine.list_examples()
    }

    /// Selects the example whose display name is `name`. Returns false, and
    /// keeps the current selection, when no example matches.
    pub fn select_example(&mut self, name: &str) -> bool {
        match self.examples().into_iter().find(|example| example.name == name) {
            Some(example) => {
                self.selected = Some(example);
                true
            }
            None => false,
        }
    }

    pub fn selected_example(&self) -> Option<&ExampleRef> {
        self.selected.as_ref()
    }

    /// Source of the selected example, or `None` when nothing is selected.
    pub fn load_selected(&self) -> Option<io::Result<String>> {
        self.selected.as_ref().map(ExampleRef::read)
    }

    pub fn run(&self, source: &str, sink: &mut dyn OutputSink) {
        self.engine.run(source, sink);
    }
}
