//! The write-only output surface engines render into.

use std::fmt;

use serde::Serialize;

use crate::{diagnostics::Location, error::EngineError};

/// Destination for everything a run produces. Engines write to it during
/// `run` and never keep it afterwards.
pub trait OutputSink {
    /// A rendered markup document for an isolated viewport.
    fn markup(&mut self, viewport: Viewport);
    /// A raw block of captured text.
    fn console(&mut self, text: &str);
    /// A collapsible panel with a title.
    fn panel(&mut self, title: &str, body: &str);
    /// An element emitted by the `ui` binding.
    fn widget(&mut self, widget: Widget);
    fn fault(&mut self, report: FaultReport);
}

/// A markup document plus the viewport it is shown in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub document: String,
    pub height: u32,
    pub scrolling: bool,
}

impl Viewport {
    pub fn new(document: impl Into<String>, height: u32) -> Self {
        Self {
            document: document.into(),
            height,
            scrolling: true,
        }
    }

    /// The document embedded as a sandboxed `srcdoc` frame.
    pub fn iframe(&self) -> String {
        format!(
            "<iframe sandbox=\"allow-scripts\" style=\"width: 100%; height: {}px; border: 0;\" scrolling=\"{}\" srcdoc=\"{}\"></iframe>",
            self.height,
            if self.scrolling { "yes" } else { "no" },
            escape_attribute(&self.document)
        )
    }
}

fn escape_attribute(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Success => "success",
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
        }
    }
}

/// Elements a host-augmented snippet can place on the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Widget {
    Title {
        text: String,
    },
    Header {
        text: String,
    },
    Subheader {
        text: String,
    },
    Markdown {
        text: String,
    },
    Text {
        text: String,
    },
    Caption {
        text: String,
    },
    Code {
        source: String,
        language: Option<String>,
    },
    Json {
        value: serde_json::Value,
    },
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Metric {
        label: String,
        value: String,
        delta: Option<String>,
    },
    Divider,
    Alert {
        level: AlertLevel,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Syntax,
    ForbiddenCapability,
    Runtime,
    Render,
}

/// Sink-visible form of an [`EngineError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultReport {
    pub kind: FaultKind,
    pub message: String,
    pub location: Option<Location>,
}

impl From<EngineError> for FaultReport {
    fn from(err: EngineError) -> Self {
        Self {
            kind: err.kind(),
            location: err.location(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum Block {
    Markup(Viewport),
    Console { text: String },
    Panel { title: String, body: String },
    Widget { widget: Widget },
    Fault(FaultReport),
}

/// Sink that records every call in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transcript {
    pub blocks: Vec<Block>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn faults(&self) -> impl Iterator<Item = &FaultReport> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Fault(report) => Some(report),
            _ => None,
        })
    }

    /// Concatenated text of every console block.
    pub fn console_text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                Block::Console { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn widgets(&self) -> impl Iterator<Item = &Widget> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Widget { widget } => Some(widget),
            _ => None,
        })
    }
}

impl OutputSink for Transcript {
    fn markup(&mut self, viewport: Viewport) {
        self.blocks.push(Block::Markup(viewport));
    }

    fn console(&mut self, text: &str) {
        self.blocks.push(Block::Console {
            text: text.to_string(),
        });
    }

    fn panel(&mut self, title: &str, body: &str) {
        self.blocks.push(Block::Panel {
            title: title.to_string(),
            body: body.to_string(),
        });
    }

    fn widget(&mut self, widget: Widget) {
        self.blocks.push(Block::Widget { widget });
    }

    fn fault(&mut self, report: FaultReport) {
        self.blocks.push(Block::Fault(report));
    }
}
