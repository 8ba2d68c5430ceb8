//! Polyglot snippet runner. Narcissus snippets are screened, executed in a
//! fresh environment with captured stdout, and presented through an output
//! sink; HTML and TSX snippets are embedded into isolated viewports.

pub mod ast;
pub mod capture;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod engines;
pub mod environment;
pub mod error;
pub mod fetch;
pub mod host;
mod http;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod runtime;
pub mod safety;
pub mod session;
pub mod sink;
pub mod stdlib;
pub mod value;

pub use diagnostics::{Diagnostic, DiagnosticKind, Location, NarcissusError, SourceSpan};
pub use engine::{Engine, ExampleCatalog, ExampleRef};
pub use engines::{HostEngine, MarkupEngine, ScriptEngine, TranspileEngine};
pub use error::EngineError;
pub use registry::EngineLabel;
pub use runtime::Interpreter;
pub use safety::Verdict;
pub use session::Session;
pub use sink::{Block, FaultKind, FaultReport, OutputSink, Transcript, Viewport, Widget};
