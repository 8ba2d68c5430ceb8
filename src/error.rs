use thiserror::Error;

use crate::{
    diagnostics::{Diagnostic, Location, NarcissusError},
    sink::FaultKind,
};

/// Reason a snippet was rejected, failed, or could not be embedded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Syntax error: {message} ({location})")]
    Syntax { message: String, location: Location },
    /// The message never names the module that triggered the rejection.
    #[error("Blocked: forbidden capability import.")]
    ForbiddenCapability,
    #[error("Runtime error: {message}{}", at(.location))]
    Runtime {
        message: String,
        location: Option<Location>,
    },
    #[error("Render error: {0}")]
    Render(String),
}

fn at(location: &Option<Location>) -> String {
    location
        .map(|location| format!(" ({location})"))
        .unwrap_or_default()
}

impl EngineError {
    /// Wraps a parse failure, resolving its span against `source`.
    pub fn syntax(diagnostic: &Diagnostic, source: &str) -> Self {
        EngineError::Syntax {
            message: diagnostic.message.clone(),
            location: diagnostic.located(source),
        }
    }

    pub fn runtime(err: &NarcissusError, source: &str) -> Self {
        match err {
            NarcissusError::Diagnostic(diagnostic) => EngineError::Runtime {
                message: diagnostic.describe(),
                location: diagnostic.span.map(|span| span.location(source)),
            },
            NarcissusError::Io(io) => EngineError::Runtime {
                message: io.to_string(),
                location: None,
            },
        }
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            EngineError::Syntax { .. } => FaultKind::Syntax,
            EngineError::ForbiddenCapability => FaultKind::ForbiddenCapability,
            EngineError::Runtime { .. } => FaultKind::Runtime,
            EngineError::Render(_) => FaultKind::Render,
        }
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            EngineError::Syntax { location, .. } => Some(*location),
            EngineError::Runtime { location, .. } => *location,
            EngineError::ForbiddenCapability | EngineError::Render(_) => None,
        }
    }
}
