//! The closed set of engines a host can offer.

use std::{fmt, str::FromStr};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    engine::Engine,
    engines::{HostEngine, MarkupEngine, ScriptEngine, TranspileEngine},
};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum EngineLabel {
    #[default]
    Narcissus,
    NarcissusUi,
    Html,
    React,
}

impl EngineLabel {
    pub const ALL: [EngineLabel; 4] = [
        EngineLabel::Narcissus,
        EngineLabel::NarcissusUi,
        EngineLabel::Html,
        EngineLabel::React,
    ];

    /// The human-facing label shown in an engine picker.
    pub fn label(&self) -> &'static str {
        match self {
            EngineLabel::Narcissus => "Narcissus",
            EngineLabel::NarcissusUi => "Narcissus UI",
            EngineLabel::Html => "HTML/CSS/JavaScript",
            EngineLabel::React => "React (TypeScript)",
        }
    }

    /// The kebab-case name accepted on the command line and in settings.
    pub fn name(&self) -> &'static str {
        match self {
            EngineLabel::Narcissus => "narcissus",
            EngineLabel::NarcissusUi => "narcissus-ui",
            EngineLabel::Html => "html",
            EngineLabel::React => "react",
        }
    }

    pub fn constructor(&self) -> fn() -> Box<dyn Engine> {
        match self {
            EngineLabel::Narcissus => || Box::new(ScriptEngine::new()),
            EngineLabel::NarcissusUi => || Box::new(HostEngine::new()),
            EngineLabel::Html => || Box::new(MarkupEngine::new()),
            EngineLabel::React => || Box::new(TranspileEngine::new()),
        }
    }

    pub fn build(&self) -> Box<dyn Engine> {
        (self.constructor())()
    }
}

impl fmt::Display for EngineLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown engine `{0}` (expected one of: narcissus, narcissus-ui, html, react)")]
pub struct UnknownEngine(pub String);

impl FromStr for EngineLabel {
    type Err = UnknownEngine;

    /// Accepts the kebab-case name or the display label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EngineLabel::ALL
            .into_iter()
            .find(|label| label.name() == s || label.label() == s)
            .ok_or_else(|| UnknownEngine(s.to_string()))
    }
}
