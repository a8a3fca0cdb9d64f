#![doc = include_str!("../README.md")]

pub mod call;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod evaluation;
pub mod executor;
pub mod format;
pub mod generator;
pub mod json;
pub mod lint;
pub mod orchestrator;
pub mod prompt;
pub mod registry;
pub mod schema;

#[doc(no_inline)]
pub use serde_json::json;

pub use call::{ToolCall, ToolResult};
pub use config::Config;
pub use error::{Error, Result};
pub use executor::{Executor, FunctionTable};
pub use generator::{ExclusiveGenerator, GenerationRequest, Generator, Profile};
pub use orchestrator::{DialogueOrchestrator, TurnInput, TurnOutcome};
pub use registry::{Registry, SchemaSet};
pub use schema::FunctionSchema;

/// A JSON value.
pub type JsonValue = serde_json::Value;

/// A JSON key-value type.
pub type Map = serde_json::Map<String, JsonValue>;
