//! Execution of issued calls.
//!
//! The [`Executor`] trait is the seam to whatever actually performs tools and
//! actions. [`FunctionTable`] is an in-process implementation dispatching calls
//! to registered handlers by name, and [`correlate`] re-aligns a batch of
//! results with the calls that produced it.

use crate::call::{ToolCall, ToolResult};
use crate::error::{Error, Result};
use crate::registry::{Provenance, SchemaSet};
use crate::{JsonValue, Map};
use indexmap::IndexMap;
use std::fmt;

/// Performs a batch of calls.
///
/// Implementations may run the calls in any order, but must return one result
/// per call. Results need not be in submission order.
pub trait Executor {
    /// Executes every call of the batch.
    fn execute(&self, calls: &[ToolCall]) -> Result<Vec<ToolResult>>;
}

impl<E: Executor + ?Sized> Executor for &E {
    #[inline]
    fn execute(&self, calls: &[ToolCall]) -> Result<Vec<ToolResult>> {
        (**self).execute(calls)
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    #[inline]
    fn execute(&self, calls: &[ToolCall]) -> Result<Vec<ToolResult>> {
        (**self).execute(calls)
    }
}

/// A boxed handler for one function.
pub type BoxedFunction = Box<dyn Fn(&Map) -> Result<JsonValue> + Send + Sync>;

struct Handler {
    provenance: Provenance,
    function: BoxedFunction,
}

/// Executor dispatching calls to handlers registered by name.
#[derive(Default)]
pub struct FunctionTable {
    handlers: IndexMap<String, Handler>,
}

impl FunctionTable {
    /// Creates an empty table.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a read-only tool.
    pub fn register_tool<F>(&mut self, name: &str, function: F) -> Result<()>
    where
        F: Fn(&Map) -> Result<JsonValue> + Send + Sync + 'static,
    {
        self.register(name, Provenance::Tool, Box::new(function))
    }

    /// Registers a state-mutating action.
    pub fn register_action<F>(&mut self, name: &str, function: F) -> Result<()>
    where
        F: Fn(&Map) -> Result<JsonValue> + Send + Sync + 'static,
    {
        self.register(name, Provenance::Action, Box::new(function))
    }

    fn register(
        &mut self,
        name: &str,
        provenance: Provenance,
        function: BoxedFunction,
    ) -> Result<()> {
        if self.handlers.contains_key(name) {
            return Err(Error::DuplicateFunction(name.to_owned()));
        }
        self.handlers.insert(
            name.to_owned(),
            Handler {
                provenance,
                function,
            },
        );
        Ok(())
    }

    /// Returns `true` if a handler is registered for `name`.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Returns the registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl Executor for FunctionTable {
    fn execute(&self, calls: &[ToolCall]) -> Result<Vec<ToolResult>> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let handler = self
                .handlers
                .get(&call.name)
                .ok_or_else(|| Error::Execution(format!("function `{}` is not found", call.name)))?;
            let output = (handler.function)(&call.arguments)?;
            let result = ToolResult::new(call.name.clone(), call.arguments.clone(), output);
            results.push(if handler.provenance.is_action() {
                result.into_action()
            } else {
                result
            });
        }
        Ok(results)
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTable")
            .field("functions", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Aligns `results` with `calls`, returning one result per call in call order.
///
/// A result matches a call when both name and arguments are equal; otherwise
/// the first unused result with the same name is taken. Provenance is taken
/// from `schemas` whenever the name is known there.
pub fn correlate(
    calls: &[ToolCall],
    results: Vec<ToolResult>,
    schemas: &SchemaSet,
) -> Result<Vec<ToolResult>> {
    let mut pending = results.into_iter().map(Some).collect::<Vec<_>>();
    let mut aligned = Vec::with_capacity(calls.len());
    for (index, call) in calls.iter().enumerate() {
        let position = pending
            .iter()
            .position(|result| {
                result
                    .as_ref()
                    .is_some_and(|r| r.name == call.name && r.arguments == call.arguments)
            })
            .or_else(|| {
                pending
                    .iter()
                    .position(|result| result.as_ref().is_some_and(|r| r.name == call.name))
            });
        let Some(mut result) = position.and_then(|position| pending[position].take()) else {
            return Err(Error::MissingResult {
                index,
                name: call.name.clone(),
            });
        };
        if let Some(provenance) = schemas.provenance(&result.name) {
            result.is_action = provenance.is_action();
        }
        aligned.push(result);
    }

    let extra = pending.iter().flatten().count();
    if extra > 0 {
        tracing::warn!(extra, "executor returned results for calls never submitted");
    }
    Ok(aligned)
}
