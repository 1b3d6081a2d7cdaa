//! Tool contracts and the per-process tool registry.
//!
//! A tool is a type implementing [`Tool`]: its parameter and output types are
//! fixed at compile time, and its schemas are explicit values. Registration
//! erases the types behind [`ToolHandler`] so the dispatcher can hold tools of
//! different shapes in one ordered map.
//!
//! The registry is built once through [`ToolRegistryBuilder`] and is read-only
//! afterwards.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ToolError;
use crate::mcp::protocol::ErrorCode;

/// A callable operation exposed by a worker.
pub trait Tool: Send + Sync + 'static {
    /// Validated argument type.
    type Params: DeserializeOwned;
    /// Structured result type.
    type Output: Serialize;

    /// Fully qualified, dotted name (e.g. `document.extract_text`).
    const NAME: &'static str;
    /// Description shown to the model.
    const DESCRIPTION: &'static str;
    /// Whether the host must obtain user approval before running the tool.
    const REQUIRES_CONFIRMATION: bool = false;
    /// Whether a prior invocation can be reversed.
    const SUPPORTS_UNDO: bool = false;

    /// JSON Schema for [`Self::Params`].
    fn params_schema() -> Value;

    /// JSON Schema for [`Self::Output`].
    fn result_schema() -> Value;

    /// Runs the tool with validated parameters.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] describing why the tool could not complete.
    fn execute(&self, params: Self::Params) -> Result<Self::Output, ToolError>;
}

/// Static description of one tool, as advertised in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolContract {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub params_schema: Value,
    /// JSON Schema for the tool's result.
    pub returns_schema: Value,
    /// The tool mutates external state and needs user approval.
    #[serde(rename = "confirmation_required")]
    pub requires_confirmation: bool,
    /// The tool's effect can be reversed.
    #[serde(rename = "undo_supported")]
    pub supports_undo: bool,
}

impl ToolContract {
    /// Builds the contract for a tool type.
    #[must_use]
    pub fn of<T: Tool>() -> Self {
        Self {
            name: T::NAME.to_string(),
            description: T::DESCRIPTION.to_string(),
            params_schema: T::params_schema(),
            returns_schema: T::result_schema(),
            requires_confirmation: T::REQUIRES_CONFIRMATION,
            supports_undo: T::SUPPORTS_UNDO,
        }
    }
}

/// What happened when a handler was invoked.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// The tool produced a result.
    Success(Value),
    /// The arguments did not match the parameter schema.
    ValidationFailed(String),
    /// The tool reported a domain failure.
    ToolError {
        /// Protocol error code chosen by the tool.
        code: ErrorCode,
        /// Message chosen by the tool.
        message: String,
    },
    /// Something the tool did not anticipate went wrong.
    UnexpectedFailure(String),
}

/// Type-erased tool entry point.
pub trait ToolHandler: Send + Sync {
    /// Validates `arguments` and runs the tool.
    fn invoke(&self, arguments: Map<String, Value>) -> InvocationOutcome;
}

struct TypedHandler<T>(T);

impl<T: Tool> ToolHandler for TypedHandler<T> {
    fn invoke(&self, arguments: Map<String, Value>) -> InvocationOutcome {
        let params: T::Params = match serde_json::from_value(Value::Object(arguments)) {
            Ok(params) => params,
            Err(e) => return InvocationOutcome::ValidationFailed(e.to_string()),
        };

        match self.0.execute(params) {
            Ok(output) => match serde_json::to_value(output) {
                Ok(value) => InvocationOutcome::Success(value),
                Err(e) => InvocationOutcome::UnexpectedFailure(format!(
                    "failed to serialise result: {e}"
                )),
            },
            Err(ToolError::Domain { code, message }) => {
                InvocationOutcome::ToolError { code, message }
            }
            Err(ToolError::Internal(message)) => InvocationOutcome::UnexpectedFailure(message),
        }
    }
}

/// Errors raised while building a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two tools share a name.
    #[error("duplicate tool name: {0}")]
    DuplicateName(String),
}

struct RegisteredTool {
    contract: ToolContract,
    handler: Arc<dyn ToolHandler>,
}

/// Ordered, immutable mapping from tool name to contract and handler.
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Looks up the handler for a tool.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).map(|t| Arc::clone(&t.handler))
    }

    /// Looks up the contract for a tool.
    #[must_use]
    pub fn contract(&self, name: &str) -> Option<&ToolContract> {
        self.tools.get(name).map(|t| &t.contract)
    }

    /// Returns every contract, in registration order.
    #[must_use]
    pub fn manifest(&self) -> Vec<&ToolContract> {
        self.tools.values().map(|t| &t.contract).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects tools before freezing them into a [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistryBuilder {
    /// Adds a tool.
    #[must_use]
    pub fn tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(RegisteredTool {
            contract: ToolContract::of::<T>(),
            handler: Arc::new(TypedHandler(tool)),
        });
        self
    }

    /// Freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if two tools share a name.
    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut tools = IndexMap::with_capacity(self.tools.len());
        for tool in self.tools {
            let name = tool.contract.name.clone();
            if tools.contains_key(&name) {
                return Err(RegistryError::DuplicateName(name));
            }
            tools.insert(name, tool);
        }
        Ok(ToolRegistry { tools })
    }
}
