//! Method routing and outcome mapping.
//!
//! The dispatcher answers four methods:
//!
//! | method       | result                                          |
//! |--------------|-------------------------------------------------|
//! | `initialize` | `{server_info, tools, capabilities}`            |
//! | `tools/list` | `{tools}`                                       |
//! | `tools/call` | `{content: [{type: "text", text: <json>}]}`     |
//! | `ping`       | `{status: "ok"}`                                |
//!
//! Anything else is `METHOD_NOT_FOUND`. No state survives between requests.
//!
//! `tools/call` failures are mapped in this order: unknown tool
//! (`METHOD_NOT_FOUND`), argument validation (`INVALID_PARAMS`), domain error
//! (forwarded unchanged), anything else including a handler panic
//! (`INTERNAL_ERROR`).

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::mcp::protocol::{
    ErrorCode, JsonRpcErrorData, JsonRpcRequest, JsonRpcResponse, RequestId,
};
use crate::mcp::registry::{InvocationOutcome, ToolRegistry};

/// Server information reported by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Worker name (e.g. `document`).
    pub name: String,
    /// Worker version.
    pub version: String,
}

impl ServerInfo {
    /// Creates server info for the named worker at this crate's version.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Parameters for a `tools/call` request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call. A missing name matches no tool.
    #[serde(default)]
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

/// Content item in a tool call result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a successful tool call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
}

impl ToolCallResult {
    /// Wraps a structured tool result as a single text item.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: value.to_string(),
            }],
        }
    }
}

/// Routes requests to the registry and converts outcomes to responses.
#[derive(Debug)]
pub struct Dispatcher {
    info: ServerInfo,
    registry: Arc<ToolRegistry>,
    tool_timeout: Option<Duration>,
}

impl Dispatcher {
    /// Creates a dispatcher over a frozen registry.
    #[must_use]
    pub fn new(info: ServerInfo, registry: ToolRegistry) -> Self {
        Self {
            info,
            registry: Arc::new(registry),
            tool_timeout: None,
        }
    }

    /// Bounds each tool invocation by `timeout`.
    ///
    /// A handler that overruns is abandoned and keeps running on the blocking
    /// pool; the caller receives `INTERNAL_ERROR`.
    #[must_use]
    pub const fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Returns the server information.
    #[must_use]
    pub const fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Produces exactly one response for a request.
    pub async fn dispatch(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        debug!(id = %req.id, method = %req.method, "Dispatching request");

        match req.method.as_str() {
            "initialize" => self.handle_initialize(req.id),
            "tools/list" => self.handle_tools_list(req.id),
            "tools/call" => self.handle_tools_call(req).await,
            "ping" => Self::handle_ping(req.id),
            _ => {
                debug!(method = %req.method, "Unknown method");
                JsonRpcResponse::method_not_found(req.id, &req.method)
            }
        }
    }

    fn manifest(&self) -> Value {
        json!(self.registry.manifest())
    }

    /// Handles the initialize request.
    fn handle_initialize(&self, id: RequestId) -> JsonRpcResponse {
        info!(
            server = %self.info.name,
            tools = self.registry.len(),
            "Initialize requested"
        );

        JsonRpcResponse::success(
            id,
            json!({
                "server_info": self.info,
                "tools": self.manifest(),
                "capabilities": {},
            }),
        )
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "tools": self.manifest() }))
    }

    /// Handles the ping request.
    fn handle_ping(id: RequestId) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "status": "ok" }))
    }

    /// Handles the tools/call request.
    async fn handle_tools_call(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let JsonRpcRequest { id, params, .. } = req;

        let params: ToolCallParams =
            match serde_json::from_value(Value::Object(params.unwrap_or_default())) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::invalid_params(
                        id,
                        format!("Invalid tool call params: {e}"),
                    )
                }
            };

        let Some(handler) = self.registry.lookup(&params.name) else {
            debug!(tool = %params.name, "Unknown tool");
            return JsonRpcResponse::error(
                id,
                JsonRpcErrorData::with_message(
                    ErrorCode::MethodNotFound,
                    format!("Unknown tool: {}", params.name),
                ),
            );
        };

        let arguments = params.arguments.unwrap_or_default();
        let started = Instant::now();

        let task = tokio::task::spawn_blocking(move || handler.invoke(arguments));
        let joined = match self.tool_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(tool = %params.name, timeout_secs = limit.as_secs(), "Tool timed out");
                    return JsonRpcResponse::internal_error(
                        id,
                        format!(
                            "Internal error: tool '{}' timed out after {}s",
                            params.name,
                            limit.as_secs()
                        ),
                    );
                }
            },
            None => task.await,
        };

        let outcome = joined.unwrap_or_else(|e| {
            let message = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            InvocationOutcome::UnexpectedFailure(message)
        });

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            InvocationOutcome::Success(value) => {
                info!(tool = %params.name, elapsed_ms, "Tool call succeeded");
                match serde_json::to_value(ToolCallResult::from_value(&value)) {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(e) => JsonRpcResponse::internal_error(id, format!("Internal error: {e}")),
                }
            }
            InvocationOutcome::ValidationFailed(reason) => {
                debug!(tool = %params.name, %reason, "Tool arguments rejected");
                JsonRpcResponse::invalid_params(id, format!("Invalid parameters: {reason}"))
            }
            InvocationOutcome::ToolError { code, message } => {
                info!(tool = %params.name, code = code.code(), elapsed_ms, "Tool reported an error");
                JsonRpcResponse::error(id, JsonRpcErrorData::with_message(code, message))
            }
            InvocationOutcome::UnexpectedFailure(message) => {
                warn!(tool = %params.name, error = %message, elapsed_ms, "Tool failed unexpectedly");
                JsonRpcResponse::internal_error(id, format!("Internal error: {message}"))
            }
        }
    }
}

/// Extracts a printable message from a panic payload.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "tool panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::mcp::protocol::decode;
    use crate::mcp::registry::Tool;

    #[derive(Deserialize)]
    struct PathParams {
        path: String,
    }

    struct Stat;

    impl Tool for Stat {
        type Params = PathParams;
        type Output = Value;

        const NAME: &'static str = "test.stat";
        const DESCRIPTION: &'static str = "Behaves according to the path";

        fn params_schema() -> Value {
            json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"]
            })
        }

        fn result_schema() -> Value {
            json!({ "type": "object" })
        }

        fn execute(&self, params: PathParams) -> Result<Value, ToolError> {
            match params.path.as_str() {
                "denied" => Err(ToolError::sandbox_violation("outside the sandbox")),
                "broken" => Err(ToolError::internal("disk unreadable")),
                "panic" => panic!("handler exploded"),
                "slow" => {
                    std::thread::sleep(Duration::from_millis(300));
                    Ok(json!({}))
                }
                other => Ok(json!({ "path": other, "lines": ["a", "b"] })),
            }
        }
    }

    struct Other;

    impl Tool for Other {
        type Params = Map<String, Value>;
        type Output = bool;

        const NAME: &'static str = "test.other";
        const DESCRIPTION: &'static str = "Always true";

        fn params_schema() -> Value {
            json!({ "type": "object" })
        }

        fn result_schema() -> Value {
            json!({ "type": "boolean" })
        }

        fn execute(&self, _params: Self::Params) -> Result<bool, ToolError> {
            Ok(true)
        }
    }

    fn dispatcher() -> Dispatcher {
        let registry = ToolRegistry::builder()
            .tool(Stat)
            .tool(Other)
            .build()
            .unwrap();
        Dispatcher::new(ServerInfo::new("test"), registry)
    }

    async fn call(dispatcher: &Dispatcher, line: &str) -> JsonRpcResponse {
        let request = decode(line).unwrap().unwrap();
        dispatcher.dispatch(request).await
    }

    fn error_code(response: &JsonRpcResponse) -> i32 {
        response.error_data().expect("expected an error").code
    }

    #[tokio::test]
    async fn ping_echoes_id() {
        let d = dispatcher();
        let response = call(&d, r#"{"jsonrpc":"2.0","id":"p-1","method":"ping"}"#).await;
        assert_eq!(response.id, RequestId::String("p-1".to_string()));
        assert_eq!(response.result(), Some(&json!({"status": "ok"})));
    }

    #[tokio::test]
    async fn unknown_method() {
        let d = dispatcher();
        let response = call(&d, r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#).await;
        assert_eq!(error_code(&response), ErrorCode::MethodNotFound.code());
    }

    #[tokio::test]
    async fn initialize_lists_tools_in_order() {
        let d = dispatcher();
        let response = call(&d, r#"{"jsonrpc":"2.0","id":2,"method":"initialize"}"#).await;
        let result = response.result().unwrap();

        assert_eq!(result["server_info"]["name"], "test");
        assert_eq!(result["capabilities"], json!({}));
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "test.stat");
        assert_eq!(tools[1]["name"], "test.other");
    }

    #[tokio::test]
    async fn tools_list_is_stable() {
        let d = dispatcher();
        let line = r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#;
        let first = call(&d, line).await.encode();
        let second = call(&d, line).await.encode();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn tool_result_is_wrapped_as_text() {
        let d = dispatcher();
        let response = call(
            &d,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"test.stat","arguments":{"path":"/a"}}}"#,
        )
        .await;

        let result = response.result().unwrap();
        let content = result["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "text");
        let inner: Value = serde_json::from_str(content[0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(inner, json!({"path": "/a", "lines": ["a", "b"]}));
    }

    #[tokio::test]
    async fn missing_arguments_default_to_empty_object() {
        let d = dispatcher();
        let response = call(
            &d,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"test.other"}}"#,
        )
        .await;
        let text = response.result().unwrap()["content"][0]["text"].clone();
        assert_eq!(text, "true");
    }

    #[tokio::test]
    async fn unknown_tool_names_the_tool() {
        let d = dispatcher();
        let response = call(
            &d,
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"test.ghost","arguments":{}}}"#,
        )
        .await;
        assert_eq!(error_code(&response), ErrorCode::MethodNotFound.code());
        assert!(response.error_data().unwrap().message.contains("test.ghost"));
    }

    #[tokio::test]
    async fn missing_tool_name_is_an_unknown_tool() {
        let d = dispatcher();
        for line in [
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call"}"#,
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"arguments":{}}}"#,
        ] {
            let response = call(&d, line).await;
            assert_eq!(response.id, RequestId::Number(7));
            assert_eq!(error_code(&response), ErrorCode::MethodNotFound.code());
            assert_eq!(response.error_data().unwrap().message, "Unknown tool: ");
        }
    }

    #[tokio::test]
    async fn bad_arguments_are_invalid_params() {
        let d = dispatcher();
        for args in [r"{}", r#"{"path": 12}"#] {
            let line = format!(
                r#"{{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{{"name":"test.stat","arguments":{args}}}}}"#
            );
            let response = call(&d, &line).await;
            assert_eq!(error_code(&response), ErrorCode::InvalidParams.code());
            assert!(response
                .error_data()
                .unwrap()
                .message
                .starts_with("Invalid parameters:"));
        }
    }

    #[tokio::test]
    async fn non_object_arguments_are_invalid_params() {
        let d = dispatcher();
        let response = call(
            &d,
            r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"test.stat","arguments":["/a"]}}"#,
        )
        .await;
        assert_eq!(error_code(&response), ErrorCode::InvalidParams.code());
    }

    #[tokio::test]
    async fn domain_errors_pass_through() {
        let d = dispatcher();
        let response = call(
            &d,
            r#"{"jsonrpc":"2.0","id":10,"method":"tools/call","params":{"name":"test.stat","arguments":{"path":"denied"}}}"#,
        )
        .await;
        let error = response.error_data().unwrap();
        assert_eq!(error.code, ErrorCode::SandboxViolation.code());
        assert_eq!(error.message, "outside the sandbox");
    }

    #[tokio::test]
    async fn internal_errors_are_prefixed() {
        let d = dispatcher();
        let response = call(
            &d,
            r#"{"jsonrpc":"2.0","id":11,"method":"tools/call","params":{"name":"test.stat","arguments":{"path":"broken"}}}"#,
        )
        .await;
        let error = response.error_data().unwrap();
        assert_eq!(error.code, ErrorCode::InternalError.code());
        assert_eq!(error.message, "Internal error: disk unreadable");
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        let d = dispatcher();
        let response = call(
            &d,
            r#"{"jsonrpc":"2.0","id":12,"method":"tools/call","params":{"name":"test.stat","arguments":{"path":"panic"}}}"#,
        )
        .await;
        let error = response.error_data().unwrap();
        assert_eq!(error.code, ErrorCode::InternalError.code());
        assert!(error.message.contains("handler exploded"));

        // The dispatcher is still usable afterwards.
        let response = call(&d, r#"{"jsonrpc":"2.0","id":13,"method":"ping"}"#).await;
        assert!(response.result().is_some());
    }

    #[tokio::test]
    async fn timeout_is_reported_as_internal_error() {
        let d = dispatcher().with_tool_timeout(Some(Duration::from_millis(20)));
        let response = call(
            &d,
            r#"{"jsonrpc":"2.0","id":14,"method":"tools/call","params":{"name":"test.stat","arguments":{"path":"slow"}}}"#,
        )
        .await;
        let error = response.error_data().unwrap();
        assert_eq!(error.code, ErrorCode::InternalError.code());
        assert!(error.message.contains("timed out"));
    }
}
