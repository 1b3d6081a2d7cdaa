//! JSON-RPC 2.0 message codec for the worker protocol.
//!
//! Every frame is one JSON object on one line. This module turns an input line
//! into a [`JsonRpcRequest`] and a [`JsonRpcResponse`] back into a line.
//!
//! # Constraints
//!
//! - Request IDs must be strings or integers (never `null`)
//! - Every request carries an ID; there are no notifications in this protocol
//! - `params`, when present, must be an object
//! - A response carries exactly one of `result` or `error`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// The only JSON-RPC version accepted on the wire.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC 2.0 request ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(i64),
    /// String request ID.
    String(String),
}

impl RequestId {
    /// The ID used when none could be recovered from the input line.
    #[must_use]
    pub const fn unknown() -> Self {
        Self::Number(0)
    }

    /// Recovers an ID from a raw JSON value, if it has an acceptable type.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Number),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// A decoded JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Must be "2.0".
    pub jsonrpc: String,

    /// Request identifier, echoed verbatim in the response.
    pub id: RequestId,

    /// The method to invoke.
    pub method: String,

    /// Optional named parameters.
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
}

impl JsonRpcRequest {
    /// Validates that this is a well-formed JSON-RPC 2.0 request.
    ///
    /// Returns an error message if validation fails.
    #[must_use]
    pub fn validate(&self) -> Option<&'static str> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Some("jsonrpc field must be \"2.0\"");
        }
        if self.method.is_empty() {
            return Some("method field cannot be empty");
        }
        None
    }

    /// Returns a single named parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.as_ref().and_then(|p| p.get(key))
    }
}

/// JSON-RPC 2.0 error codes, including the worker's domain extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid Request object.
    InvalidRequest,
    /// The method (or tool) does not exist.
    MethodNotFound,
    /// Arguments failed schema validation.
    InvalidParams,
    /// Uncaught failure inside a handler.
    InternalError,
    /// Path outside the permitted roots.
    SandboxViolation,
    /// Mutation needs user approval.
    ConfirmationRequired,
    /// Referenced path does not exist.
    FileNotFound,
    /// Access denied.
    PermissionDenied,
    /// Any other server-defined code.
    ServerError(i32),
}

impl ErrorCode {
    /// Returns the numeric code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::SandboxViolation => -32001,
            Self::ConfirmationRequired => -32002,
            Self::FileNotFound => -32003,
            Self::PermissionDenied => -32004,
            Self::ServerError(code) => code,
        }
    }

    /// Maps a numeric code back to its named variant.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            -32001 => Self::SandboxViolation,
            -32002 => Self::ConfirmationRequired,
            -32003 => Self::FileNotFound,
            -32004 => Self::PermissionDenied,
            other => Self::ServerError(other),
        }
    }

    /// Returns the default message for this error code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::SandboxViolation => "Sandbox violation",
            Self::ConfirmationRequired => "Confirmation required",
            Self::FileNotFound => "File not found",
            Self::PermissionDenied => "Permission denied",
            Self::ServerError(_) => "Server error",
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcErrorData {
    /// The error code.
    pub code: i32,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorData {
    /// Creates a new error from an error code.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.default_message().to_string(),
            data: None,
        }
    }

    /// Creates a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Adds additional data to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The body of a response: exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseBody {
    /// Successful outcome.
    Result(Value),
    /// Failed outcome.
    Error(JsonRpcErrorData),
}

/// A JSON-RPC 2.0 response frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this response corresponds to.
    pub id: RequestId,

    /// Either the result or the error.
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl JsonRpcResponse {
    /// Creates a new success response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Value is not const-compatible
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            body: ResponseBody::Result(result),
        }
    }

    /// Creates a new error response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // JsonRpcErrorData contains String
    pub fn error(id: RequestId, error: JsonRpcErrorData) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            body: ResponseBody::Error(error),
        }
    }

    /// Creates a parse error response (ID cannot be determined).
    #[must_use]
    pub fn parse_error() -> Self {
        Self::error(
            RequestId::unknown(),
            JsonRpcErrorData::with_message(ErrorCode::ParseError, "Invalid JSON"),
        )
    }

    /// Creates an invalid request error response.
    #[must_use]
    pub fn invalid_request(id: Option<RequestId>, reason: &str) -> Self {
        Self::error(
            id.unwrap_or_else(RequestId::unknown),
            JsonRpcErrorData::with_message(
                ErrorCode::InvalidRequest,
                format!("Invalid request: {reason}"),
            ),
        )
    }

    /// Creates a method not found error response.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::error(
            id,
            JsonRpcErrorData::with_message(
                ErrorCode::MethodNotFound,
                format!("Unknown method: {method}"),
            ),
        )
    }

    /// Creates an invalid params error response.
    #[must_use]
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::error(
            id,
            JsonRpcErrorData::with_message(ErrorCode::InvalidParams, message),
        )
    }

    /// Creates an internal error response.
    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self::error(
            id,
            JsonRpcErrorData::with_message(ErrorCode::InternalError, message),
        )
    }

    /// Returns the result value, if this is a success.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Result(value) => Some(value),
            ResponseBody::Error(_) => None,
        }
    }

    /// Returns the error object, if this is a failure.
    #[must_use]
    pub const fn error_data(&self) -> Option<&JsonRpcErrorData> {
        match &self.body {
            ResponseBody::Result(_) => None,
            ResponseBody::Error(error) => Some(error),
        }
    }

    /// Serialises this response as a single line, without the terminator.
    ///
    /// Compact JSON escapes control characters inside strings, so the output
    /// never contains a raw newline.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, id = %self.id, "Failed to serialise response");
            let fallback = Self::internal_error(
                self.id.clone(),
                "Internal error: failed to serialise response",
            );
            serde_json::to_string(&fallback).unwrap_or_else(|_| {
                r#"{"jsonrpc":"2.0","id":0,"error":{"code":-32603,"message":"Internal error"}}"#
                    .to_string()
            })
        })
    }
}

/// Why an input line could not be turned into a request.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The line is not valid JSON.
    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    /// The line is JSON but not a valid JSON-RPC 2.0 request.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// The ID, when one could be recovered.
        id: Option<RequestId>,
        /// What was wrong with the request.
        reason: String,
    },
}

impl DecodeError {
    fn invalid(id: Option<RequestId>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            id,
            reason: reason.into(),
        }
    }

    /// Converts this failure into the response the transport should emit.
    #[must_use]
    pub fn into_response(self) -> JsonRpcResponse {
        match self {
            Self::Syntax(_) => JsonRpcResponse::parse_error(),
            Self::InvalidRequest { id, reason } => JsonRpcResponse::invalid_request(id, &reason),
        }
    }
}

/// Decodes one input line.
///
/// Returns `Ok(None)` for blank lines, which carry nothing to process.
///
/// # Errors
///
/// Returns [`DecodeError::Syntax`] if the line is not JSON, and
/// [`DecodeError::InvalidRequest`] if required fields are missing or mistyped.
pub fn decode(line: &str) -> Result<Option<JsonRpcRequest>, DecodeError> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line)?;

    let Some(obj) = value.as_object() else {
        return Err(DecodeError::invalid(None, "request must be a JSON object"));
    };

    let id = obj.get("id").and_then(RequestId::from_value);

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        _ => return Err(DecodeError::invalid(id, "jsonrpc field must be \"2.0\"")),
    }

    if id.is_none() {
        return Err(DecodeError::invalid(
            None,
            "id field must be a string or integer",
        ));
    }

    let request: JsonRpcRequest =
        serde_json::from_value(value).map_err(|e| DecodeError::invalid(id.clone(), e.to_string()))?;

    if let Some(reason) = request.validate() {
        return Err(DecodeError::invalid(Some(request.id), reason));
    }

    Ok(Some(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_ok(line: &str) -> JsonRpcRequest {
        decode(line).unwrap().expect("expected a request")
    }

    #[test]
    fn decode_valid_request() {
        let req = decode_ok(r#"{"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}"#);
        assert_eq!(req.id, RequestId::Number(1));
        assert_eq!(req.method, "initialize");
        assert!(req.params.unwrap().is_empty());
    }

    #[test]
    fn decode_string_id() {
        let req = decode_ok(r#"{"jsonrpc": "2.0", "id": "abc-123", "method": "ping"}"#);
        assert_eq!(req.id, RequestId::String("abc-123".to_string()));
        assert!(req.params.is_none());
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert!(decode("").unwrap().is_none());
        assert!(decode("   \t ").unwrap().is_none());
    }

    #[test]
    fn decode_invalid_json() {
        let err = decode("not valid json").unwrap_err();
        assert!(matches!(err, DecodeError::Syntax(_)));

        let response = err.into_response();
        assert_eq!(response.id, RequestId::Number(0));
        assert_eq!(
            response.error_data().unwrap().code,
            ErrorCode::ParseError.code()
        );
    }

    #[test]
    fn decode_missing_jsonrpc_keeps_id() {
        let err = decode(r#"{"id": 7, "method": "ping"}"#).unwrap_err();
        let response = err.into_response();
        assert_eq!(response.id, RequestId::Number(7));
        assert_eq!(
            response.error_data().unwrap().code,
            ErrorCode::InvalidRequest.code()
        );
    }

    #[test]
    fn decode_wrong_jsonrpc_version() {
        let err = decode(r#"{"jsonrpc": "1.0", "id": 1, "method": "ping"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidRequest { .. }));
    }

    #[test]
    fn decode_rejects_missing_or_null_id() {
        for line in [
            r#"{"jsonrpc": "2.0", "method": "ping"}"#,
            r#"{"jsonrpc": "2.0", "id": null, "method": "ping"}"#,
            r#"{"jsonrpc": "2.0", "id": 1.5, "method": "ping"}"#,
        ] {
            let response = decode(line).unwrap_err().into_response();
            assert_eq!(response.id, RequestId::unknown(), "line: {line}");
            assert_eq!(
                response.error_data().unwrap().code,
                ErrorCode::InvalidRequest.code()
            );
        }
    }

    #[test]
    fn decode_rejects_mistyped_method_and_params() {
        let err = decode(r#"{"jsonrpc": "2.0", "id": 3, "method": 42}"#).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidRequest { id: Some(RequestId::Number(3)), .. }
        ));

        let err = decode(r#"{"jsonrpc": "2.0", "id": 3, "method": "ping", "params": [1]}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidRequest { .. }));

        let err = decode(r#"{"jsonrpc": "2.0", "id": 3, "method": ""}"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidRequest { .. }));
    }

    #[test]
    fn decode_rejects_non_object() {
        let err = decode("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidRequest { id: None, .. }));
    }

    #[test]
    fn encode_success_has_result_only() {
        let line = JsonRpcResponse::success(RequestId::Number(1), json!({"ok": true})).encode();
        assert_eq!(line, r#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#);
    }

    #[test]
    fn encode_error_has_error_only() {
        let line = JsonRpcResponse::method_not_found(RequestId::String("x".into()), "nope").encode();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["id"], "x");
        assert_eq!(value["error"]["code"], -32601);
        assert!(value["error"].get("data").is_none());
        assert!(value["error"]["message"].as_str().unwrap().contains("nope"));
    }

    #[test]
    fn encode_error_with_data() {
        let error = JsonRpcErrorData::from_code(ErrorCode::InvalidParams)
            .with_data(json!({"field": "path"}));
        let line = JsonRpcResponse::error(RequestId::Number(2), error).encode();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["error"]["data"]["field"], "path");
    }

    #[test]
    fn encode_never_embeds_newlines() {
        let response = JsonRpcResponse::success(
            RequestId::Number(1),
            json!({"text": "line one\nline two\r\n", "nested": {"k": ["a\nb"]}}),
        );
        let line = response.encode();
        assert!(!line.contains('\n'));
        assert!(!line.contains('\r'));
    }

    #[test]
    fn error_codes_round_trip_through_numbers() {
        for code in [
            ErrorCode::ParseError,
            ErrorCode::InvalidRequest,
            ErrorCode::MethodNotFound,
            ErrorCode::InvalidParams,
            ErrorCode::InternalError,
            ErrorCode::SandboxViolation,
            ErrorCode::ConfirmationRequired,
            ErrorCode::FileNotFound,
            ErrorCode::PermissionDenied,
            ErrorCode::ServerError(-32050),
        ] {
            assert_eq!(ErrorCode::from_code(code.code()), code);
        }
    }

    #[test]
    fn request_id_display() {
        assert_eq!(format!("{}", RequestId::Number(42)), "42");
        assert_eq!(format!("{}", RequestId::String("abc".to_string())), "abc");
    }
}
