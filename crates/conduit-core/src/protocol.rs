//! Wire message types
//!
//! Workers speak JSON-RPC 2.0, one message per line. Streaming results use two
//! reserved notifications (see [`methods`]) correlated by the request id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version
pub const JSONRPC_VERSION: &str = "2.0";

/// Any message crossing the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// Request message
    Request(Request),
    /// Response message
    Response(Response),
    /// Notification message (no id)
    Notification(Notification),
}

/// Request ID (can be string or number)
///
/// Calls issued by this crate always use numbers; strings are accepted so a
/// worker echoing an id it did not understand is still parsed and reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Number ID
    Number(u64),
    /// String ID
    String(String),
}

impl RequestId {
    /// The numeric correlation id, if this is one
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.parse().ok(),
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

/// JSON-RPC request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Request ID
    pub id: RequestId,
    /// Method name
    pub method: String,
    /// Optional parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Create a new request
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    /// Add parameters to the request
    pub fn with_params(mut self, params: Option<Value>) -> Self {
        self.params = params;
        self
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Request ID this response corresponds to
    pub id: RequestId,
    /// Result (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// Create an error response
    pub fn error(id: impl Into<RequestId>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// Get the result, consuming the response
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Create a new error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Add data to the error
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Method not found (-32601)
    pub fn method_not_found() -> Self {
        Self::new(-32601, "Method not found")
    }
}

impl From<RpcError> for crate::error::ConduitError {
    fn from(err: RpcError) -> Self {
        Self::Remote {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// JSON-RPC notification (no id, no response expected)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Optional parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    /// Create a new notification
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: None,
        }
    }

    /// Add parameters
    pub fn with_params(mut self, params: Option<Value>) -> Self {
        self.params = params;
        self
    }
}

/// Payload of a [`methods::NEXT`] notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamItem {
    /// Id of the stream request this value belongs to
    pub id: RequestId,
    /// The streamed value
    #[serde(default)]
    pub value: Value,
}

/// Payload of a [`methods::CANCEL`] notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamCancel {
    /// Id of the stream request being abandoned
    pub id: RequestId,
}

/// Reserved method names
pub mod methods {
    /// Worker → client: one intermediate value of a stream call
    pub const NEXT: &str = "$/next";
    /// Client → worker: the caller dropped a live subscription
    pub const CANCEL: &str = "$/cancel";
}

/// Build the on-the-wire method name for a service method
pub fn wire_method(service: &str, method: &str) -> String {
    format!("{}/{}", service, method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = Request::new(1u64, "Hover/hover").with_params(Some(json!({"line": 3})));
        let json = serde_json::to_string(&req).unwrap();

        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"Hover/hover\""));
        assert!(json.contains("\"id\":1"));
    }

    #[test]
    fn test_notification_has_no_id() {
        let notif = Notification::new(methods::CANCEL).with_params(Some(json!({"id": 7})));
        let value = serde_json::to_value(&notif).unwrap();

        assert_eq!(value["method"], "$/cancel");
        assert!(value.get("id").is_none());
        assert_eq!(value["params"]["id"], 7);
    }

    #[test]
    fn test_parse_message_shapes() {
        let msg: Message =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"Hover/hover"}"#).unwrap();
        assert!(matches!(msg, Message::Request(req) if req.method == "Hover/hover"));

        let msg: Message = serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert!(matches!(msg, Message::Response(res) if res.id == RequestId::Number(1)));

        let msg: Message =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"$/next","params":{"id":2,"value":5}}"#)
                .unwrap();
        assert!(matches!(msg, Message::Notification(n) if n.method == methods::NEXT));
    }

    #[test]
    fn test_error_response_into_result() {
        let res = Response::error(3u64, RpcError::method_not_found().with_data(json!("Foo/bar")));
        assert!(res.error.is_some());

        let err = res.into_result().unwrap_err();
        assert_eq!(err.code, -32601);
        assert_eq!(err.data, Some(json!("Foo/bar")));
    }

    #[test]
    fn test_request_id_as_u64() {
        assert_eq!(RequestId::Number(9).as_u64(), Some(9));
        assert_eq!(RequestId::from("12").as_u64(), Some(12));
        assert_eq!(RequestId::from("req-1").as_u64(), None);
    }

    #[test]
    fn test_wire_method() {
        assert_eq!(wire_method("Hack", "getDefinition"), "Hack/getDefinition");
    }
}
