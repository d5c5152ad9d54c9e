//! JSON-RPC 2.0 framing
//!
//! One WebSocket text frame carries one JSON document: a request, a
//! response, or a server-initiated event (a method call without an id).

use selkie_core::{Error, GATEWAY_FRAME_SIZE_BYTES_MAX};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC error codes used by the gateway
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const UNAUTHORIZED: i64 = -32001;
}

/// An incoming request frame
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    /// Parse and validate one text frame
    pub fn parse(frame: &str) -> Result<Self, Error> {
        if frame.len() > GATEWAY_FRAME_SIZE_BYTES_MAX {
            return Err(Error::FrameTooLarge {
                size: frame.len(),
                limit: GATEWAY_FRAME_SIZE_BYTES_MAX,
            });
        }

        let request: RpcRequest =
            serde_json::from_str(frame).map_err(|e| Error::MalformedFrame {
                reason: e.to_string(),
            })?;

        if request.jsonrpc != "2.0" {
            return Err(Error::MalformedFrame {
                reason: format!("unsupported jsonrpc version: {}", request.jsonrpc),
            });
        }
        if !(request.id.is_string() || request.id.is_number()) {
            return Err(Error::MalformedFrame {
                reason: "id must be a string or number".to_string(),
            });
        }

        Ok(request)
    }

    /// String parameter accessor
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(|v| v.as_str())
    }

    /// Integer parameter accessor
    pub fn param_u64(&self, name: &str) -> Option<u64> {
        self.params.get(name).and_then(|v| v.as_u64())
    }
}

/// An outgoing frame: response, error, or event
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RpcFrame(Value);

impl RpcFrame {
    /// Successful response
    pub fn result(id: &Value, result: Value) -> Self {
        Self(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        }))
    }

    /// Error response; a null id is used when the request id is unknown
    pub fn error(id: &Value, code: i64, message: impl Into<String>) -> Self {
        Self(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": code, "message": message.into()},
        }))
    }

    /// Error response derived from a core error, sanitized
    pub fn from_error(id: &Value, error: &Error) -> Self {
        Self::error(id, error.rpc_code(), error.sanitized_message())
    }

    /// Server-initiated event
    pub fn event(event_type: &str, mut params: Value) -> Self {
        if let Some(object) = params.as_object_mut() {
            object.insert("type".to_string(), Value::String(event_type.to_string()));
        }
        Self(serde_json::json!({
            "jsonrpc": "2.0",
            "method": "event",
            "params": params,
        }))
    }

    /// Serialize to the wire
    pub fn to_text(&self) -> String {
        self.0.to_string()
    }

    /// The inner JSON value
    pub fn value(&self) -> &Value {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_request() {
        let request =
            RpcRequest::parse(r#"{"jsonrpc":"2.0","id":"h","method":"health","params":{}}"#)
                .unwrap();
        assert_eq!(request.method, "health");
        assert_eq!(request.id, Value::String("h".to_string()));
    }

    #[test]
    fn test_parse_numeric_id() {
        let request =
            RpcRequest::parse(r#"{"jsonrpc":"2.0","id":7,"method":"health"}"#).unwrap();
        assert_eq!(request.id, serde_json::json!(7));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            RpcRequest::parse("{not json"),
            Err(Error::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_version() {
        assert!(RpcRequest::parse(r#"{"jsonrpc":"1.0","id":1,"method":"health"}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_missing_id() {
        assert!(RpcRequest::parse(r#"{"jsonrpc":"2.0","method":"health"}"#).is_err());
        assert!(RpcRequest::parse(r#"{"jsonrpc":"2.0","id":null,"method":"health"}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_oversized_frame() {
        let huge = format!(
            r#"{{"jsonrpc":"2.0","id":1,"method":"x","params":{{"pad":"{}"}}}}"#,
            "a".repeat(GATEWAY_FRAME_SIZE_BYTES_MAX)
        );
        assert!(matches!(
            RpcRequest::parse(&huge),
            Err(Error::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_result_frame_shape() {
        let frame = RpcFrame::result(&serde_json::json!("h"), serde_json::json!({"ok": true}));
        let value = frame.value();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], "h");
        assert_eq!(value["result"]["ok"], true);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_error_frame_shape() {
        let frame = RpcFrame::error(&serde_json::json!(1), codes::UNAUTHORIZED, "Unauthorized");
        let value = frame.value();
        assert_eq!(value["error"]["code"], -32001);
        assert_eq!(value["error"]["message"], "Unauthorized");
    }

    #[test]
    fn test_event_frame_shape() {
        let frame = RpcFrame::event("chat.delta", serde_json::json!({"delta": "hi"}));
        let value = frame.value();
        assert_eq!(value["method"], "event");
        assert_eq!(value["params"]["type"], "chat.delta");
        assert_eq!(value["params"]["delta"], "hi");
        assert!(value.get("id").is_none(), "events carry no id");
    }
}
