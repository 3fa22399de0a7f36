//! JSON-RPC 2.0 message types, as used by MCP.
//!
//! Only the client side is modeled: outgoing requests and notifications,
//! incoming responses. See <https://www.jsonrpc.org/specification>.

use serde::{Deserialize, Serialize};

/// Request identifier. JSON-RPC allows String or Number; we hand out
/// numeric ids but accept either shape coming back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Number(u64),
    String(String),
}

/// An outgoing request
#[derive(Debug, Serialize)]
pub struct Request {
    jsonrpc: &'static str,
    pub id: Id,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(id: Id, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// An outgoing notification: a request without an id, never answered
#[derive(Debug, Serialize)]
pub struct Notification {
    jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        }
    }
}

/// An incoming response. Exactly one of `result` / `error` is present.
#[derive(Debug, Deserialize)]
pub struct Response {
    #[allow(dead_code)]
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
}

impl Response {
    /// Whether this response answers the given request id. Servers may echo
    /// a numeric id back as a string, so match across both shapes.
    pub fn is_for(&self, expected: &Id) -> bool {
        match (&self.id, expected) {
            (serde_json::Value::Number(n), Id::Number(e)) => n.as_u64() == Some(*e),
            (serde_json::Value::String(s), Id::String(e)) => s == e,
            (serde_json::Value::String(s), Id::Number(e)) => s == &e.to_string(),
            (serde_json::Value::Number(n), Id::String(e)) => {
                n.as_u64().map(|n| n.to_string()).as_deref() == Some(e.as_str())
            }
            _ => false,
        }
    }
}

/// Error object carried by a failed response
#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_with_version_and_id() {
        let req = Request::new(Id::Number(7), "tools/list", Some(json!({"cursor": "abc"})));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "tools/list");
        assert_eq!(value["params"]["cursor"], "abc");
    }

    #[test]
    fn notification_has_no_id() {
        let notif = Notification::new("notifications/initialized", None);
        let value = serde_json::to_value(&notif).unwrap();
        assert!(value.get("id").is_none());
        assert!(value.get("params").is_none());
    }

    #[test]
    fn response_id_matching_is_lenient_about_type() {
        let resp: Response =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "id": "3", "result": {}}"#).unwrap();
        assert!(resp.is_for(&Id::Number(3)));
        assert!(!resp.is_for(&Id::Number(4)));

        let resp: Response =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "id": 3, "result": {}}"#).unwrap();
        assert!(resp.is_for(&Id::Number(3)));
    }

    #[test]
    fn error_response_deserializes() {
        let resp: Response = serde_json::from_str(
            r#"{"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "no such method"}}"#,
        )
        .unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "no such method");
    }
}
