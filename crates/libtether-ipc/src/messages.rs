//! Control-channel request and response types
//!
//! Each message is one JSON object on its own line. Requests carry a `type`
//! discriminator; responses are `{ok, error?, data}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::IpcError;

/// Requests understood by the supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlRequest {
    /// Register this host as a client of the supervisor
    AttachClient { client_id: String, pid: u32 },
    /// Unregister a previously attached client
    DetachClient { client_id: String },
    /// List active MCP connections (sessions)
    ListMcpConnections,
    /// List pooled MCP instances
    ListMcpInstances,
    /// Ask the supervisor to grow the instance pool
    ScaleUpMcp {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<u32>,
    },
}

impl ControlRequest {
    /// The wire `type` discriminator
    pub fn request_type(&self) -> &'static str {
        match self {
            ControlRequest::AttachClient { .. } => "AttachClient",
            ControlRequest::DetachClient { .. } => "DetachClient",
            ControlRequest::ListMcpConnections => "ListMcpConnections",
            ControlRequest::ListMcpInstances => "ListMcpInstances",
            ControlRequest::ScaleUpMcp { .. } => "ScaleUpMcp",
        }
    }
}

/// Supervisor response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ControlResponse {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            error: None,
            data,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            data: serde_json::Value::Null,
        }
    }

    /// `data` on success, [`IpcError::Rejected`] otherwise
    pub fn into_result(self) -> Result<serde_json::Value, IpcError> {
        if self.ok {
            Ok(self.data)
        } else {
            Err(IpcError::Rejected {
                message: self
                    .error
                    .unwrap_or_else(|| "unspecified supervisor error".to_string()),
            })
        }
    }

    /// Decode `data` into `T` after checking `ok`
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, IpcError> {
        let data = self.into_result()?;
        Ok(serde_json::from_value(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let json = serde_json::to_value(ControlRequest::ListMcpConnections).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ListMcpConnections"}));

        let json = serde_json::to_value(ControlRequest::AttachClient {
            client_id: "c1".to_string(),
            pid: 42,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "AttachClient", "client_id": "c1", "pid": 42})
        );

        let json = serde_json::to_value(ControlRequest::ScaleUpMcp { count: None }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ScaleUpMcp"}));
    }

    #[test]
    fn test_request_type_matches_tag() {
        let request = ControlRequest::DetachClient {
            client_id: "c1".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], request.request_type());
    }

    #[test]
    fn test_response_defaults() {
        let response: ControlResponse = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert!(response.ok);
        assert!(response.data.is_null());
    }

    #[test]
    fn test_failure_into_rejected() {
        let response: ControlResponse =
            serde_json::from_str(r#"{"ok":false,"error":"pool exhausted","data":null}"#).unwrap();
        match response.into_result() {
            Err(IpcError::Rejected { message }) => assert_eq!(message, "pool exhausted"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_into_data() {
        let response = ControlResponse::success(serde_json::json!([1, 2, 3]));
        let values: Vec<u32> = response.into_data().unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }
}
