//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! line-delimited JSON-RPC method calls to the command handlers.
//! Authentication is the caller's concern; the socket's file permissions
//! are the trust boundary here.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use passage_engine::RedeemError;

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self {
            code: -32600,
            message: "INVALID_REQUEST".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: "INVALID_PARAMS".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self {
            code: -32603,
            message: "INTERNAL_ERROR".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    // Domain errors

    /// Something the request named does not exist.
    pub fn not_found(what: &str) -> Self {
        Self {
            code: -40404,
            message: "NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"detail": what})),
        }
    }

    /// A WireGuard boundary failure.
    pub fn wg_failed(detail: &str) -> Self {
        Self {
            code: -40100,
            message: "WG_FAILED".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }
}

impl From<RedeemError> for RpcError {
    fn from(e: RedeemError) -> Self {
        match e {
            RedeemError::InvalidFormat => Self {
                code: -40001,
                message: "INVALID_CODE".to_string(),
                data: None,
            },
            RedeemError::NotFound => Self {
                code: -40002,
                message: "VOUCHER_NOT_FOUND".to_string(),
                data: None,
            },
            RedeemError::AlreadyRedeemed => Self {
                code: -40003,
                message: "ALREADY_REDEEMED".to_string(),
                data: None,
            },
            RedeemError::AddressPool(inner) => Self {
                code: -40004,
                message: "ADDRESS_POOL_EXHAUSTED".to_string(),
                data: Some(serde_json::json!({"detail": inner.to_string()})),
            },
            RedeemError::KeyGen(inner) => Self {
                code: -40005,
                message: "KEYGEN_FAILED".to_string(),
                data: Some(serde_json::json!({"detail": inner.to_string()})),
            },
            // The grant is committed and valid; hand it to the caller
            // alongside the failure so it is not lost.
            RedeemError::SyncFailed { grant, reason } => Self {
                code: -40006,
                message: "SYNC_FAILED".to_string(),
                data: Some(serde_json::json!({
                    "detail": reason,
                    "grant": grant,
                })),
            },
            RedeemError::Settings(detail) => Self::internal_error(&detail),
            RedeemError::Store(inner) => Self::internal_error(&inner.to_string()),
        }
    }
}

impl From<passage_engine::EngineError> for RpcError {
    fn from(e: passage_engine::EngineError) -> Self {
        use passage_engine::EngineError;
        match e {
            EngineError::Store(passage_db::DbError::NotFound(what)) => Self::not_found(&what),
            EngineError::Store(passage_db::DbError::Constraint(what)) => {
                Self::invalid_params(&what)
            }
            EngineError::Store(inner) => Self::internal_error(&inner.to_string()),
            EngineError::Wg(inner) => Self::wg_failed(&inner.to_string()),
            EngineError::Code(inner) => Self::invalid_params(&inner.to_string()),
            EngineError::InvalidInput(detail) => Self::invalid_params(&detail),
        }
    }
}

/// The Unix-socket RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Accept connections until the task is aborted.
    pub async fn run(&self) -> anyhow::Result<()> {
        // A previous unclean shutdown may have left the socket file behind.
        let _ = std::fs::remove_file(&self.socket_path);
        let listener = UnixListener::bind(&self.socket_path)?;
        info!(socket = %self.socket_path.display(), "RPC server listening");

        loop {
            let (stream, _addr) = listener.accept().await?;
            let state = self.state.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(state, stream).await {
                    warn!(error = %e, "RPC connection error");
                }
            });
        }
    }
}

async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) if request.jsonrpc == "2.0" => {
                debug!(method = %request.method, "dispatching RPC request");
                let id = request.id.clone();
                match commands::dispatch(&state, &request.method, &request.params).await {
                    Ok(result) => RpcResponse::success(id, result),
                    Err(rpc_error) => RpcResponse::error(id, rpc_error),
                }
            }
            Ok(request) => RpcResponse::error(request.id, RpcError::invalid_request()),
            Err(e) => {
                error!(error = %e, "unparseable RPC request");
                RpcResponse::error(serde_json::Value::Null, RpcError::parse_error())
            }
        };

        let mut payload = serde_json::to_vec(&response)?;
        payload.push(b'\n');
        write_half.write_all(&payload).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parsing() {
        let request: RpcRequest = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"method":"voucher.redeem","params":{"code":"X"}}"#,
        )
        .expect("parse");
        assert_eq!(request.method, "voucher.redeem");
        assert_eq!(request.params["code"], "X");
    }

    #[test]
    fn test_sync_failed_carries_grant() {
        let err: RpcError = RedeemError::SyncFailed {
            grant: passage_types::AccessGrant {
                access_link: "wg://h:1?peer=10.0.0.5".to_string(),
                ip_address: "10.0.0.5".to_string(),
                expires_at: "2026-01-01T00:00:00+00:00".to_string(),
            },
            reason: "apply failed".to_string(),
        }
        .into();

        assert_eq!(err.message, "SYNC_FAILED");
        let data = err.data.expect("data");
        assert_eq!(data["grant"]["ip_address"], "10.0.0.5");
    }

    #[test]
    fn test_error_response_shape() {
        let response = RpcResponse::error(serde_json::json!(7), RpcError::method_not_found("x.y"));
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["id"], 7);
        assert_eq!(json["error"]["code"], -32601);
        assert!(json.get("result").is_none());
    }
}
