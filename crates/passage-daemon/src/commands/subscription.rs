//! Subscription self-service handlers.

use std::sync::Arc;

use serde_json::Value;

use crate::commands::required_str;
use crate::rpc::RpcError;
use crate::DaemonState;

/// `subscription.get` — details for an access token.
pub async fn get(state: &Arc<DaemonState>, params: &Value) -> Result<Value, RpcError> {
    let token = required_str(params, "token")?;
    let info = state.subscriptions.lookup(token).await?;
    serde_json::to_value(info).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// `subscription.config` — client tunnel configuration text.
pub async fn config(state: &Arc<DaemonState>, params: &Value) -> Result<Value, RpcError> {
    let token = required_str(params, "token")?;
    let text = state.subscriptions.client_config(token).await?;
    Ok(serde_json::json!({ "config": text }))
}
