//! RPC command handlers, one submodule per category.

pub mod admin;
pub mod subscription;
pub mod voucher;
pub mod wg;

use std::sync::Arc;

use serde_json::Value;

use crate::rpc::RpcError;
use crate::DaemonState;

/// Route a method name to its handler.
pub async fn dispatch(
    state: &Arc<DaemonState>,
    method: &str,
    params: &Value,
) -> Result<Value, RpcError> {
    match method {
        "voucher.redeem" => voucher::redeem(state, params).await,

        "subscription.get" => subscription::get(state, params).await,
        "subscription.config" => subscription::config(state, params).await,

        "admin.voucher.create" => admin::voucher_create(state, params).await,
        "admin.voucher.list" => admin::voucher_list(state).await,
        "admin.subscription.list" => admin::subscription_list(state).await,
        "admin.subscription.disable" => admin::subscription_disable(state, params).await,
        "admin.subscription.extend" => admin::subscription_extend(state, params).await,
        "admin.peer.import" => admin::peer_import(state, params).await,

        "wg.status" => wg::status(state).await,
        "wg.resync" => wg::resync(state).await,

        other => Err(RpcError::method_not_found(other)),
    }
}

/// Extract a required string parameter.
pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, RpcError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

/// Extract a required unsigned integer parameter.
pub(crate) fn required_u64(params: &Value, key: &str) -> Result<u64, RpcError> {
    params
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}
