//! Administrative handlers. Authentication happens outside this process;
//! these handlers assume the socket is already an admin boundary.

use std::sync::Arc;

use serde_json::Value;

use passage_engine::mint;
use passage_types::clock;

use crate::commands::{required_str, required_u64};
use crate::rpc::RpcError;
use crate::DaemonState;

/// `admin.voucher.create` — mint one voucher (explicit or generated code)
/// or a batch via `count`.
pub async fn voucher_create(state: &Arc<DaemonState>, params: &Value) -> Result<Value, RpcError> {
    let duration_days = u32::try_from(required_u64(params, "duration_days")?)
        .map_err(|_| RpcError::invalid_params("duration_days out of range"))?;
    if duration_days == 0 {
        return Err(RpcError::invalid_params("duration_days must be positive"));
    }

    let explicit_code = params.get("code").and_then(Value::as_str);
    let count = params.get("count").and_then(Value::as_u64).unwrap_or(1);
    if count == 0 || count > 1000 {
        return Err(RpcError::invalid_params("count must be 1..=1000"));
    }
    if explicit_code.is_some() && count > 1 {
        return Err(RpcError::invalid_params(
            "an explicit code cannot be combined with count",
        ));
    }

    let conn = state.db.lock().await;
    let codes = if let Some(code) = explicit_code {
        vec![mint::create_voucher(&conn, Some(code), duration_days)?]
    } else {
        mint::create_batch(&conn, count as u32, duration_days)?
    };

    Ok(serde_json::json!({ "codes": codes }))
}

/// `admin.voucher.list`
pub async fn voucher_list(state: &Arc<DaemonState>) -> Result<Value, RpcError> {
    let rows = state.admin.list_vouchers().await?;
    let vouchers: Vec<Value> = rows
        .iter()
        .map(|v| {
            serde_json::json!({
                "id": v.id,
                "code": v.code,
                "duration_days": v.duration_days,
                "is_redeemed": v.is_redeemed,
                "redeemed_at": v.redeemed_at.map(clock::to_rfc3339),
                "created_at": clock::to_rfc3339(v.created_at),
            })
        })
        .collect();
    Ok(serde_json::json!({ "vouchers": vouchers }))
}

/// `admin.subscription.list`
pub async fn subscription_list(state: &Arc<DaemonState>) -> Result<Value, RpcError> {
    let rows = state.admin.list_subscriptions().await?;
    let subscriptions: Vec<Value> = rows
        .iter()
        .map(|s| {
            serde_json::json!({
                "id": s.id,
                "email": s.email,
                "phone": s.phone,
                "voucher_id": s.voucher_id,
                "peer_id": s.peer_id,
                "status": s.status,
                "expires_at": clock::to_rfc3339(s.expires_at),
                "created_at": clock::to_rfc3339(s.created_at),
            })
        })
        .collect();
    Ok(serde_json::json!({ "subscriptions": subscriptions }))
}

/// `admin.subscription.disable` — disable before expiry and resync.
pub async fn subscription_disable(
    state: &Arc<DaemonState>,
    params: &Value,
) -> Result<Value, RpcError> {
    let id = required_u64(params, "id")? as i64;
    state.admin.disable_subscription(id).await?;
    Ok(serde_json::json!({ "ok": true }))
}

/// `admin.subscription.extend` — push the expiry forward.
pub async fn subscription_extend(
    state: &Arc<DaemonState>,
    params: &Value,
) -> Result<Value, RpcError> {
    let id = required_u64(params, "id")? as i64;
    let days = u32::try_from(required_u64(params, "days")?)
        .map_err(|_| RpcError::invalid_params("days out of range"))?;
    state.admin.extend_subscription(id, days).await?;
    Ok(serde_json::json!({ "ok": true }))
}

/// `admin.peer.import` — register an externally managed peer.
pub async fn peer_import(state: &Arc<DaemonState>, params: &Value) -> Result<Value, RpcError> {
    let public_key = required_str(params, "public_key")?;
    let ip_address = required_str(params, "ip_address")?;
    let peer_id = state.admin.import_peer(public_key, ip_address).await?;
    Ok(serde_json::json!({ "peer_id": peer_id }))
}
