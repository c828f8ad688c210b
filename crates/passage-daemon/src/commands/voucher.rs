//! Voucher redemption handler.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use passage_types::validate;

use crate::commands::required_str;
use crate::rpc::RpcError;
use crate::DaemonState;

/// `voucher.redeem` — code + email (+ optional phone) → access grant.
pub async fn redeem(state: &Arc<DaemonState>, params: &Value) -> Result<Value, RpcError> {
    let code = required_str(params, "code")?;
    let email = required_str(params, "email")?;
    if !validate::is_email(email) {
        return Err(RpcError::invalid_params("email is not valid"));
    }

    let phone = match params.get("phone").and_then(Value::as_str) {
        Some(p) if !p.is_empty() => {
            if !validate::is_phone(p) {
                return Err(RpcError::invalid_params("phone is not valid"));
            }
            Some(p)
        }
        _ => None,
    };

    info!(email = %email, "redemption requested");
    let grant = state.coordinator.redeem(code, email, phone).await?;

    Ok(serde_json::json!({
        "access_link": grant.access_link,
        "ip_address": grant.ip_address,
        "expires_at": grant.expires_at,
    }))
}
