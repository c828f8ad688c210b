//! Live daemon status and manual resync handlers.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use passage_db::queries::settings;
use passage_wg::iface;
use passage_wg::runner::WgRunner;

use crate::rpc::RpcError;
use crate::DaemonState;

/// `wg.status` — parsed live interface and peer status.
pub async fn status(state: &Arc<DaemonState>) -> Result<Value, RpcError> {
    let interface = {
        let conn = state.db.lock().await;
        let row = settings::get(&conn).map_err(|e| RpcError::internal_error(&e.to_string()))?;
        iface::validate(&row.wg_interface)
            .map_err(|e| RpcError::wg_failed(&e.to_string()))?
            .to_string()
    };

    let dump = state
        .runner
        .dump(&interface)
        .await
        .map_err(|e| RpcError::wg_failed(&e.to_string()))?;
    let parsed = passage_wg::status::parse_dump(&dump)
        .map_err(|e| RpcError::wg_failed(&e.to_string()))?;

    serde_json::to_value(parsed).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// `wg.resync` — the manual escape hatch after prolonged sync failure.
pub async fn resync(state: &Arc<DaemonState>) -> Result<Value, RpcError> {
    info!("manual resync requested");
    state
        .synchronizer
        .sync()
        .await
        .map_err(|e| RpcError::wg_failed(&e.to_string()))?;
    Ok(serde_json::json!({ "ok": true }))
}
