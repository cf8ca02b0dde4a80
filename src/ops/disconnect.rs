//! Disconnect presence operators.

use serde_json::Value;
use tracing::debug;

use crate::errors::{ProviderError, ProviderResult};
use crate::path::TreePath;
use crate::provider::Provider;

impl Provider {
    /// Schedule a server-side write of `value` at `path` for when the
    /// connection drops
    ///
    /// At most one registration may be pending per provider; a second one
    /// fails until the first is cancelled.
    pub fn set_on_disconnect(&self, path: &str, value: Value) -> ProviderResult<()> {
        let path = TreePath::parse(path)?;
        let mut slot = self
            .disconnect
            .lock()
            .map_err(|_| ProviderError::Backend("disconnect slot poisoned".to_string()))?;
        if slot.is_some() {
            return Err(ProviderError::DisconnectAlreadySet);
        }

        let handle = self.db.on_disconnect_set(&path, value)?;
        debug!(path = %path, "disconnect write registered");
        *slot = Some(handle);
        Ok(())
    }

    /// Withdraw the pending disconnect write
    pub fn cancel_on_disconnect(&self) -> ProviderResult<()> {
        let handle = self
            .disconnect
            .lock()
            .map_err(|_| ProviderError::Backend("disconnect slot poisoned".to_string()))?
            .take()
            .ok_or(ProviderError::NoDisconnectSet)?;
        debug!(path = %handle.path(), "disconnect write cancelled");
        handle.cancel();
        Ok(())
    }
}
