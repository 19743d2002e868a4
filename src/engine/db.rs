use crate::engine::ChronographEngine;
use crate::models::{ChronographState, ChronographUpdate};
use tracing::warn;

impl ChronographEngine {
    /// Mirror the current name/state/elapsed to the persistence layer.
    /// Best-effort: the engine's local state stays authoritative whether or
    /// not the write lands, and nothing is retried.
    pub(crate) fn persist_clock(&self, state: ChronographState) {
        let Some(db) = &self.db else {
            return;
        };

        let meta = match self.meta.lock() {
            Ok(meta) => meta.clone(),
            Err(e) => {
                warn!("[ENGINE] Meta mutex poisoned, skipping persist: {}", e);
                return;
            }
        };
        let elapsed_ms = match self.clock.lock() {
            Ok(clock) => clock.elapsed_ms,
            Err(e) => {
                warn!("[ENGINE] Clock mutex poisoned, skipping persist: {}", e);
                return;
            }
        };

        let update = ChronographUpdate {
            name: meta.name,
            kind: self.kind(),
            state,
            duration: elapsed_ms as i64,
            is_favourite: meta.is_favourite,
        };

        match db.update_chronograph(meta.workspace_id, meta.id, &update) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "[ENGINE] Chronograph {} not found while mirroring state (deleted?)",
                    meta.id
                );
            }
            Err(e) => {
                warn!(
                    "[ENGINE] Failed to mirror state for chronograph {}: {}",
                    meta.id, e
                );
            }
        }
    }
}
