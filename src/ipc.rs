//! Centralized IPC event and command names.
//! Prevents typos and enables type-safe references across Rust and TypeScript.

/// Tauri event names (Rust emit ↔ Frontend listen)
pub mod events {
    /// Periodic snapshot of the rendered widgets while any clock is running.
    pub const CHRONOGRAPH_STATE_UPDATE: &str = "chronograph-state-update";
    pub const DB_RECOVERED: &str = "db-recovered-from-corruption";
}

/// Tauri command names (Frontend invoke → Rust handler)
/// Kept for API contract; Rust handlers use fn names.
#[allow(dead_code)]
pub mod commands {
    pub const FETCH_ALL_CHRONOGRAPHS: &str = "fetch_all_chronographs";
    pub const ADD_CHRONOGRAPH: &str = "add_chronograph";
    pub const UPDATE_CHRONOGRAPH: &str = "update_chronograph";
    pub const DELETE_CHRONOGRAPH: &str = "delete_chronograph";
    pub const SELECT_TAB: &str = "select_tab";
    pub const START_CHRONOGRAPH: &str = "start_chronograph";
    pub const PAUSE_CHRONOGRAPH: &str = "pause_chronograph";
    pub const RESET_CHRONOGRAPH: &str = "reset_chronograph";
}
