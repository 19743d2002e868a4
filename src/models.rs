use serde::{Deserialize, Serialize};

/// Which way a chronograph counts. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChronographKind {
    /// Counts down from a configured duration to zero.
    Timer,
    /// Counts up from zero with no upper bound.
    Stopwatch,
}

impl ChronographKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChronographKind::Timer => "timer",
            ChronographKind::Stopwatch => "stopwatch",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "timer" => Ok(ChronographKind::Timer),
            "stopwatch" => Ok(ChronographKind::Stopwatch),
            other => Err(format!("Unknown chronograph kind: {}", other)),
        }
    }
}

/// Whether the clock was running the last time the row was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChronographState {
    Paused,
    Active,
}

impl ChronographState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChronographState::Paused => "paused",
            ChronographState::Active => "active",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "paused" => Ok(ChronographState::Paused),
            "active" => Ok(ChronographState::Active),
            other => Err(format!("Unknown chronograph state: {}", other)),
        }
    }
}

/// Persisted chronograph row. `duration` is milliseconds: countdown length
/// (and remaining time while paused) for timers, accumulated elapsed time
/// for stopwatches. Timestamps are owned by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chronograph {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub kind: ChronographKind,
    pub state: ChronographState,
    pub duration: i64,
    pub is_favourite: bool,
    pub created_at: String,
    pub modified_at: String,
}

/// Creation payload: a Chronograph minus the DB-assigned fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChronographInput {
    pub workspace_id: i64,
    pub name: String,
    pub kind: ChronographKind,
    pub state: ChronographState,
    pub duration: i64,
    pub is_favourite: bool,
}

/// Update payload: every mutable field; id/workspace_id/timestamps excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChronographUpdate {
    pub name: String,
    pub kind: ChronographKind,
    pub state: ChronographState,
    pub duration: i64,
    pub is_favourite: bool,
}

/// A named scope that partitions which chronographs are visible at once.
/// Exactly one workspace carries `is_selected` at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub is_favourite: bool,
    pub is_selected: bool,
    pub created_at: String,
    pub modified_at: String,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceInput {
    pub title: String,
    pub description: String,
    pub is_favourite: bool,
    pub is_selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    System,
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::System => "system",
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "system" => Ok(Theme::System),
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("Unknown theme: {}", other)),
        }
    }
}

/// Singleton settings row (id = 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub theme: Theme,
    pub show_app_in_system_tray: bool,
    pub notify_on_timer_complete: bool,
    pub created_at: String,
    pub modified_at: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            show_app_in_system_tray: false,
            notify_on_timer_complete: false,
            created_at: String::new(),
            modified_at: String::new(),
        }
    }
}

/// Partial settings update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSettingsUpdate {
    #[serde(default)]
    pub theme: Option<Theme>,
    #[serde(default)]
    pub show_app_in_system_tray: Option<bool>,
    #[serde(default)]
    pub notify_on_timer_complete: Option<bool>,
}
