use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::database::Database;
use crate::engine::{ChronographEngine, ChronographMeta, ChronographSnapshot};
use crate::models::{
    Chronograph, ChronographInput, ChronographKind, ChronographState, UserSettings,
};
use crate::notify::Notifier;
use crate::timecode;

/// The two fixed tabs. Index 0 shows timers, index 1 stopwatches.
/// Selection is session-local; it is not persisted.
pub struct TabSelector {
    index: Mutex<usize>,
}

impl TabSelector {
    pub fn new() -> Self {
        Self {
            index: Mutex::new(0),
        }
    }

    pub fn select(&self, index: usize) -> ChronographKind {
        let clamped = index.min(1);
        if let Ok(mut current) = self.index.lock() {
            *current = clamped;
        }
        Self::kind_for(clamped)
    }

    pub fn index(&self) -> usize {
        self.index.lock().map(|i| *i).unwrap_or(0)
    }

    pub fn kind(&self) -> ChronographKind {
        Self::kind_for(self.index())
    }

    fn kind_for(index: usize) -> ChronographKind {
        if index == 0 {
            ChronographKind::Timer
        } else {
            ChronographKind::Stopwatch
        }
    }
}

impl Default for TabSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Layout of the rendered list: a pure function of its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Nothing rendered; the shell shows the fallback empty state.
    Empty,
    /// A single chronograph rendered large and centered.
    Enlarged,
    /// Two or more chronographs in the responsive grid.
    Grid,
}

impl DisplayMode {
    pub fn for_count(count: usize) -> Self {
        match count {
            0 => DisplayMode::Empty,
            1 => DisplayMode::Enlarged,
            _ => DisplayMode::Grid,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WidgetSnapshot {
    #[serde(flatten)]
    pub chronograph: ChronographSnapshot,
    pub enlarged: bool,
}

/// What the shell renders: the widget list plus its layout mode.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerView {
    pub display_mode: DisplayMode,
    pub widgets: Vec<WidgetSnapshot>,
}

struct Widget {
    chronograph: Chronograph,
    engine: Arc<ChronographEngine>,
}

struct ManagerState {
    workspace_id: i64,
    kind: ChronographKind,
    widgets: Vec<Widget>,
}

/// Owns the engines for the active (workspace, kind) pair. A kind or
/// workspace switch discards every engine and rebuilds from the database;
/// no live state is carried across the switch.
pub struct ChronographManager {
    db: Arc<Database>,
    settings: Arc<Mutex<UserSettings>>,
    notifier: Option<Arc<dyn Notifier>>,
    inner: Mutex<ManagerState>,
}

impl ChronographManager {
    pub fn new(
        db: Arc<Database>,
        settings: Arc<Mutex<UserSettings>>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            db,
            settings,
            notifier,
            inner: Mutex::new(ManagerState {
                workspace_id: 0,
                kind: ChronographKind::Timer,
                widgets: Vec::new(),
            }),
        }
    }

    fn lock_inner(&self) -> Result<std::sync::MutexGuard<'_, ManagerState>, String> {
        self.inner
            .lock()
            .map_err(|e| format!("Manager mutex poisoned: {}", e))
    }

    fn build_engine(&self, chronograph: &Chronograph) -> Arc<ChronographEngine> {
        Arc::new(ChronographEngine::new(
            ChronographMeta {
                id: chronograph.id,
                workspace_id: chronograph.workspace_id,
                name: chronograph.name.clone(),
                is_favourite: chronograph.is_favourite,
            },
            chronograph.kind,
            chronograph.duration.max(0) as u64,
            Some(self.db.clone()),
            self.notifier.clone(),
            Some(self.settings.clone()),
        ))
    }

    fn view_of(state: &ManagerState) -> ManagerView {
        let enlarged = state.widgets.len() == 1;
        let widgets = state
            .widgets
            .iter()
            .filter_map(|w| w.engine.snapshot())
            .map(|chronograph| WidgetSnapshot {
                chronograph,
                enlarged,
            })
            .collect();
        ManagerView {
            display_mode: DisplayMode::for_count(state.widgets.len()),
            widgets,
        }
    }

    /// Tab or workspace switch: tear every engine down (cancelling its tick
    /// task before the widget goes away) and rebuild from the database.
    pub fn refresh(
        &self,
        workspace_id: i64,
        kind: ChronographKind,
    ) -> Result<ManagerView, String> {
        let rows = self
            .db
            .fetch_chronographs(workspace_id, kind)
            .map_err(|e| format!("Failed to fetch chronographs: {}", e))?;

        let mut inner = self.lock_inner()?;
        for widget in inner.widgets.drain(..) {
            widget.engine.teardown();
        }
        inner.workspace_id = workspace_id;
        inner.kind = kind;
        inner.widgets = rows
            .into_iter()
            .map(|chronograph| Widget {
                engine: self.build_engine(&chronograph),
                chronograph,
            })
            .collect();

        info!(
            "[MANAGER] Rendering {} {} widget(s) for workspace {}",
            inner.widgets.len(),
            kind.as_str(),
            workspace_id
        );
        Ok(Self::view_of(&inner))
    }

    /// Append a default chronograph of the active kind: optimistic local
    /// row first, then the insert; the DB-assigned id replaces the
    /// provisional one when the insert lands. No rollback on failure.
    pub fn add(&self) -> Result<ManagerView, String> {
        let mut inner = self.lock_inner()?;
        let kind = inner.kind;
        let workspace_id = inner.workspace_id;

        let name = match kind {
            ChronographKind::Timer => "Timer",
            ChronographKind::Stopwatch => "Stopwatch",
        };
        let duration = match kind {
            ChronographKind::Timer => timecode::to_milliseconds(1, 0, 0) as i64,
            ChronographKind::Stopwatch => 0,
        };

        let provisional_id = inner
            .widgets
            .iter()
            .map(|w| w.chronograph.id)
            .max()
            .unwrap_or(-1)
            + 1;

        let optimistic = Chronograph {
            id: provisional_id,
            workspace_id,
            name: name.to_string(),
            kind,
            state: ChronographState::Paused,
            duration,
            is_favourite: false,
            created_at: String::new(),
            modified_at: String::new(),
        };
        inner.widgets.push(Widget {
            engine: self.build_engine(&optimistic),
            chronograph: optimistic,
        });

        let input = ChronographInput {
            workspace_id,
            name: name.to_string(),
            kind,
            state: ChronographState::Paused,
            duration,
            is_favourite: false,
        };
        match self.db.insert_chronograph(&input) {
            Ok(created) => {
                if let Some(widget) = inner
                    .widgets
                    .iter_mut()
                    .find(|w| w.chronograph.id == provisional_id)
                {
                    widget.engine.set_id(created.id);
                    widget.chronograph = created;
                }
            }
            Err(e) => {
                warn!("[MANAGER] Failed to persist new chronograph: {}", e);
            }
        }

        Ok(Self::view_of(&inner))
    }

    /// Remove locally first, then issue the delete. No rollback on failure.
    pub fn remove(&self, id: i64) -> Result<ManagerView, String> {
        let mut inner = self.lock_inner()?;
        let workspace_id = inner.workspace_id;

        if let Some(position) = inner.widgets.iter().position(|w| w.chronograph.id == id) {
            let widget = inner.widgets.remove(position);
            widget.engine.teardown();
        }

        if let Err(e) = self.db.delete_chronograph(workspace_id, id) {
            warn!("[MANAGER] Failed to delete chronograph {}: {}", id, e);
        }

        Ok(Self::view_of(&inner))
    }

    pub fn view(&self) -> Result<ManagerView, String> {
        let inner = self.lock_inner()?;
        Ok(Self::view_of(&inner))
    }

    pub fn engine(&self, id: i64) -> Option<Arc<ChronographEngine>> {
        let inner = self.inner.lock().ok()?;
        inner
            .widgets
            .iter()
            .find(|w| w.chronograph.id == id)
            .map(|w| w.engine.clone())
    }

    pub fn any_running(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.widgets.iter().any(|w| w.engine.is_running()))
            .unwrap_or(false)
    }

    /// Shutdown path: pause every running engine so its latest elapsed time
    /// is mirrored to the database before the process exits.
    pub fn pause_all(&self) {
        let engines: Vec<Arc<ChronographEngine>> = match self.inner.lock() {
            Ok(inner) => inner.widgets.iter().map(|w| w.engine.clone()).collect(),
            Err(e) => {
                warn!("[MANAGER] Manager mutex poisoned in pause_all: {}", e);
                return;
            }
        };
        for engine in engines {
            engine.pause();
        }
    }
}
