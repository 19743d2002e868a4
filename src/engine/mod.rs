use crate::database::Database;
use crate::models::{ChronographKind, ChronographState, UserSettings};
use crate::notify::Notifier;
use crate::timecode::{self, TimeParts};
use serde::Serialize;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use std::time::Instant;

mod core;
mod db;

pub use self::core::TimeField;

/// Identity and persisted fields mirrored by this engine instance. The
/// `name` is the pending (possibly uncommitted) rename value.
#[derive(Debug, Clone)]
pub struct ChronographMeta {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub is_favourite: bool,
}

/// Live clock state. Every transition takes this one lock, so a tick
/// dequeued after a cancellation observes `running == false` (or a stale
/// generation) and is a no-op.
pub(crate) struct ClockState {
    pub(crate) elapsed_ms: u64,
    pub(crate) running: bool,
    /// Elapsed at the moment the current stopwatch session started.
    pub(crate) session_base_ms: u64,
    /// Monotonic anchor of the current stopwatch session.
    pub(crate) session_started: Option<Instant>,
    pub(crate) display: TimeParts,
    /// Raw two-digit composition of the field being hand-edited; the stored
    /// value clamps per keystroke, the raw form keeps the typed digits.
    pub(crate) edit_raw: Option<(TimeField, String)>,
}

/// One chronograph's countdown/count-up state machine. One instance per
/// rendered chronograph; at most one outstanding tick task per instance.
pub struct ChronographEngine {
    kind: ChronographKind,
    /// Countdown length a timer re-arms to on reset. h/m/s are clamped to
    /// [0,99]/[0,59]/[0,59] at construction.
    configured_ms: u64,
    pub(crate) meta: Mutex<ChronographMeta>,
    pub(crate) clock: Mutex<ClockState>,
    /// Bumped on every start/pause/reset/teardown; invalidates ticks from a
    /// cancelled task.
    pub(crate) generation: AtomicU64,
    pub(crate) tick_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    pub(crate) db: Option<Arc<Database>>,
    pub(crate) notifier: Option<Arc<dyn Notifier>>,
    pub(crate) settings: Option<Arc<Mutex<UserSettings>>>,
}

/// Snapshot for the API — clock state without the Instant anchor.
#[derive(Debug, Clone, Serialize)]
pub struct ChronographSnapshot {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub kind: ChronographKind,
    pub state: ChronographState,
    pub is_favourite: bool,
    pub elapsed_ms: u64,
    pub display: TimeParts,
}

impl ChronographEngine {
    pub fn new(
        meta: ChronographMeta,
        kind: ChronographKind,
        duration_ms: u64,
        db: Option<Arc<Database>>,
        notifier: Option<Arc<dyn Notifier>>,
        settings: Option<Arc<Mutex<UserSettings>>>,
    ) -> Self {
        let configured_ms = match kind {
            ChronographKind::Timer => {
                let parts = timecode::from_milliseconds(duration_ms);
                timecode::to_milliseconds(
                    parts.hours.min(99),
                    parts.minutes.min(59),
                    parts.seconds.min(59),
                )
            }
            ChronographKind::Stopwatch => 0,
        };
        let elapsed_ms = match kind {
            ChronographKind::Timer => configured_ms,
            ChronographKind::Stopwatch => duration_ms,
        };

        Self {
            kind,
            configured_ms,
            meta: Mutex::new(meta),
            clock: Mutex::new(ClockState {
                elapsed_ms,
                running: false,
                session_base_ms: 0,
                session_started: None,
                display: timecode::from_milliseconds(elapsed_ms),
                edit_raw: None,
            }),
            generation: AtomicU64::new(0),
            tick_task: Mutex::new(None),
            db,
            notifier,
            settings,
        }
    }

    pub fn kind(&self) -> ChronographKind {
        self.kind
    }

    pub(crate) fn configured_ms(&self) -> u64 {
        self.configured_ms
    }

    /// Two-phase add reconcile: swap the provisional id for the DB-assigned one.
    pub fn set_id(&self, id: i64) {
        if let Ok(mut meta) = self.meta.lock() {
            meta.id = id;
        }
    }

    pub fn snapshot(&self) -> Option<ChronographSnapshot> {
        let meta = self.meta.lock().ok()?.clone();
        let clock = self.clock.lock().ok()?;
        Some(ChronographSnapshot {
            id: meta.id,
            workspace_id: meta.workspace_id,
            name: meta.name,
            kind: self.kind,
            state: if clock.running {
                ChronographState::Active
            } else {
                ChronographState::Paused
            },
            is_favourite: meta.is_favourite,
            elapsed_ms: clock.elapsed_ms,
            display: clock.display,
        })
    }

    pub fn is_running(&self) -> bool {
        self.clock.lock().map(|c| c.running).unwrap_or(false)
    }
}

impl Drop for ChronographEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
