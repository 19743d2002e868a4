use crate::database::Database;
use crate::engine::{ChronographEngine, ChronographMeta, TimeField};
use crate::manager::{ChronographManager, DisplayMode, TabSelector};
use crate::models::*;
use crate::notify::Notifier;
use crate::timecode::{from_milliseconds, to_milliseconds};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Notifier that only counts requests.
struct CountingNotifier {
    sent: AtomicUsize,
}

impl CountingNotifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

impl Notifier for CountingNotifier {
    fn notify(&self, _title: &str, _body: &str) {
        self.sent.fetch_add(1, Ordering::SeqCst);
    }
}

fn test_settings(notify_on_timer_complete: bool) -> Arc<Mutex<UserSettings>> {
    Arc::new(Mutex::new(UserSettings {
        notify_on_timer_complete,
        ..UserSettings::default()
    }))
}

fn test_engine(
    kind: ChronographKind,
    duration_ms: u64,
    notify: bool,
) -> (Arc<ChronographEngine>, Arc<CountingNotifier>) {
    let notifier = CountingNotifier::new();
    let engine = Arc::new(ChronographEngine::new(
        ChronographMeta {
            id: 1,
            workspace_id: 1,
            name: "Timer".to_string(),
            is_favourite: false,
        },
        kind,
        duration_ms,
        None,
        Some(notifier.clone() as Arc<dyn Notifier>),
        Some(test_settings(notify)),
    ));
    (engine, notifier)
}

/// Throwaway on-disk database; the TempDir must outlive the Database.
fn test_db(name: &str) -> (tempfile::TempDir, Arc<Database>) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join(format!("{}.db", name));
    let db = Database::new(path.to_str().expect("Temp path is not UTF-8"))
        .expect("Failed to create test database");
    (dir, Arc::new(db))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================
    // TIME CODEC
    // ============================================

    #[test]
    fn test_from_milliseconds_ranges_and_reassembly() {
        // Full day swept at the display resolution (10 ms)
        let mut ms: u64 = 0;
        while ms < 86_400_000 {
            let parts = from_milliseconds(ms);
            assert!(parts.hours <= 23, "hours out of range at {}", ms);
            assert!(parts.minutes <= 59, "minutes out of range at {}", ms);
            assert!(parts.seconds <= 59, "seconds out of range at {}", ms);
            assert!(parts.hundredths <= 99, "hundredths out of range at {}", ms);
            assert_eq!(
                parts.hours * 3_600_000
                    + parts.minutes * 60_000
                    + parts.seconds * 1000
                    + parts.hundredths * 10,
                ms
            );
            ms += 10;
        }
    }

    #[test]
    fn test_to_milliseconds_spot_values() {
        assert_eq!(to_milliseconds(1, 0, 0), 3_600_000);
        assert_eq!(to_milliseconds(0, 0, 0), 0);
        assert_eq!(to_milliseconds(0, 1, 30), 90_000);
        assert_eq!(to_milliseconds(2, 15, 5), 8_105_000);
    }

    #[test]
    fn test_codec_round_trip_drops_sub_second() {
        for ms in [0u64, 10, 990, 1000, 61_230, 3_599_990, 86_399_990] {
            let parts = from_milliseconds(ms);
            assert_eq!(
                to_milliseconds(parts.hours, parts.minutes, parts.seconds),
                ms - (ms % 1000)
            );
        }
    }

    // ============================================
    // CHRONOGRAPH ENGINE
    // ============================================

    #[test]
    fn test_timer_counts_down_to_zero_and_notifies_once() {
        let (engine, notifier) = test_engine(ChronographKind::Timer, 3_600_000, true);

        let generation = engine.apply_start().expect("start refused");
        for _ in 0..3600 {
            engine.tick(generation);
        }

        let snapshot = engine.snapshot().expect("no snapshot");
        assert_eq!(snapshot.elapsed_ms, 0);
        assert_eq!(snapshot.state, ChronographState::Paused);
        assert!(!engine.is_running());
        assert_eq!(notifier.count(), 1);

        // Extra ticks after completion change nothing
        engine.tick(generation);
        assert_eq!(engine.snapshot().expect("no snapshot").elapsed_ms, 0);
        assert_eq!(notifier.count(), 1);
    }

    #[test]
    fn test_completion_notification_respects_preference() {
        let (engine, notifier) = test_engine(ChronographKind::Timer, 2_000, false);

        let generation = engine.apply_start().expect("start refused");
        engine.tick(generation);
        engine.tick(generation);

        assert_eq!(engine.snapshot().expect("no snapshot").elapsed_ms, 0);
        assert_eq!(notifier.count(), 0);
    }

    #[test]
    fn test_start_is_idempotent_while_running() {
        let (engine, _) = test_engine(ChronographKind::Timer, 10_000, false);

        let generation = engine.apply_start().expect("start refused");
        // A second start while running must not arm a second callback
        assert!(engine.apply_start().is_none());

        engine.tick(generation);
        assert_eq!(engine.snapshot().expect("no snapshot").elapsed_ms, 9_000);
    }

    #[test]
    fn test_stale_tick_after_pause_is_noop() {
        let (engine, _) = test_engine(ChronographKind::Timer, 10_000, false);

        let generation = engine.apply_start().expect("start refused");
        engine.tick(generation);
        engine.pause();

        // No tick may be observed after cancellation
        assert!(!engine.tick(generation));
        assert_eq!(engine.snapshot().expect("no snapshot").elapsed_ms, 9_000);
    }

    #[test]
    fn test_zero_duration_timer_cannot_start() {
        let (engine, _) = test_engine(ChronographKind::Timer, 0, false);
        assert!(engine.apply_start().is_none());
        assert!(!engine.is_running());
    }

    #[test]
    fn test_stopwatch_accumulates_wall_clock() {
        let (engine, _) = test_engine(ChronographKind::Stopwatch, 0, false);

        // Pause before any start is a no-op
        engine.pause();
        assert_eq!(engine.snapshot().expect("no snapshot").elapsed_ms, 0);

        let generation = engine.apply_start().expect("start refused");
        std::thread::sleep(std::time::Duration::from_millis(250));
        engine.tick(generation);
        engine.pause();
        let first = engine.snapshot().expect("no snapshot").elapsed_ms;
        assert!((250..600).contains(&first), "first session: {}", first);

        let generation = engine.apply_start().expect("start refused");
        std::thread::sleep(std::time::Duration::from_millis(400));
        engine.tick(generation);
        engine.pause();
        let second = engine.snapshot().expect("no snapshot").elapsed_ms;
        assert!(second > first, "elapsed must be monotonic");
        assert!((650..1200).contains(&second), "total: {}", second);
    }

    #[test]
    fn test_reset_restores_configured_duration() {
        // 120 h decomposes above the field maximum; construction clamps to 99
        let (engine, _) = test_engine(ChronographKind::Timer, to_milliseconds(120, 0, 5), false);
        let configured = to_milliseconds(99, 0, 5);
        assert_eq!(engine.snapshot().expect("no snapshot").elapsed_ms, configured);

        let generation = engine.apply_start().expect("start refused");
        engine.tick(generation);
        engine.tick(generation);
        engine.pause();
        engine.edit_field(TimeField::Seconds, "9", Some(0));

        engine.reset();
        let snapshot = engine.snapshot().expect("no snapshot");
        assert_eq!(snapshot.elapsed_ms, configured);
        assert!(!engine.is_running());
        assert_eq!(snapshot.display.hours, 99);
        assert_eq!(snapshot.display.seconds, 5);
    }

    #[test]
    fn test_reset_stopwatch_zeroes() {
        let (engine, _) = test_engine(ChronographKind::Stopwatch, 5_000, false);
        assert_eq!(engine.snapshot().expect("no snapshot").elapsed_ms, 5_000);

        let generation = engine.apply_start().expect("start refused");
        engine.tick(generation);
        engine.reset();

        let snapshot = engine.snapshot().expect("no snapshot");
        assert_eq!(snapshot.elapsed_ms, 0);
        assert_eq!(snapshot.display, from_milliseconds(0));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_edit_minutes_two_keystrokes_clamp() {
        let (engine, _) = test_engine(ChronographKind::Timer, 3_600_000, false);

        // "7" then "5" with the caret cycling 0 -> 1 composes 75, clamped to 59
        assert_eq!(engine.edit_field(TimeField::Minutes, "7", Some(0)), Some(59));
        assert_eq!(engine.edit_field(TimeField::Minutes, "5", Some(1)), Some(59));

        let snapshot = engine.snapshot().expect("no snapshot");
        assert_eq!(snapshot.display.minutes, 59);
        assert_eq!(snapshot.elapsed_ms, to_milliseconds(1, 59, 0));
    }

    #[test]
    fn test_edit_hours_allows_up_to_99() {
        let (engine, _) = test_engine(ChronographKind::Timer, 3_600_000, false);

        assert_eq!(engine.edit_field(TimeField::Hours, "9", Some(0)), Some(91));
        assert_eq!(engine.edit_field(TimeField::Hours, "9", Some(1)), Some(99));
        assert_eq!(
            engine.snapshot().expect("no snapshot").elapsed_ms,
            to_milliseconds(99, 0, 0)
        );
    }

    #[test]
    fn test_edit_appends_at_trailing_caret() {
        let (engine, _) = test_engine(ChronographKind::Timer, 3_600_000, false);

        // No caret: last digit shifts left, the key enters on the right
        assert_eq!(engine.edit_field(TimeField::Seconds, "1", None), Some(1));
        assert_eq!(engine.edit_field(TimeField::Seconds, "2", None), Some(12));
        assert_eq!(engine.edit_field(TimeField::Seconds, "3", None), Some(23));
    }

    #[test]
    fn test_edit_rejects_unacceptable_input() {
        let (engine, _) = test_engine(ChronographKind::Timer, 3_600_000, false);

        // Non-accepted keys are suppressed
        assert_eq!(engine.edit_field(TimeField::Minutes, "x", Some(0)), None);
        assert_eq!(engine.edit_field(TimeField::Minutes, "Escape", Some(0)), None);

        // Not editable while running
        let _generation = engine.apply_start().expect("start refused");
        assert_eq!(engine.edit_field(TimeField::Minutes, "7", Some(0)), None);
        engine.pause();

        // Stopwatches have no editable fields
        let (stopwatch, _) = test_engine(ChronographKind::Stopwatch, 0, false);
        assert_eq!(stopwatch.edit_field(TimeField::Minutes, "7", Some(0)), None);
    }

    #[test]
    fn test_edit_control_key_restarts_composition() {
        let (engine, _) = test_engine(ChronographKind::Timer, 3_600_000, false);

        assert_eq!(engine.edit_field(TimeField::Minutes, "7", Some(0)), Some(59));
        // Backspace keeps the stored value but drops the raw composition
        assert_eq!(
            engine.edit_field(TimeField::Minutes, "Backspace", Some(1)),
            Some(59)
        );
        // Composition restarts from the clamped value "59"
        assert_eq!(engine.edit_field(TimeField::Minutes, "5", Some(1)), Some(55));
    }

    #[test]
    fn test_edited_timer_becomes_startable() {
        let (engine, _) = test_engine(ChronographKind::Timer, 0, false);
        assert!(engine.apply_start().is_none());

        engine.edit_field(TimeField::Seconds, "5", Some(1));
        assert_eq!(engine.snapshot().expect("no snapshot").elapsed_ms, 5_000);
        assert!(engine.apply_start().is_some());
    }

    #[test]
    fn test_rename_is_local_until_committed() {
        let (engine, _) = test_engine(ChronographKind::Timer, 3_600_000, false);
        engine.rename("Tea");
        assert_eq!(engine.snapshot().expect("no snapshot").name, "Tea");
        // No DB attached: commit must still be safe
        engine.commit_rename();
    }

    // ============================================
    // DATABASE
    // ============================================

    #[test]
    fn test_migrations_seed_defaults() {
        let (_dir, db) = test_db("seed");

        let settings = db.fetch_settings().expect("no settings row");
        assert_eq!(settings.theme, Theme::System);
        assert!(!settings.show_app_in_system_tray);
        assert!(!settings.notify_on_timer_complete);
        assert!(!settings.created_at.is_empty());

        let workspace = db.fetch_current_workspace().expect("no workspace seeded");
        assert!(workspace.is_selected);
        assert_eq!(workspace.title, "Default");
    }

    #[test]
    fn test_chronograph_crud() {
        let (_dir, db) = test_db("crud");
        let workspace = db.fetch_current_workspace().expect("no workspace");

        let input = ChronographInput {
            workspace_id: workspace.id,
            name: "Timer".to_string(),
            kind: ChronographKind::Timer,
            state: ChronographState::Paused,
            duration: 3_600_000,
            is_favourite: false,
        };
        let first = db.insert_chronograph(&input).expect("insert failed");
        assert!(first.id > 0);
        assert!(!first.created_at.is_empty());
        let second = db.insert_chronograph(&input).expect("insert failed");
        assert!(second.id > first.id);

        // Newest first
        let rows = db
            .fetch_chronographs(workspace.id, ChronographKind::Timer)
            .expect("fetch failed");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, second.id);

        // Stopwatches are a disjoint display group
        let stopwatches = db
            .fetch_chronographs(workspace.id, ChronographKind::Stopwatch)
            .expect("fetch failed");
        assert!(stopwatches.is_empty());

        let update = ChronographUpdate {
            name: "Tea timer".to_string(),
            kind: ChronographKind::Timer,
            state: ChronographState::Active,
            duration: 120_000,
            is_favourite: true,
        };
        assert!(db
            .update_chronograph(workspace.id, first.id, &update)
            .expect("update failed"));
        let rows = db
            .fetch_chronographs(workspace.id, ChronographKind::Timer)
            .expect("fetch failed");
        let updated = rows.iter().find(|c| c.id == first.id).expect("row gone");
        assert_eq!(updated.name, "Tea timer");
        assert_eq!(updated.duration, 120_000);
        assert_eq!(updated.state, ChronographState::Active);

        // Wrong workspace matches nothing
        assert!(!db
            .update_chronograph(workspace.id + 1, first.id, &update)
            .expect("update failed"));

        assert!(db
            .delete_chronograph(workspace.id, first.id)
            .expect("delete failed"));
        assert!(!db
            .delete_chronograph(workspace.id, first.id)
            .expect("delete failed"));
    }

    #[test]
    fn test_workspace_selection_is_exclusive() {
        let (_dir, db) = test_db("workspaces");
        let seeded = db.fetch_current_workspace().expect("no workspace");

        let created = db
            .insert_workspace(&WorkspaceInput {
                title: "Side project".to_string(),
                description: "".to_string(),
                is_favourite: false,
                is_selected: true,
            })
            .expect("insert failed");

        let current = db.fetch_current_workspace().expect("no current workspace");
        assert_eq!(current.id, created.id);

        let all = db.fetch_workspaces().expect("fetch failed");
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|w| w.is_selected).count(), 1);
        assert!(!all.iter().any(|w| w.id == seeded.id && w.is_selected));
    }

    #[test]
    fn test_workspace_delete_cascades() {
        let (_dir, db) = test_db("cascade");
        let workspace = db.fetch_current_workspace().expect("no workspace");
        db.insert_chronograph(&ChronographInput {
            workspace_id: workspace.id,
            name: "Timer".to_string(),
            kind: ChronographKind::Timer,
            state: ChronographState::Paused,
            duration: 1000,
            is_favourite: false,
        })
        .expect("insert failed");

        assert!(db.delete_workspace(workspace.id).expect("delete failed"));
        let rows = db
            .fetch_chronographs(workspace.id, ChronographKind::Timer)
            .expect("fetch failed");
        assert!(rows.is_empty());
    }

    #[test]
    fn test_settings_partial_update() {
        let (_dir, db) = test_db("settings");

        assert!(db
            .update_settings(&UserSettingsUpdate {
                notify_on_timer_complete: Some(true),
                ..UserSettingsUpdate::default()
            })
            .expect("update failed"));

        let settings = db.fetch_settings().expect("fetch failed");
        assert!(settings.notify_on_timer_complete);
        assert_eq!(settings.theme, Theme::System);
        assert!(!settings.show_app_in_system_tray);

        assert!(db
            .update_settings(&UserSettingsUpdate {
                theme: Some(Theme::Dark),
                ..UserSettingsUpdate::default()
            })
            .expect("update failed"));
        let settings = db.fetch_settings().expect("fetch failed");
        assert_eq!(settings.theme, Theme::Dark);
        assert!(settings.notify_on_timer_complete);
    }

    // ============================================
    // COLLECTION MANAGER + TABS
    // ============================================

    fn test_manager(name: &str) -> (tempfile::TempDir, Arc<Database>, ChronographManager, i64) {
        let (dir, db) = test_db(name);
        let workspace = db.fetch_current_workspace().expect("no workspace");
        let manager = ChronographManager::new(db.clone(), test_settings(false), None);
        (dir, db, manager, workspace.id)
    }

    #[test]
    fn test_manager_display_mode_transitions() {
        let (_dir, _db, manager, workspace_id) = test_manager("display");

        let view = manager
            .refresh(workspace_id, ChronographKind::Timer)
            .expect("refresh failed");
        assert_eq!(view.display_mode, DisplayMode::Empty);
        assert!(view.widgets.is_empty());

        let view = manager.add().expect("add failed");
        assert_eq!(view.display_mode, DisplayMode::Enlarged);
        assert!(view.widgets[0].enlarged);

        let view = manager.add().expect("add failed");
        assert_eq!(view.display_mode, DisplayMode::Grid);
        assert!(view.widgets.iter().all(|w| !w.enlarged));

        // Deleting back down re-enlarges, then falls back to empty
        let second = view.widgets[1].chronograph.id;
        let view = manager.remove(second).expect("remove failed");
        assert_eq!(view.display_mode, DisplayMode::Enlarged);

        let last = view.widgets[0].chronograph.id;
        let view = manager.remove(last).expect("remove failed");
        assert_eq!(view.display_mode, DisplayMode::Empty);
        assert!(view.widgets.is_empty());
    }

    #[test]
    fn test_manager_add_uses_kind_defaults_and_persists() {
        let (_dir, db, manager, workspace_id) = test_manager("defaults");

        manager
            .refresh(workspace_id, ChronographKind::Timer)
            .expect("refresh failed");
        let view = manager.add().expect("add failed");
        let widget = &view.widgets[0].chronograph;
        assert_eq!(widget.name, "Timer");
        assert_eq!(widget.kind, ChronographKind::Timer);
        assert_eq!(widget.elapsed_ms, 3_600_000);
        assert_eq!(widget.state, ChronographState::Paused);

        // Two-phase reconcile: the rendered id is the DB-assigned one
        let rows = db
            .fetch_chronographs(workspace_id, ChronographKind::Timer)
            .expect("fetch failed");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, widget.id);
        assert_eq!(rows[0].duration, 3_600_000);

        manager
            .refresh(workspace_id, ChronographKind::Stopwatch)
            .expect("refresh failed");
        let view = manager.add().expect("add failed");
        let widget = &view.widgets[0].chronograph;
        assert_eq!(widget.name, "Stopwatch");
        assert_eq!(widget.kind, ChronographKind::Stopwatch);
        assert_eq!(widget.elapsed_ms, 0);
    }

    #[test]
    fn test_manager_remove_deletes_from_store() {
        let (_dir, db, manager, workspace_id) = test_manager("remove");

        manager
            .refresh(workspace_id, ChronographKind::Timer)
            .expect("refresh failed");
        let view = manager.add().expect("add failed");
        let id = view.widgets[0].chronograph.id;

        manager.remove(id).expect("remove failed");
        assert!(manager.engine(id).is_none());
        let rows = db
            .fetch_chronographs(workspace_id, ChronographKind::Timer)
            .expect("fetch failed");
        assert!(rows.is_empty());
    }

    #[test]
    fn test_manager_refresh_discards_previous_engines() {
        let (_dir, _db, manager, workspace_id) = test_manager("discard");

        manager
            .refresh(workspace_id, ChronographKind::Timer)
            .expect("refresh failed");
        let view = manager.add().expect("add failed");
        let id = view.widgets[0].chronograph.id;
        let engine = manager.engine(id).expect("engine missing");
        let generation = engine.apply_start().expect("start refused");
        assert!(engine.is_running());

        // Kind switch: no state carries over, the old engine is torn down
        manager
            .refresh(workspace_id, ChronographKind::Stopwatch)
            .expect("refresh failed");
        assert!(!engine.is_running());
        assert!(!engine.tick(generation));
        assert!(manager.engine(id).is_none());

        // Switching back re-reads the persisted row
        let view = manager
            .refresh(workspace_id, ChronographKind::Timer)
            .expect("refresh failed");
        assert_eq!(view.widgets.len(), 1);
        assert_eq!(view.widgets[0].chronograph.id, id);
    }

    #[test]
    fn test_manager_pause_all_mirrors_elapsed() {
        let (_dir, db, manager, workspace_id) = test_manager("pause_all");

        manager
            .refresh(workspace_id, ChronographKind::Timer)
            .expect("refresh failed");
        let view = manager.add().expect("add failed");
        let id = view.widgets[0].chronograph.id;
        let engine = manager.engine(id).expect("engine missing");
        let generation = engine.apply_start().expect("start refused");
        engine.tick(generation);
        assert!(manager.any_running());

        manager.pause_all();
        assert!(!manager.any_running());
        let rows = db
            .fetch_chronographs(workspace_id, ChronographKind::Timer)
            .expect("fetch failed");
        assert_eq!(rows[0].duration, 3_599_000);
        assert_eq!(rows[0].state, ChronographState::Paused);
    }

    #[test]
    fn test_engine_persists_on_pause_and_completion() {
        let (_dir, db, manager, workspace_id) = test_manager("mirror");

        manager
            .refresh(workspace_id, ChronographKind::Timer)
            .expect("refresh failed");
        let view = manager.add().expect("add failed");
        let id = view.widgets[0].chronograph.id;
        let engine = manager.engine(id).expect("engine missing");

        // Short countdown: 2 ticks to completion
        engine.reset();
        engine.edit_field(TimeField::Hours, "0", Some(1));
        engine.edit_field(TimeField::Seconds, "2", Some(1));
        let generation = engine.apply_start().expect("start refused");
        engine.tick(generation);
        engine.tick(generation);

        let rows = db
            .fetch_chronographs(workspace_id, ChronographKind::Timer)
            .expect("fetch failed");
        assert_eq!(rows[0].duration, 0);
        assert_eq!(rows[0].state, ChronographState::Paused);
    }

    #[test]
    fn test_tab_selector_mapping() {
        let tabs = TabSelector::new();
        assert_eq!(tabs.index(), 0);
        assert_eq!(tabs.kind(), ChronographKind::Timer);

        assert_eq!(tabs.select(1), ChronographKind::Stopwatch);
        assert_eq!(tabs.index(), 1);

        assert_eq!(tabs.select(0), ChronographKind::Timer);
        // Out-of-range indices clamp onto the second tab
        assert_eq!(tabs.select(5), ChronographKind::Stopwatch);
        assert_eq!(tabs.index(), 1);
    }
}
