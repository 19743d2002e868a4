use crate::engine::ChronographEngine;
use crate::models::{ChronographKind, ChronographState};
use crate::timecode::{self, MS_PER_SECOND};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Timer ticks once per second; the display has no finer granularity.
const TIMER_TICK: Duration = Duration::from_millis(1000);
/// Stopwatch ticks at 10 ms so hundredths render smoothly.
const STOPWATCH_TICK: Duration = Duration::from_millis(10);

/// Editable fields of a paused timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeField {
    Hours,
    Minutes,
    Seconds,
}

impl TimeField {
    fn max(&self) -> u64 {
        match self {
            TimeField::Hours => 99,
            TimeField::Minutes | TimeField::Seconds => 59,
        }
    }
}

impl ChronographEngine {
    /// Transition: Paused -> Running. Refused silently while already
    /// running (at most one tick task per engine) and for a timer at zero
    /// (the control is inert, not an error). Mirrors `state = active` to
    /// the persistence layer on success.
    pub fn start(self: &Arc<Self>) {
        let Some(generation) = self.apply_start() else {
            return;
        };

        self.spawn_tick_task(generation);
        self.persist_clock(ChronographState::Active);
    }

    /// Guard + state flip under one lock. Returns the new tick generation,
    /// or None when the start was refused.
    pub(crate) fn apply_start(&self) -> Option<u64> {
        let mut clock = match self.clock.lock() {
            Ok(clock) => clock,
            Err(e) => {
                warn!("[ENGINE] Clock mutex poisoned in start: {}", e);
                return None;
            }
        };

        if clock.running {
            // Idempotent: a second start while running must not produce a
            // second tick task.
            return None;
        }
        if self.kind() == ChronographKind::Timer && clock.elapsed_ms == 0 {
            return None;
        }

        clock.running = true;
        clock.edit_raw = None;
        if self.kind() == ChronographKind::Stopwatch {
            clock.session_base_ms = clock.elapsed_ms;
            clock.session_started = Some(Instant::now());
        }

        Some(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn spawn_tick_task(self: &Arc<Self>, generation: u64) {
        let period = match self.kind() {
            ChronographKind::Timer => TIMER_TICK,
            ChronographKind::Stopwatch => STOPWATCH_TICK,
        };

        let engine = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick of a tokio interval fires immediately; consume
            // it so the first real tick lands one full period after start.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                if !engine.tick(generation) {
                    break;
                }
            }
        });

        if let Ok(mut task) = self.tick_task.lock() {
            *task = Some(handle);
        }
    }

    /// One tick of the periodic callback. Returns false when the task
    /// should stop (cancelled, stale, or the timer completed).
    pub(crate) fn tick(&self, generation: u64) -> bool {
        let mut clock = match self.clock.lock() {
            Ok(clock) => clock,
            Err(_) => return false,
        };
        if !clock.running || self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }

        match self.kind() {
            ChronographKind::Timer => {
                clock.elapsed_ms = clock.elapsed_ms.saturating_sub(MS_PER_SECOND);
                clock.display = timecode::from_milliseconds(clock.elapsed_ms);

                if clock.elapsed_ms == 0 {
                    clock.running = false;
                    drop(clock);
                    self.on_timer_complete();
                    return false;
                }
                true
            }
            ChronographKind::Stopwatch => {
                // Recompute from the monotonic anchor rather than
                // accumulating tick periods; interval drift never compounds.
                if let Some(started) = clock.session_started {
                    let base = clock.session_base_ms;
                    clock.elapsed_ms = base + started.elapsed().as_millis() as u64;
                }
                clock.display = timecode::from_milliseconds(clock.elapsed_ms);
                true
            }
        }
    }

    /// Countdown reached zero: request the completion notification (gated
    /// on the user preference) and mirror `paused, 0`.
    fn on_timer_complete(&self) {
        let name = self
            .meta
            .lock()
            .map(|meta| meta.name.clone())
            .unwrap_or_default();

        let notify_enabled = self
            .settings
            .as_ref()
            .and_then(|settings| settings.lock().ok().map(|s| s.notify_on_timer_complete))
            .unwrap_or(false);

        if notify_enabled {
            if let Some(notifier) = &self.notifier {
                notifier.notify("Completed!", &format!("\"{}\" is done.", name));
            }
        }

        self.persist_clock(ChronographState::Paused);
    }

    /// Transition: Running -> Paused. No-op if not running. Cancels the
    /// tick task before returning and mirrors `paused, elapsed_ms`.
    pub fn pause(&self) {
        {
            let mut clock = match self.clock.lock() {
                Ok(clock) => clock,
                Err(e) => {
                    warn!("[ENGINE] Clock mutex poisoned in pause: {}", e);
                    return;
                }
            };
            if !clock.running {
                return;
            }
            clock.running = false;
            clock.session_started = None;
            self.generation.fetch_add(1, Ordering::SeqCst);
        }

        self.cancel_tick_task();
        self.persist_clock(ChronographState::Paused);
    }

    /// Re-arm: cancel any tick, restore the configured duration (timer) or
    /// zero (stopwatch). Does not persist by itself; the next explicit
    /// start/pause mirrors the state.
    pub fn reset(&self) {
        {
            let mut clock = match self.clock.lock() {
                Ok(clock) => clock,
                Err(e) => {
                    warn!("[ENGINE] Clock mutex poisoned in reset: {}", e);
                    return;
                }
            };
            clock.running = false;
            clock.session_started = None;
            clock.session_base_ms = 0;
            clock.edit_raw = None;
            clock.elapsed_ms = match self.kind() {
                ChronographKind::Timer => self.configured_ms(),
                ChronographKind::Stopwatch => 0,
            };
            clock.display = timecode::from_milliseconds(clock.elapsed_ms);
            self.generation.fetch_add(1, Ordering::SeqCst);
        }

        self.cancel_tick_task();
    }

    /// Widget teardown (delete/unmount): cancel the tick task without
    /// persisting anything.
    pub fn teardown(&self) {
        if let Ok(mut clock) = self.clock.lock() {
            clock.running = false;
            clock.session_started = None;
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.cancel_tick_task();
    }

    fn cancel_tick_task(&self) {
        if let Ok(mut task) = self.tick_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }

    /// Apply one keystroke to a hand-edited field of a paused timer.
    /// Digits, Backspace, Enter and ArrowLeft/ArrowRight are accepted; any
    /// other key is suppressed (None). A digit shifts into the two-digit
    /// value at the caret position; the result clamps to the field range
    /// and a non-numeric parse clamps to the field maximum. Returns the
    /// field's value after the keystroke.
    pub fn edit_field(&self, field: TimeField, key: &str, caret: Option<usize>) -> Option<u64> {
        if self.kind() != ChronographKind::Timer {
            return None;
        }

        let mut clock = self.clock.lock().ok()?;
        if clock.running {
            return None;
        }

        let current = match field {
            TimeField::Hours => clock.display.hours,
            TimeField::Minutes => clock.display.minutes,
            TimeField::Seconds => clock.display.seconds,
        };

        let is_digit = key.len() == 1 && key.as_bytes()[0].is_ascii_digit();
        let is_control = matches!(key, "Backspace" | "Enter" | "ArrowLeft" | "ArrowRight");
        if !is_digit && !is_control {
            return None;
        }
        if !is_digit {
            // Accepted but value-neutral; the composition restarts from the
            // stored (clamped) value on the next digit.
            clock.edit_raw = None;
            return Some(current);
        }

        // Compose against the raw typed digits, not the clamped value, so a
        // two-keystroke entry like 7,5 reads as 75 before clamping.
        let raw = match clock.edit_raw.take() {
            Some((last_field, raw)) if last_field == field => raw,
            _ => format!("{:02}", current),
        };
        let first = raw.chars().next().unwrap_or('0');
        let last = raw.chars().last().unwrap_or('0');

        let composed = match caret {
            Some(0) => format!("{}{}", key, last),
            Some(1) => format!("{}{}", first, key),
            _ => format!("{}{}", last, key),
        };

        let max = field.max();
        let value = composed
            .parse::<u64>()
            .map(|v| v.min(max))
            .unwrap_or(max);
        clock.edit_raw = Some((field, composed));

        match field {
            TimeField::Hours => clock.display.hours = value,
            TimeField::Minutes => clock.display.minutes = value,
            TimeField::Seconds => clock.display.seconds = value,
        }
        clock.display.hundredths = 0;
        // Keep the counter consistent with the display tuple.
        clock.elapsed_ms = timecode::to_milliseconds(
            clock.display.hours,
            clock.display.minutes,
            clock.display.seconds,
        );

        Some(value)
    }

    /// Local rename while the user types; nothing is persisted until
    /// `commit_rename`.
    pub fn rename(&self, name: &str) {
        if let Ok(mut meta) = self.meta.lock() {
            meta.name = name.to_string();
        }
    }

    /// Enter on the label input: persist the pending name together with the
    /// engine's current state and duration.
    pub fn commit_rename(&self) {
        let state = if self.is_running() {
            ChronographState::Active
        } else {
            ChronographState::Paused
        };
        self.persist_clock(state);
    }
}
