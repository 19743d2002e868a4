use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Sink for user-facing notifications. Delivery is best-effort: a failed
/// send never propagates into engine state.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Desktop notifier over tauri-plugin-notification. Permission is checked
/// once and cached; a missing grant is re-requested on the next send and
/// the send silently no-ops when the user declines.
pub struct DesktopNotifier {
    app: tauri::AppHandle,
    permission_granted: AtomicBool,
}

impl DesktopNotifier {
    pub fn new(app: tauri::AppHandle) -> Self {
        Self {
            app,
            permission_granted: AtomicBool::new(false),
        }
    }

    /// Check the cached grant, then the OS; request when absent.
    pub fn ensure_permission(&self) -> bool {
        use tauri_plugin_notification::{NotificationExt, PermissionState};

        if self.permission_granted.load(Ordering::Relaxed) {
            return true;
        }

        let granted = match self.app.notification().permission_state() {
            Ok(PermissionState::Granted) => true,
            Ok(_) => match self.app.notification().request_permission() {
                Ok(state) => matches!(state, PermissionState::Granted),
                Err(e) => {
                    warn!("[NOTIFY] Failed to request notification permission: {}", e);
                    false
                }
            },
            Err(e) => {
                warn!("[NOTIFY] Failed to read notification permission state: {}", e);
                false
            }
        };

        self.permission_granted.store(granted, Ordering::Relaxed);
        granted
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) {
        use tauri_plugin_notification::NotificationExt;

        if !self.ensure_permission() {
            return;
        }

        if let Err(e) = self
            .app
            .notification()
            .builder()
            .title(title)
            .body(body)
            .show()
        {
            warn!("[NOTIFY] Failed to send notification: {}", e);
        }
    }
}
