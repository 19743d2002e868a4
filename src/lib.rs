use std::panic;
use std::sync::{Arc, Mutex, OnceLock};
use tauri::{Listener, Manager, RunEvent};
use tracing::{error, info, warn};

mod commands;
mod database;
mod engine;
mod ipc;
mod manager;
mod models;
mod notify;
mod timecode;

use crate::manager::{ChronographManager, TabSelector};
use crate::models::UserSettings;
use crate::notify::{DesktopNotifier, Notifier};
use commands::*;
pub use database::Database;

/// Panic recovery: pause (and thereby mirror) running chronographs when a
/// non-fatal panic occurs.
static PANIC_MANAGER: OnceLock<Arc<ChronographManager>> = OnceLock::new();

#[cfg(test)]
mod tests;

/// Explicit top-level state: constructed once in setup and handed to the
/// commands through Tauri's managed state, never through ambient globals.
pub struct AppContext {
    pub db: Arc<Database>,
    pub settings: Arc<Mutex<UserSettings>>,
    pub manager: Arc<ChronographManager>,
    pub tabs: TabSelector,
    pub notifier: Arc<DesktopNotifier>,
}

// ============================================
// SYSTEM TRAY
// ============================================

fn setup_tray(app: &tauri::App) -> tauri::Result<()> {
    use tauri::menu::{Menu, MenuItem};
    use tauri::tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent};

    let hide_item = MenuItem::with_id(app, "hide", "Hide Windows", true, None::<&str>)?;
    let quit_item = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
    let menu = Menu::with_items(app, &[&hide_item, &quit_item])?;

    let Some(icon) = app.default_window_icon() else {
        warn!("[TRAY] No default window icon available, skipping tray setup");
        return Ok(());
    };

    TrayIconBuilder::new()
        .icon(icon.clone())
        .menu(&menu)
        .on_menu_event(|app, event| match event.id.as_ref() {
            "hide" => {
                for window in app.webview_windows().values() {
                    if let Err(e) = window.hide() {
                        warn!("[TRAY] Failed to hide window: {}", e);
                    }
                }
            }
            "quit" => {
                app.exit(0);
            }
            _ => {}
        })
        .on_tray_icon_event(|tray, event| {
            // Left click focuses the main window
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                let app = tray.app_handle();
                if let Some(window) = app.get_webview_window("main") {
                    let _ = window.show();
                    let _ = window.set_focus();
                }
            }
        })
        .build(app)?;

    info!("[TRAY] System tray enabled");
    Ok(())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Panic recovery: mirror running chronograph state before the panic unwinds
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        if let Some(manager) = PANIC_MANAGER.get() {
            manager.pause_all();
            eprintln!("[PANIC_RECOVERY] Chronograph state mirrored before panic");
        }
        default_hook(panic_info);
    }));

    // Default to info when RUST_LOG is unset so [DB]/[MANAGER] lines are visible
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    #[cfg(desktop)]
    let builder = tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            // Focus existing window when user tries to launch second instance
            if let Some(win) = app.get_webview_window("main") {
                let _ = win.show();
                let _ = win.set_focus();
            }
        }))
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_notification::init())
        .plugin(tauri_plugin_process::init());
    #[cfg(not(desktop))]
    let builder = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_notification::init());

    builder
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir().map_err(|e| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Failed to get app data directory: {}", e),
                )
            })?;
            std::fs::create_dir_all(&app_data_dir).map_err(|e| {
                let kind = e.kind();
                let msg = match kind {
                    std::io::ErrorKind::PermissionDenied => {
                        "Permission denied. Check app data directory is writable."
                    }
                    std::io::ErrorKind::StorageFull => "Disk full. Free space on drive.",
                    _ => "Failed to create app data directory.",
                };
                std::io::Error::new(
                    kind,
                    format!("{} Path: {} — {}", msg, app_data_dir.display(), e),
                )
            })?;

            let db_path = app_data_dir.join("tempo.db");
            let db_path_str = db_path.to_str().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Database path contains invalid UTF-8: {}", db_path.display()),
                )
            })?;

            // Auto-recovery from corrupted DB: on integrity/corruption failure, backup and retry once
            let db = match Database::new(db_path_str) {
                Ok(d) => Arc::new(d),
                Err(e) => {
                    let err_str = e.to_string();
                    let is_corruption =
                        err_str.contains("corruption") || err_str.contains("integrity");
                    if !is_corruption || !db_path.exists() {
                        return Err(Box::new(std::io::Error::new(
                            std::io::ErrorKind::Other,
                            format!("Failed to initialize database: {}", e),
                        )));
                    }
                    let backup_path = app_data_dir.join(format!(
                        "tempo.db.corrupted.{}",
                        chrono::Utc::now().timestamp()
                    ));
                    if let Err(rename_e) = std::fs::rename(&db_path, &backup_path) {
                        warn!(
                            "[DB] Failed to rename corrupted DB to {:?}: {}",
                            backup_path, rename_e
                        );
                        return Err(Box::new(std::io::Error::new(
                            std::io::ErrorKind::Other,
                            format!("Database corrupted and could not backup: {}", e),
                        )));
                    }
                    info!(
                        "[DB] Corrupted DB backed up to {:?}, starting fresh",
                        backup_path
                    );
                    use tauri::Emitter;
                    let _ = app.handle().emit(crate::ipc::events::DB_RECOVERED, ());
                    Arc::new(Database::new(db_path_str).map_err(|e2| {
                        std::io::Error::new(
                            std::io::ErrorKind::Other,
                            format!("Failed to create fresh database: {}", e2),
                        )
                    })?)
                }
            };

            // Settings are loaded once here; the update command keeps this
            // copy current for the engines' notification gate.
            let settings = match db.fetch_settings() {
                Ok(s) => s,
                Err(e) => {
                    warn!("[SETUP] Failed to load settings, using defaults: {}", e);
                    UserSettings::default()
                }
            };
            let show_tray = settings.show_app_in_system_tray;
            let settings = Arc::new(Mutex::new(settings));

            let notifier = Arc::new(DesktopNotifier::new(app.handle().clone()));
            let manager = Arc::new(ChronographManager::new(
                db.clone(),
                settings.clone(),
                Some(notifier.clone() as Arc<dyn Notifier>),
            ));
            let tabs = TabSelector::new();

            // Panic recovery: register manager for mirror-on-panic
            let _ = PANIC_MANAGER.set(manager.clone());

            // Initial render: timers tab of the current workspace
            match db.fetch_current_workspace() {
                Ok(workspace) => {
                    if let Err(e) = manager.refresh(workspace.id, tabs.kind()) {
                        warn!("[SETUP] Initial chronograph fetch failed: {}", e);
                    }
                }
                Err(e) => warn!("[SETUP] Failed to resolve current workspace: {}", e),
            }

            // Mirror running chronographs when the window is closed
            let manager_for_close = manager.clone();
            let app_handle = app.handle().clone();
            app_handle.listen("tauri://close-requested", move |_event| {
                manager_for_close.pause_all();
                info!("[SHUTDOWN] Chronograph state mirrored on window close");
            });

            // One emit thread for the whole collection (not one per widget).
            // 100 ms + Skip; emits only while some clock is running.
            let manager_for_emit = manager.clone();
            let app_handle_for_emit = app.handle().clone();
            std::thread::spawn(move || {
                let rt = match tokio::runtime::Runtime::new() {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("[EMIT] Failed to create runtime for snapshot emit: {}", e);
                        return;
                    }
                };
                rt.block_on(async {
                    use tauri::Emitter;
                    use tokio::time::MissedTickBehavior;

                    let mut interval =
                        tokio::time::interval(tokio::time::Duration::from_millis(100));
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        interval.tick().await;
                        if !manager_for_emit.any_running() {
                            continue;
                        }
                        if let Ok(view) = manager_for_emit.view() {
                            let _ = app_handle_for_emit
                                .emit(crate::ipc::events::CHRONOGRAPH_STATE_UPDATE, &view);
                        }
                    }
                });
            });

            if show_tray {
                setup_tray(app)?;
            }

            app.manage(AppContext {
                db,
                settings,
                manager,
                tabs,
                notifier,
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Chronograph persistence
            fetch_all_chronographs,
            add_chronograph,
            update_chronograph,
            delete_chronograph,
            // Workspaces
            fetch_all_workspaces,
            fetch_current_workspace,
            add_workspace,
            update_workspace,
            delete_workspace,
            // Settings
            fetch_user_settings,
            update_user_settings,
            // Tabs + collection
            select_tab,
            get_active_tab,
            add_time_graph,
            remove_time_graph,
            get_chronograph_snapshots,
            // Engine surface
            start_chronograph,
            pause_chronograph,
            reset_chronograph,
            edit_chronograph_field,
            rename_chronograph,
            commit_chronograph_name,
            // Notifications
            request_notification_permission,
            show_notification
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| {
            // Graceful shutdown: mirror running chronographs on exit
            if let RunEvent::ExitRequested { .. } = event {
                if let Some(ctx) = app_handle.try_state::<AppContext>() {
                    ctx.manager.pause_all();
                    info!("[SHUTDOWN] Chronograph state mirrored on exit");
                }
            }
        });
}
