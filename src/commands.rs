use crate::engine::TimeField;
use crate::manager::ManagerView;
use crate::models::{
    Chronograph, ChronographInput, ChronographKind, ChronographUpdate, UserSettings,
    UserSettingsUpdate, Workspace, WorkspaceInput,
};
use crate::AppContext;
use tauri::State;
use tracing::info;

// ============================================
// CHRONOGRAPH PERSISTENCE
// ============================================

#[tauri::command(rename_all = "snake_case")]
pub async fn fetch_all_chronographs(
    ctx: State<'_, AppContext>,
    workspace_id: i64,
    kind: ChronographKind,
) -> Result<Vec<Chronograph>, String> {
    ctx.db
        .fetch_chronographs(workspace_id, kind)
        .map_err(|e| format!("Failed to fetch chronographs: {}", e))
}

#[tauri::command(rename_all = "snake_case")]
pub async fn add_chronograph(
    ctx: State<'_, AppContext>,
    chronograph: ChronographInput,
) -> Result<Chronograph, String> {
    ctx.db
        .insert_chronograph(&chronograph)
        .map_err(|e| format!("Failed to add chronograph: {}", e))
}

#[tauri::command(rename_all = "snake_case")]
pub async fn update_chronograph(
    ctx: State<'_, AppContext>,
    workspace_id: i64,
    id: i64,
    chronograph: ChronographUpdate,
) -> Result<bool, String> {
    ctx.db
        .update_chronograph(workspace_id, id, &chronograph)
        .map_err(|e| format!("Failed to update chronograph: {}", e))
}

#[tauri::command(rename_all = "snake_case")]
pub async fn delete_chronograph(
    ctx: State<'_, AppContext>,
    workspace_id: i64,
    id: i64,
) -> Result<bool, String> {
    ctx.db
        .delete_chronograph(workspace_id, id)
        .map_err(|e| format!("Failed to delete chronograph: {}", e))
}

// ============================================
// WORKSPACES
// ============================================

#[tauri::command(rename_all = "snake_case")]
pub async fn fetch_all_workspaces(ctx: State<'_, AppContext>) -> Result<Vec<Workspace>, String> {
    ctx.db
        .fetch_workspaces()
        .map_err(|e| format!("Failed to fetch workspaces: {}", e))
}

#[tauri::command(rename_all = "snake_case")]
pub async fn fetch_current_workspace(ctx: State<'_, AppContext>) -> Result<Workspace, String> {
    ctx.db
        .fetch_current_workspace()
        .map_err(|e| format!("Failed to fetch current workspace: {}", e))
}

#[tauri::command(rename_all = "snake_case")]
pub async fn add_workspace(
    ctx: State<'_, AppContext>,
    workspace: WorkspaceInput,
) -> Result<Workspace, String> {
    ctx.db
        .insert_workspace(&workspace)
        .map_err(|e| format!("Failed to add workspace: {}", e))
}

#[tauri::command(rename_all = "snake_case")]
pub async fn update_workspace(
    ctx: State<'_, AppContext>,
    id: i64,
    workspace: WorkspaceInput,
) -> Result<bool, String> {
    ctx.db
        .update_workspace(id, &workspace)
        .map_err(|e| format!("Failed to update workspace: {}", e))
}

#[tauri::command(rename_all = "snake_case")]
pub async fn delete_workspace(ctx: State<'_, AppContext>, id: i64) -> Result<bool, String> {
    ctx.db
        .delete_workspace(id)
        .map_err(|e| format!("Failed to delete workspace: {}", e))
}

// ============================================
// SETTINGS
// ============================================

#[tauri::command(rename_all = "snake_case")]
pub async fn fetch_user_settings(ctx: State<'_, AppContext>) -> Result<UserSettings, String> {
    let settings = ctx
        .db
        .fetch_settings()
        .map_err(|e| format!("Failed to fetch settings: {}", e))?;

    // Keep the in-memory copy the engines read for the notification gate
    // in step with the store.
    if let Ok(mut current) = ctx.settings.lock() {
        *current = settings.clone();
    }
    Ok(settings)
}

#[tauri::command(rename_all = "snake_case")]
pub async fn update_user_settings(
    ctx: State<'_, AppContext>,
    settings: UserSettingsUpdate,
) -> Result<bool, String> {
    let updated = ctx
        .db
        .update_settings(&settings)
        .map_err(|e| format!("Failed to update settings: {}", e))?;

    if updated {
        let stored = ctx
            .db
            .fetch_settings()
            .map_err(|e| format!("Failed to re-read settings: {}", e))?;
        if let Ok(mut current) = ctx.settings.lock() {
            *current = stored;
        }
    }
    Ok(updated)
}

// ============================================
// TABS + COLLECTION
// ============================================

/// Select a tab (0 = timers, 1 = stopwatches) and re-render the collection
/// for the current workspace. The sole trigger for a kind re-fetch.
#[tauri::command(rename_all = "snake_case")]
pub async fn select_tab(ctx: State<'_, AppContext>, index: usize) -> Result<ManagerView, String> {
    let kind = ctx.tabs.select(index);
    let workspace = ctx
        .db
        .fetch_current_workspace()
        .map_err(|e| format!("Failed to fetch current workspace: {}", e))?;

    info!("[MANAGER] Tab {} selected ({})", index, kind.as_str());
    ctx.manager.refresh(workspace.id, kind)
}

#[tauri::command(rename_all = "snake_case")]
pub async fn get_active_tab(ctx: State<'_, AppContext>) -> Result<usize, String> {
    Ok(ctx.tabs.index())
}

#[tauri::command(rename_all = "snake_case")]
pub async fn add_time_graph(ctx: State<'_, AppContext>) -> Result<ManagerView, String> {
    ctx.manager.add()
}

#[tauri::command(rename_all = "snake_case")]
pub async fn remove_time_graph(ctx: State<'_, AppContext>, id: i64) -> Result<ManagerView, String> {
    ctx.manager.remove(id)
}

#[tauri::command(rename_all = "snake_case")]
pub async fn get_chronograph_snapshots(ctx: State<'_, AppContext>) -> Result<ManagerView, String> {
    ctx.manager.view()
}

// ============================================
// ENGINE SURFACE
// ============================================

#[tauri::command(rename_all = "snake_case")]
pub async fn start_chronograph(ctx: State<'_, AppContext>, id: i64) -> Result<(), String> {
    let engine = ctx
        .manager
        .engine(id)
        .ok_or_else(|| format!("Unknown chronograph: {}", id))?;
    engine.start();
    Ok(())
}

#[tauri::command(rename_all = "snake_case")]
pub async fn pause_chronograph(ctx: State<'_, AppContext>, id: i64) -> Result<(), String> {
    let engine = ctx
        .manager
        .engine(id)
        .ok_or_else(|| format!("Unknown chronograph: {}", id))?;
    engine.pause();
    Ok(())
}

#[tauri::command(rename_all = "snake_case")]
pub async fn reset_chronograph(ctx: State<'_, AppContext>, id: i64) -> Result<(), String> {
    let engine = ctx
        .manager
        .engine(id)
        .ok_or_else(|| format!("Unknown chronograph: {}", id))?;
    engine.reset();
    Ok(())
}

/// One keystroke into an hours/minutes/seconds field of a paused timer.
/// Returns the field value after the keystroke, or None when the key was
/// suppressed.
#[tauri::command(rename_all = "snake_case")]
pub async fn edit_chronograph_field(
    ctx: State<'_, AppContext>,
    id: i64,
    field: TimeField,
    key: String,
    caret: Option<usize>,
) -> Result<Option<u64>, String> {
    let engine = ctx
        .manager
        .engine(id)
        .ok_or_else(|| format!("Unknown chronograph: {}", id))?;
    Ok(engine.edit_field(field, &key, caret))
}

#[tauri::command(rename_all = "snake_case")]
pub async fn rename_chronograph(
    ctx: State<'_, AppContext>,
    id: i64,
    name: String,
) -> Result<(), String> {
    let engine = ctx
        .manager
        .engine(id)
        .ok_or_else(|| format!("Unknown chronograph: {}", id))?;
    engine.rename(&name);
    Ok(())
}

#[tauri::command(rename_all = "snake_case")]
pub async fn commit_chronograph_name(ctx: State<'_, AppContext>, id: i64) -> Result<(), String> {
    let engine = ctx
        .manager
        .engine(id)
        .ok_or_else(|| format!("Unknown chronograph: {}", id))?;
    engine.commit_rename();
    Ok(())
}

// ============================================
// NOTIFICATIONS
// ============================================

#[tauri::command(rename_all = "snake_case")]
pub async fn request_notification_permission(ctx: State<'_, AppContext>) -> Result<bool, String> {
    Ok(ctx.notifier.ensure_permission())
}

#[tauri::command(rename_all = "snake_case")]
pub async fn show_notification(
    ctx: State<'_, AppContext>,
    title: String,
    body: String,
) -> Result<(), String> {
    use crate::notify::Notifier;
    ctx.notifier.notify(&title, &body);
    Ok(())
}
