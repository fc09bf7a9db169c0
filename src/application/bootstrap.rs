use crate::domain::models::AppSettings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::store::{FileStore, SETTINGS_FILE};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_settings(&state_dir, &config_dir)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        state_dir,
        logs_dir,
    })
}

fn ensure_default_settings(state_dir: &Path, config_dir: &Path) -> Result<(), InfraError> {
    if config_dir.join(SETTINGS_FILE).exists() {
        return Ok(());
    }
    let store = FileStore::new(state_dir, config_dir);
    store.save_settings(&AppSettings::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "focusflow-bootstrap-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn bootstrap_creates_directories_and_default_settings() {
        let workspace = TempWorkspace::new();
        let result = bootstrap_workspace(&workspace.path).expect("bootstrap");

        assert!(result.config_dir.is_dir());
        assert!(result.state_dir.is_dir());
        assert!(result.logs_dir.is_dir());

        let store = FileStore::new(&result.state_dir, &result.config_dir);
        assert_eq!(store.load_settings(), AppSettings::default());
        assert!(result.config_dir.join(SETTINGS_FILE).exists());
    }

    #[test]
    fn bootstrap_preserves_existing_settings() {
        let workspace = TempWorkspace::new();
        let first = bootstrap_workspace(&workspace.path).expect("bootstrap");
        let store = FileStore::new(&first.state_dir, &first.config_dir);
        let settings = AppSettings {
            interval_minutes: 45,
            ..AppSettings::default()
        };
        store.save_settings(&settings).expect("save settings");

        let _ = bootstrap_workspace(&workspace.path).expect("second bootstrap");
        assert_eq!(store.load_settings(), settings);
    }
}
