use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "budget";
pub const APP_NAME: &str = "tracker";

pub const DATA_DIR_ENV: &str = "BUDGET_TRACKER_DATA_DIR";
pub const STORE_FILE: &str = "store.json";

pub fn data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(override_path) = std::env::var(DATA_DIR_ENV) {
        if !override_path.is_empty() {
            return Ok(PathBuf::from(override_path));
        }
    }
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .ok_or_else(|| anyhow::anyhow!("cannot determine data directory"))?;
    Ok(dirs.data_dir().to_path_buf())
}

/// `store.json` under `data_dir_override`, or under [`data_dir`].
pub fn store_path(data_dir_override: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = match data_dir_override {
        Some(dir) => dir.to_path_buf(),
        None => data_dir()?,
    };
    Ok(dir.join(STORE_FILE))
}
