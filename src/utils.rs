//! Filesystem locations for the config file and the database.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use tracing::warn;

const APP_DIR: &str = "happns";
pub const DATA_DIR_ENV: &str = "HAPPNS_DATA_DIR";

static DATA_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let root = resolve_data_root(
        std::env::var_os(DATA_DIR_ENV).map(PathBuf::from),
        dirs::data_dir(),
    );
    if let Err(err) = fs::create_dir_all(&root) {
        warn!(path = %root.display(), "failed to create data root: {err}");
    }
    root
});

fn resolve_data_root(explicit: Option<PathBuf>, platform: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit.filter(|dir| !dir.as_os_str().is_empty()) {
        return dir;
    }
    platform.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

pub fn data_root() -> &'static Path {
    &DATA_ROOT
}

pub fn database_path() -> PathBuf {
    data_root().join("happns.sqlite")
}

pub fn config_path() -> PathBuf {
    data_root().join("config.json")
}

pub fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
