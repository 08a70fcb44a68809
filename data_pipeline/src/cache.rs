// src/cache.rs

use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name the data client caches under.
pub const DEFAULT_CACHE_NAME: &str = "yfinance-rs";

/// Where the data client keeps its on-disk cache: `%LOCALAPPDATA%\<name>`
/// on Windows, `~/.cache/<name>` everywhere else.
pub fn cache_dir_for(
    windows: bool,
    local_app_data: Option<PathBuf>,
    home: Option<PathBuf>,
    name: &str,
) -> Option<PathBuf> {
    if windows {
        local_app_data.map(|dir| dir.join(name))
    } else {
        home.map(|dir| dir.join(".cache").join(name))
    }
}

pub fn provider_cache_dir(name: &str) -> Option<PathBuf> {
    cache_dir_for(
        cfg!(windows),
        std::env::var_os("LOCALAPPDATA").map(PathBuf::from),
        dirs::home_dir(),
        name,
    )
}

/// Best effort: failures are logged and otherwise ignored.
pub fn clear_cache_dir(dir: &Path) {
    if !dir.exists() {
        return;
    }
    match std::fs::remove_dir_all(dir) {
        Ok(()) => info!("Cleared provider cache at: {}", dir.display()),
        Err(e) => warn!("Could not clear cache (non-critical): {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_dir_for_platforms() {
        let windows = cache_dir_for(
            true,
            Some(PathBuf::from("C:/Users/me/AppData/Local")),
            Some(PathBuf::from("C:/Users/me")),
            "yfinance-rs",
        );
        assert_eq!(windows, Some(PathBuf::from("C:/Users/me/AppData/Local/yfinance-rs")));

        let unix = cache_dir_for(false, None, Some(PathBuf::from("/home/me")), "yfinance-rs");
        assert_eq!(unix, Some(PathBuf::from("/home/me/.cache/yfinance-rs")));

        assert_eq!(cache_dir_for(true, None, Some(PathBuf::from("/home/me")), "x"), None);
    }

    #[test]
    fn test_clear_cache_dir_removes_tree() {
        let root = tempfile::tempdir().unwrap();
        let cache = root.path().join("yfinance-rs");
        std::fs::create_dir_all(cache.join("nested")).unwrap();
        std::fs::write(cache.join("nested").join("tz.json"), "{}").unwrap();

        clear_cache_dir(&cache);

        assert!(!cache.exists());
        assert!(root.path().exists());
    }

    #[test]
    fn test_clear_missing_cache_dir_is_noop() {
        let root = tempfile::tempdir().unwrap();
        clear_cache_dir(&root.path().join("does-not-exist"));
    }

    #[test]
    fn test_failed_removal_is_swallowed() {
        // A plain file where the cache directory should be cannot be removed
        // as a directory tree
        let root = tempfile::tempdir().unwrap();
        let cache = root.path().join("yfinance-rs");
        std::fs::write(&cache, "not a directory").unwrap();

        clear_cache_dir(&cache);

        assert_eq!(std::fs::read_to_string(&cache).unwrap(), "not a directory");
    }
}
