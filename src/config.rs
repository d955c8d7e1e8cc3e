use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Application-level constants
pub const APP_NAME: &str = "Laudo";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Overrides the directory holding the reference tables.
pub const DATA_DIR_ENV: &str = "LAUDO_DATA_DIR";

pub const PATTERNS_FILE: &str = "patterns.csv";
pub const GUIDELINES_FILE: &str = "guideline_map.csv";

/// Name of the table directory shipped next to the binary.
pub const RESOURCES_DIR: &str = "resources";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "laudo=debug,laudo_lib=debug,warn"
    } else {
        "laudo=info,laudo_lib=info,warn"
    }
}

/// Directory holding `patterns.csv` and `guideline_map.csv`.
///
/// `LAUDO_DATA_DIR` when set, then `resources/` beside the executable,
/// then `resources/` under the working directory.
pub fn data_dir() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    resolve_data_dir(std::env::var_os(DATA_DIR_ENV), exe_dir.as_deref())
}

fn resolve_data_dir(env_value: Option<OsString>, exe_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = env_value.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    match exe_dir.map(|d| d.join(RESOURCES_DIR)) {
        Some(beside_exe) if beside_exe.is_dir() => beside_exe,
        _ => PathBuf::from(RESOURCES_DIR),
    }
}

pub fn patterns_path() -> PathBuf {
    data_dir().join(PATTERNS_FILE)
}

pub fn guidelines_path() -> PathBuf {
    data_dir().join(GUIDELINES_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_paths_under_data_dir() {
        let dir = data_dir();
        assert!(patterns_path().starts_with(&dir));
        assert!(patterns_path().ends_with(PATTERNS_FILE));
        assert!(guidelines_path().ends_with(GUIDELINES_FILE));
    }

    #[test]
    fn env_override_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = resolve_data_dir(Some("/srv/laudo".into()), Some(tmp.path()));
        assert_eq!(dir, PathBuf::from("/srv/laudo"));
    }

    #[test]
    fn empty_env_is_ignored() {
        assert_eq!(resolve_data_dir(Some(OsString::new()), None), PathBuf::from(RESOURCES_DIR));
    }

    #[test]
    fn resources_beside_executable_are_preferred() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(RESOURCES_DIR)).unwrap();
        assert_eq!(resolve_data_dir(None, Some(tmp.path())), tmp.path().join(RESOURCES_DIR));
    }

    #[test]
    fn falls_back_to_working_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(resolve_data_dir(None, Some(tmp.path())), PathBuf::from(RESOURCES_DIR));
    }

    #[test]
    fn no_build_path_in_default() {
        let dir = resolve_data_dir(None, None);
        assert!(!dir.starts_with(env!("CARGO_MANIFEST_DIR")));
    }

    #[test]
    fn log_filter_covers_crate() {
        assert!(default_log_filter().contains("laudo_lib="));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
