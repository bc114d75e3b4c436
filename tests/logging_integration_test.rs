//! Integration tests for logging functionality
//!
//! A global subscriber can only be installed once per process, so this file
//! has exactly one test that calls `init_logging`.

use splitstore::config::LoggingConfig;
use splitstore::core::lock::LockKey;
use splitstore::domain::{Projection, RecordKey};
use splitstore::logging::init_logging;
use splitstore::{log_lock_outcome, log_record_edit};
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(!config.local_enabled);
    assert_eq!(config.local_rotation, "daily");
    assert_eq!(config.local_path, "/var/log/splitstore");
}

#[test]
fn test_file_logging_writes_json() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "hourly".to_string(),
    };

    let guard = init_logging("debug", &config).expect("Failed to initialize logging");
    assert!(guard.has_file_output());

    let key = RecordKey::new("a9c2f0e1-77b4-4f3e-9d61-0c2b5e8a1f00").unwrap();
    log_record_edit!(Projection::Deidentified, &key, true);
    log_lock_outcome!("export-job", LockKey::derive("export-job"), false);

    // A second installation is refused
    assert!(init_logging("info", &LoggingConfig::default()).is_err());

    drop(guard);

    assert!(log_path.exists());
    let files: Vec<_> = std::fs::read_dir(&log_path)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with("splitstore.log")
        })
        .collect();
    assert!(!files.is_empty());

    let contents = std::fs::read_to_string(files[0].path()).unwrap();
    // Full record keys never reach the log
    assert!(!contents.contains("a9c2f0e1-77b4-4f3e-9d61-0c2b5e8a1f00"));
}
