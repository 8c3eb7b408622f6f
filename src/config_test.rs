use super::*;

/// # Safety
/// Tests touching process env use unique keys or run the full var set in one test.
unsafe fn clear_rally_env() {
    unsafe {
        std::env::remove_var("RALLY_BACKEND_URL");
        std::env::remove_var("RALLY_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("RALLY_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("RALLY_VALIDATE_INTERVAL_SECS");
        std::env::remove_var("RALLY_RECONNECT_WINDOW_MS");
        std::env::remove_var("RALLY_EXPIRY_WARNING_MINS");
    }
}

#[test]
fn from_env_defaults_and_overrides() {
    unsafe { clear_rally_env() };
    let cfg = SessionConfig::from_env().unwrap();
    assert_eq!(cfg, SessionConfig::default());
    assert_eq!(cfg.backend_url, DEFAULT_BACKEND_URL);
    assert_eq!(cfg.validate_interval, Duration::from_secs(300));
    assert_eq!(cfg.reconnect_window, Duration::from_millis(2000));

    unsafe {
        std::env::set_var("RALLY_BACKEND_URL", "https://rally.example.test/");
        std::env::set_var("RALLY_REQUEST_TIMEOUT_SECS", "12");
        std::env::set_var("RALLY_VALIDATE_INTERVAL_SECS", "60");
        std::env::set_var("RALLY_RECONNECT_WINDOW_MS", "500");
        std::env::set_var("RALLY_EXPIRY_WARNING_MINS", "not-a-number");
    }
    let cfg = SessionConfig::from_env().unwrap();
    assert_eq!(cfg.backend_url, "https://rally.example.test");
    assert_eq!(cfg.request_timeout, Duration::from_secs(12));
    assert_eq!(cfg.validate_interval, Duration::from_secs(60));
    assert_eq!(cfg.reconnect_window, Duration::from_millis(500));
    assert_eq!(cfg.expiry_warning_mins, DEFAULT_EXPIRY_WARNING_MINS);

    unsafe {
        std::env::set_var("RALLY_BACKEND_URL", "ftp://rally.example.test");
    }
    assert!(matches!(SessionConfig::from_env(), Err(SessionError::Configuration(_))));

    unsafe {
        std::env::set_var("RALLY_BACKEND_URL", "https://rally.example.test");
        std::env::set_var("RALLY_VALIDATE_INTERVAL_SECS", "0");
    }
    assert!(matches!(SessionConfig::from_env(), Err(SessionError::Configuration(_))));

    unsafe { clear_rally_env() };
}

#[test]
fn normalize_backend_url_strips_trailing_slashes() {
    assert_eq!(normalize_backend_url("http://localhost:8080//").unwrap(), "http://localhost:8080");
}

#[test]
fn normalize_backend_url_rejects_relative() {
    assert!(matches!(normalize_backend_url("/api"), Err(SessionError::Configuration(_))));
}

#[test]
fn with_backend_url_replaces_origin() {
    let cfg = SessionConfig::default().with_backend_url("http://127.0.0.1:9999/").unwrap();
    assert_eq!(cfg.backend_url, "http://127.0.0.1:9999");
}
