use super::{apply_env_overrides, apply_file_settings, load_settings, Settings};

use std::{collections::HashMap, fs, time::Duration};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn defaults_target_local_agent_endpoint() {
    let settings = Settings::default().validate().expect("defaults are valid");
    assert_eq!(settings.api_base_url, "http://127.0.0.1:8000/api");
    assert_eq!(settings.endpoints().ask, "/agent");
    assert_eq!(
        settings.controller_settings().request_timeout,
        Duration::from_secs(120)
    );
}

#[test]
fn file_settings_override_defaults_partially() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("console.toml");
    fs::write(
        &path,
        "api_base_url = \"https://docs.example.com/api/\"\nask_path = \"qa\"\nupload_timeout_secs = 30\n",
    )
    .expect("write config");

    let mut settings = Settings::default();
    apply_file_settings(&mut settings, &path).expect("apply");
    let settings = settings.validate().expect("valid");

    assert_eq!(settings.api_base_url, "https://docs.example.com/api");
    assert_eq!(settings.ask_path, "/qa");
    assert_eq!(settings.upload_timeout_secs, 30);
    assert_eq!(settings.documents_path, "/documents");
}

#[test]
fn malformed_file_is_reported_with_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("console.toml");
    fs::write(&path, "request_timeout_secs = \"soon\"").expect("write config");

    let err = apply_file_settings(&mut Settings::default(), &path).expect_err("must fail");
    assert!(format!("{err:#}").contains("console.toml"));
}

#[test]
fn env_overrides_win_and_app_prefix_wins_last() {
    let mut settings = Settings::default();
    apply_env_overrides(
        &mut settings,
        env(&[
            ("WORKFLOWGEN_API_URL", "http://first:1/api"),
            ("APP__API_BASE_URL", "http://second:2/api"),
            ("APP__ASK_PATH", "/qa"),
            ("APP__REQUEST_TIMEOUT_SECS", "15"),
            ("APP__UPLOAD_TIMEOUT_SECS", "not-a-number"),
        ]),
    );

    assert_eq!(settings.api_base_url, "http://second:2/api");
    assert_eq!(settings.ask_path, "/qa");
    assert_eq!(settings.request_timeout_secs, 15);
    assert_eq!(settings.upload_timeout_secs, 300);
}

#[test]
fn rejects_non_http_base_url_and_zero_timeouts() {
    let ftp = Settings {
        api_base_url: "ftp://example.com".into(),
        ..Settings::default()
    };
    assert!(ftp.validate().is_err());

    let zero = Settings {
        request_timeout_secs: 0,
        ..Settings::default()
    };
    assert!(zero.validate().is_err());

    let empty_path = Settings {
        summarize_path: " ".into(),
        ..Settings::default()
    };
    assert!(empty_path.validate().is_err());
}

#[test]
fn explicit_missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_settings(Some(&dir.path().join("absent.toml"))).expect_err("must fail");
    assert!(err.to_string().contains("absent.toml"));
}
