// tests/config_env.rs
use econutri_weights::config::app::{
    AppConfig, ENV_API_BASE_URL, ENV_CONFIG_PATH, ENV_REMOTE_TIMEOUT_MS, ENV_RESOLVER,
    ENV_SAVE_HISTORY, ENV_SETTINGS_DIR,
};
use econutri_weights::ResolverMode;
use std::{env, fs};

fn clear_env() {
    for k in [
        ENV_CONFIG_PATH,
        ENV_API_BASE_URL,
        ENV_RESOLVER,
        ENV_REMOTE_TIMEOUT_MS,
        ENV_SETTINGS_DIR,
        ENV_SAVE_HISTORY,
    ] {
        env::remove_var(k);
    }
}

#[test]
fn repo_config_file_parses() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/econutri.toml");
    let cfg = AppConfig::load_from_file(path).unwrap();
    assert_eq!(cfg.resolver, ResolverMode::Local);
    assert_eq!(cfg.remote_timeout_ms, 5000);
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_file_then_builtin() {
    // Isolate CWD so the repo's own config/ is not picked up.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    // 1) Nothing anywhere -> built-in defaults
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg, AppConfig::default());

    // 2) ./config/econutri.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/econutri.toml"),
        r#"
resolver = "remote"
remote_timeout_ms = 1500
"#,
    )
    .unwrap();
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.resolver, ResolverMode::Remote);
    assert_eq!(cfg.remote_timeout_ms, 1500);

    // 3) Explicit path wins over ./config
    let explicit = tmp.path().join("other.toml");
    fs::write(&explicit, r#"api_base_url = "http://grades.internal:8080/""#).unwrap();
    env::set_var(ENV_CONFIG_PATH, explicit.display().to_string());
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.api_base_url, "http://grades.internal:8080");
    assert_eq!(cfg.resolver, ResolverMode::Local);

    // 4) Env overrides on top of the file
    env::set_var(ENV_RESOLVER, "remote");
    env::set_var(ENV_SAVE_HISTORY, "false");
    env::set_var(ENV_REMOTE_TIMEOUT_MS, "999999");
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.resolver, ResolverMode::Remote);
    assert!(!cfg.save_history);
    assert_eq!(cfg.remote_timeout_ms, 5000);

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn missing_explicit_config_is_an_error() {
    clear_env();
    env::set_var(ENV_CONFIG_PATH, "/definitely/not/here/econutri.toml");
    assert!(AppConfig::load_default().is_err());
    clear_env();
}

#[serial_test::serial]
#[test]
fn invalid_resolver_env_is_ignored() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("econutri.toml");
    fs::write(&path, r#"resolver = "remote""#).unwrap();
    env::set_var(ENV_CONFIG_PATH, path.display().to_string());
    env::set_var(ENV_RESOLVER, "carrier-pigeon");

    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.resolver, ResolverMode::Remote);
    clear_env();
}
