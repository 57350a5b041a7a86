//! Config file and root folder resolution
//!
//! Tests touching CUEDECK_CONFIG / CUEDECK_ROOT are marked #[serial] so they
//! never race on process environment.

use cuedeck_common::config::{
    default_root_folder, resolve_config_path, resolve_root_folder, CONFIG_ENV_VAR,
    ROOT_FOLDER_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
#[serial]
fn test_cli_config_path_wins_over_env() {
    let dir = tempfile::tempdir().unwrap();
    let cli_file = dir.path().join("cli.toml");
    let env_file = dir.path().join("env.toml");
    std::fs::write(&cli_file, "port = 5800\n").unwrap();
    std::fs::write(&env_file, "port = 5900\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_file);
    let resolved = resolve_config_path(cli_file.to_str()).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(cli_file));
}

#[test]
#[serial]
fn test_env_config_path_used_without_cli() {
    let dir = tempfile::tempdir().unwrap();
    let env_file = dir.path().join("env.toml");
    std::fs::write(&env_file, "").unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_file);
    let resolved = resolve_config_path(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(env_file));
}

#[test]
#[serial]
fn test_missing_explicit_config_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let result = resolve_config_path(Some("/nonexistent/cuedeck/config.toml"));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_root_folder_priority() {
    env::remove_var(ROOT_FOLDER_ENV_VAR);

    // Config value beats platform default
    let from_config = resolve_root_folder(None, Some("/srv/cuedeck"));
    assert_eq!(from_config, PathBuf::from("/srv/cuedeck"));

    // Env beats config value
    env::set_var(ROOT_FOLDER_ENV_VAR, "/tmp/cuedeck-env");
    let from_env = resolve_root_folder(None, Some("/srv/cuedeck"));
    assert_eq!(from_env, PathBuf::from("/tmp/cuedeck-env"));

    // CLI beats everything
    let from_cli = resolve_root_folder(Some("/tmp/cuedeck-cli"), Some("/srv/cuedeck"));
    assert_eq!(from_cli, PathBuf::from("/tmp/cuedeck-cli"));
    env::remove_var(ROOT_FOLDER_ENV_VAR);

    assert_eq!(resolve_root_folder(None, None), default_root_folder());
}

#[test]
fn test_default_root_folder_is_named() {
    let root = default_root_folder();
    assert!(root.to_string_lossy().contains("cuedeck"));
}
