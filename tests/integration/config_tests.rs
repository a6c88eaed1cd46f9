use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use morlock::config::{Config, ConfigError};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config = Config::extract(figment).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
extensions = ["mp3", "wav"]
sync_marker = "RIFF"
list_indent = 2
prompt = "tags"
confirm_discard = false
"#,
    )
    .unwrap();

    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));
    let config = Config::extract(figment).unwrap();

    assert_eq!(config.extensions, vec!["mp3", "wav"]);
    assert_eq!(config.sync_marker, "RIFF");
    assert_eq!(config.list_indent, 2);
    assert_eq!(config.prompt, "tags");
    assert!(!config.confirm_discard);
    assert_eq!(config.kdf_iterations, 2);

    let settings = config.session_settings();
    assert!(!settings.confirm_discard);
    assert_eq!(config.codec().marker(), b"RIFF");
}

#[test]
fn test_config_env_overrides_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "list_indent = 2\n").unwrap();

    figment::Jail::expect_with(|jail| {
        jail.set_env("MORLOCK_LIST_INDENT", "8");
        let config = Config::try_load(Some(&config_path)).unwrap();
        assert_eq!(config.list_indent, 8);
        Ok(())
    });
}

#[test]
fn test_config_invalid_values_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "sync_marker = \"\"\n").unwrap();

    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));
    match Config::extract(figment) {
        Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "sync_marker"),
        other => panic!("Expected Invalid, got {:?}", other),
    }
}

#[test]
fn test_config_invalid_toml_fallback() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "list_indent = [not toml").unwrap();

    assert!(Config::try_load(Some(&config_path)).is_err());
    assert_eq!(Config::load(Some(&config_path)).list_indent, 4);
}

#[test]
fn test_config_unknown_keys_are_ignored() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "promt = \"x\"\nlist_indent = 3\n").unwrap();

    figment::Jail::expect_with(|_| {
        let config = Config::try_load(Some(&config_path)).unwrap();
        assert_eq!(config.list_indent, 3);
        assert_eq!(config.prompt, "morlock");
        Ok(())
    });
}
