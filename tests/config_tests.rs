// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use alpha_player::Config;
use alpha_player::config::PresentModePreference;

fn scratch_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("alpha-player-{}-{}.json", name, std::process::id()))
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.render.warmup_frames, 5, "Five warm-up frames by default");
    assert_eq!(config.render.stop_timeout_ms, 500);
    assert_eq!(config.render.present_mode, PresentModePreference::Fifo);
    assert!(config.grading.is_on, "Grading should be enabled by default");
    assert!(config.decoder.sync_to_clock);
}

#[test]
fn test_config_save_and_load() {
    let path = scratch_path("roundtrip");
    let mut config = Config::default();
    config.render.warmup_frames = 2;
    config.grading.hue = 0.3;

    config.save_to(&path).expect("save config");
    let loaded = Config::load_from(&path).expect("load config");
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded, config);
}

#[test]
fn test_config_missing_fields_use_defaults() {
    let path = scratch_path("partial");
    std::fs::write(&path, r#"{ "grading": { "hue": 0.1, "isOn": false } }"#).unwrap();
    let loaded = Config::load_from(&path).expect("load partial config");
    let _ = std::fs::remove_file(&path);

    assert!((loaded.grading.hue - 0.1).abs() < 1e-6);
    assert!(!loaded.grading.is_on);
    assert!((loaded.grading.gamma - 0.8).abs() < 1e-6);
    assert_eq!(loaded.render.warmup_frames, 5);
}

#[test]
fn test_config_malformed_file_is_an_error() {
    let path = scratch_path("malformed");
    std::fs::write(&path, "{ not json").unwrap();
    let result = Config::load_from(&path);
    let _ = std::fs::remove_file(&path);

    assert!(result.is_err(), "Malformed config must not load silently");
}

#[test]
fn test_config_validated_clamps_grading() {
    let mut config = Config::default();
    config.grading.sat = 3.0;
    config.grading.value = 10.0;
    config.grading.gamma = 0.0;

    let config = config.validated();
    assert!(config.grading.sat <= 1.0);
    assert!(config.grading.value <= 4.0);
    assert!(config.grading.gamma > 0.0);
}

#[test]
fn test_malformed_config_falls_back_to_defaults() {
    let path = scratch_path("malformed");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::load_from(&path).is_err(), "strict load reports the error");
    let config = Config::load_from_or_default(&path);
    let _ = std::fs::remove_file(&path);

    assert_eq!(config, Config::default());
}
