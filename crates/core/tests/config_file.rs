//! Loading configuration from disk.

use std::path::PathBuf;

use vkpipe_core::config::CameraStrategy;
use vkpipe_core::{Config, Error};

fn scratch_file(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("vkpipe-{}-{}", std::process::id(), name));
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_from_path_reads_file() {
    let path = scratch_file(
        "ok.toml",
        r#"
        [window]
        title = "from disk"

        [camera]
        strategy = "fly"
        fov_degrees = 60.0
        "#,
    );

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.window.title, "from disk");
    assert_eq!(config.camera.strategy, CameraStrategy::Fly);
    assert_eq!(config.camera.fov_degrees, 60.0);

    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_load_from_path_reports_parse_errors() {
    let path = scratch_file("bad.toml", "[graphics]\nmax_msaa_samples = \"eight\"\n");

    match Config::load(Some(&path)) {
        Err(Error::ConfigParse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected parse error, got {other:?}"),
    }

    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_sample_config_parses() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../vkpipe.toml");
    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.scene.objects.len(), 4);
    assert_eq!(config.camera.strategy, CameraStrategy::Orbit);
    assert!(
        config
            .scene
            .objects
            .iter()
            .any(|o| o.name == "Light" && o.intensity == 50.0)
    );
}
