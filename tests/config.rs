use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use waste_sorter::config::SorterConfig;
use waste_sorter::ExpiryPolicy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "WASTE_SORTER_CONFIG",
        "WASTE_SORTER_MODEL",
        "WASTE_SORTER_SOURCE",
        "WASTE_SORTER_CONFIDENCE",
        "WASTE_SORTER_EXPIRY_MS",
        "WASTE_SORTER_CANCEL_SUPERSEDED",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model": {
            "path": "weights/bins_v2.onnx",
            "input_size": 320,
            "class_names": ["can", "battery"]
        },
        "source": {
            "uri": "/dev/video2",
            "target_fps": 10
        },
        "detection": {
            "confidence_threshold": 0.5,
            "frame_width": 800,
            "frame_height": 450
        },
        "display": {
            "expiry_ms": 1500
        },
        "categories": {
            "recyclable": ["can"],
            "non_recyclable": [],
            "hazardous": ["battery"]
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("WASTE_SORTER_CONFIG", file.path());
    std::env::set_var("WASTE_SORTER_SOURCE", "samples/bin_cam.mp4");
    std::env::set_var("WASTE_SORTER_CANCEL_SUPERSEDED", "true");

    let cfg = SorterConfig::load().expect("load config");

    assert_eq!(cfg.model.path, "weights/bins_v2.onnx");
    assert_eq!(cfg.model.input_size, 320);
    assert_eq!(
        cfg.model.class_names,
        Some(vec!["can".to_string(), "battery".to_string()])
    );
    assert_eq!(cfg.source.uri, "samples/bin_cam.mp4");
    assert_eq!(cfg.source.target_fps, 10);
    assert_eq!(cfg.confidence_threshold, 0.5);
    assert_eq!((cfg.frame_width, cfg.frame_height), (800, 450));
    assert_eq!(cfg.expiry.delay, Duration::from_millis(1500));
    assert_eq!(cfg.expiry.policy, ExpiryPolicy::CancelSuperseded);

    let table = cfg.category_table().expect("table");
    assert_eq!(table.len(), 2);

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SorterConfig::load().expect("load defaults");

    assert_eq!(cfg.model.path, "weights/best.onnx");
    assert!(cfg.model.class_names.is_none());
    assert_eq!(cfg.source.uri, "/dev/video0");
    assert_eq!(cfg.confidence_threshold, 0.6);
    assert_eq!((cfg.frame_width, cfg.frame_height), (640, 360));
    assert_eq!(cfg.expiry.delay, Duration::from_secs(3));
    assert_eq!(cfg.expiry.policy, ExpiryPolicy::FireAll);
    assert_eq!(cfg.category_table().expect("table").len(), 22);
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("WASTE_SORTER_CONFIDENCE", "1.5");
    assert!(SorterConfig::load().is_err());
    clear_env();

    std::env::set_var("WASTE_SORTER_EXPIRY_MS", "soon");
    assert!(SorterConfig::load().is_err());
    clear_env();

    std::env::set_var("WASTE_SORTER_EXPIRY_MS", "0");
    assert!(SorterConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_label_in_two_categories() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "categories": { "recyclable": ["can"], "hazardous": ["can"] } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("WASTE_SORTER_CONFIG", file.path());

    assert!(SorterConfig::load().is_err());

    clear_env();
}
